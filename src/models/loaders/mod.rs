pub mod json_loader;

pub use json_loader::{load_region_index, load_saved_ocr, load_text, SavedOcr};
