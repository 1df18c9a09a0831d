pub mod correction;
pub mod geometry;
pub mod loaders;
pub mod region;
pub mod word_box;

pub use correction::{
    AssessmentSummary, Correction, CorrectionKind, CorrectionSet, OverallAssessment,
    ValidationWarning, WarningKind,
};
pub use geometry::{BBox, Point};
pub use loaders::{load_region_index, load_saved_ocr, load_text, SavedOcr};
pub use region::{DuplicateRegionId, Region, RegionId, RegionIndex};
pub use word_box::WordBox;
