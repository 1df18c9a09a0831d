pub mod box_grouper;
pub mod correction_parser;
pub mod prompt_encoder;
pub mod warn_writer;

pub use box_grouper::{BoxGrouper, Grouping};
pub use correction_parser::{CorrectionParser, ParsedResponse};
pub use prompt_encoder::PromptEncoder;
pub use warn_writer::WarnWriter;
