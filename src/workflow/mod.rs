pub mod grading_flow;
pub mod run_ctx;

pub use grading_flow::{GradingFlow, GradingSource, OcrSource, RunReport};
pub use run_ctx::RunCtx;
