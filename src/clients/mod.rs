pub mod grading_client;
pub mod mock;
pub mod provider;
pub mod vision_client;

pub use grading_client::GradingClient;
pub use mock::{MockGradingProvider, MockOcrProvider};
pub use provider::{GradingProvider, GradingRequest, OcrProvider};
pub use vision_client::VisionClient;
