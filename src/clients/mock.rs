//! 返回固定结果的服务实现，用于离线运行和测试

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::clients::provider::{GradingProvider, GradingRequest, OcrProvider};
use crate::error::ProviderError;
use crate::models::WordBox;

/// 固定返回一组词的 OCR
pub struct MockOcrProvider {
    words: Vec<WordBox>,
    calls: AtomicUsize,
}

impl MockOcrProvider {
    pub fn new(words: Vec<WordBox>) -> Self {
        Self {
            words,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for MockOcrProvider {
    fn name(&self) -> &str {
        "mock-ocr"
    }

    async fn recognize(&self, _image: &[u8]) -> Result<Vec<WordBox>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.words.clone())
    }
}

/// 固定返回一段文本（或错误）的批改模型
pub struct MockGradingProvider {
    response: Result<String, String>,
    calls: AtomicUsize,
}

impl MockGradingProvider {
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 每次调用都失败
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GradingProvider for MockGradingProvider {
    fn name(&self) -> &str {
        "mock-grading"
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn grade(&self, _request: &GradingRequest<'_>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(|message| ProviderError::Grading {
            model: "mock".to_string(),
            message,
            source: None,
        })
    }
}
