//! 外部服务接口
//!
//! 流程层只依赖这两个 trait，具体实现（Google Vision / OpenAI 兼容接口 / 测试桩）
//! 在 App 中选择后注入。

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::WordBox;

/// OCR 服务：图片字节 → 带像素多边形的词
#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, image: &[u8]) -> Result<Vec<WordBox>, ProviderError>;
}

/// 一次批改请求
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    pub prompt: &'a str,
    pub system_message: &'a str,
    pub image: &'a [u8],
    /// 例如 `image/png`
    pub mime_type: &'a str,
}

/// 批改模型：提示词 + 原图 → 原始文本响应
///
/// 返回内容不做任何校验，交给 `CorrectionParser` 处理。
#[async_trait]
pub trait GradingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<String, ProviderError>;
}
