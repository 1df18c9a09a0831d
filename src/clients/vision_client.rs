//! Google Cloud Vision OCR 客户端
//!
//! 调用 `images:annotate`（DOCUMENT_TEXT_DETECTION），在边界处把响应解码为
//! 固定结构，再展开为 `WordBox` 列表。

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::provider::OcrProvider;
use crate::config::Config;
use crate::error::{AppResult, ProviderError};
use crate::models::{Point, WordBox};

/// Google Vision OCR 客户端
pub struct VisionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl VisionClient {
    /// 创建客户端；缺少 API Key 时返回配置错误
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config.require_vision_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::ocr_with_source("无法创建 HTTP 客户端", e))?;

        Ok(Self {
            client,
            endpoint: config.google_vision_endpoint.clone(),
            api_key,
            timeout_secs: config.request_timeout_secs,
        })
    }
}

// ========== 请求/响应结构 ==========

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<ImageRequest<'a>>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Default, Deserialize)]
struct Block {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Default, Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Word {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    symbols: Vec<Symbol>,
    confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}

/// 把 Vision 响应展开成词列表
///
/// 词文本由各 symbol 拼接；空白词和没有多边形的词被丢弃。
fn words_from_response(response: AnnotateResponse) -> Result<Vec<WordBox>, ProviderError> {
    let Some(first) = response.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(status) = first.error.filter(|s| !s.message.is_empty()) {
        return Err(ProviderError::ocr(format!(
            "Vision API 返回错误 (code {}): {}",
            status.code, status.message
        )));
    }

    let Some(annotation) = first.full_text_annotation else {
        return Ok(Vec::new());
    };

    let mut words = Vec::new();
    for word in annotation
        .pages
        .into_iter()
        .flat_map(|p| p.blocks)
        .flat_map(|b| b.paragraphs)
        .flat_map(|p| p.words)
    {
        let text: String = word.symbols.iter().map(|s| s.text.as_str()).collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let polygon = word.bounding_box.map(|b| b.vertices).unwrap_or_default();
        if polygon.is_empty() {
            debug!("跳过没有多边形的词: {}", text);
            continue;
        }
        words.push(WordBox {
            text: text.to_string(),
            polygon,
            confidence: word.confidence,
        });
    }

    Ok(words)
}

fn status_message(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "鉴权失败，请检查 GOOGLE_VISION_API_KEY 以及项目是否启用了 Vision API".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => "请求过于频繁或配额已用尽".to_string(),
        StatusCode::BAD_REQUEST => "请求被拒绝，图片格式可能不受支持".to_string(),
        other => format!("HTTP {}", other),
    }
}

#[async_trait]
impl OcrProvider for VisionClient {
    fn name(&self) -> &str {
        "google-vision"
    }

    async fn recognize(&self, image: &[u8]) -> Result<Vec<WordBox>, ProviderError> {
        debug!("调用 Vision API，图片大小: {} 字节", image.len());

        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        service: "Vision API".to_string(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ProviderError::ocr_with_source("请求发送失败", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Vision API 返回 {}: {}", status, detail);
            return Err(ProviderError::ocr(format!("{} ({})", status_message(status), detail.trim())));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ocr_with_source("无法解析 Vision API 响应", e))?;

        let words = words_from_response(parsed)?;
        debug!("Vision API 识别出 {} 个词", words.len());
        Ok(words)
    }
}
