//! 批改模型客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务，模型必须支持图片输入

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::provider::{GradingProvider, GradingRequest};
use crate::config::Config;
use crate::error::{AppResult, ProviderError};

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 4096;

/// 批改模型客户端
///
/// 职责：
/// - 把提示词和原图一起发给模型
/// - 原样返回模型文本，不做解析
pub struct GradingClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    timeout_secs: u64,
}

impl GradingClient {
    /// 创建客户端；缺少 API Key 时返回配置错误
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config.require_openai_key()?;
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.openai_base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name: config.openai_model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn build_request(&self, request: &GradingRequest<'_>) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_message)
            .build()?;

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(ChatCompletionRequestMessageContentPartText {
                text: request.prompt.to_string(),
            }),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl {
                    url: data_url(request.mime_type, request.image),
                    detail: Some(ImageDetail::High),
                },
            }),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .build()
    }

    fn grading_error(&self, message: &str, source: OpenAIError) -> ProviderError {
        ProviderError::grading_with_source(&self.model_name, message, source)
    }
}

/// 把图片编码为 `data:` URL
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

#[async_trait]
impl GradingProvider for GradingClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    async fn grade(&self, request: &GradingRequest<'_>) -> Result<String, ProviderError> {
        debug!("调用批改模型，模型: {}", self.model_name);
        debug!("提示词长度: {} 字符，图片 {} 字节", request.prompt.len(), request.image.len());

        let chat_request = self
            .build_request(request)
            .map_err(|e| self.grading_error("无法构建请求", e))?;

        let chat = self.client.chat();
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), chat.create(chat_request))
            .await
            .map_err(|_| ProviderError::Timeout {
                service: format!("批改模型 {}", self.model_name),
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| {
                warn!("批改模型调用失败: {}", e);
                self.grading_error("调用失败，请确认模型支持图片输入且 API 配置正确", e)
            })?;

        debug!("批改模型调用成功");

        // 空内容交给解析器按格式错误处理
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            openai_api_key: Some("test-key".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_data_url_prefix() {
        let url = data_url("image/png", &[0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(GradingClient::new(&Config::default()).is_err());
        let client = GradingClient::new(&create_test_config()).unwrap();
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_build_request_includes_image_part() {
        let client = GradingClient::new(&create_test_config()).unwrap();
        let request = GradingRequest {
            prompt: "Region 0:",
            system_message: "grade",
            image: &[1, 2, 3],
            mime_type: "image/jpeg",
        };
        let built = client.build_request(&request).unwrap();
        assert_eq!(built.messages.len(), 2);
        let json = serde_json::to_string(&built).unwrap();
        assert!(json.contains("data:image/jpeg;base64,AQID"));
    }

    /// 端点不可达时返回错误而不是挂起
    #[tokio::test]
    async fn test_unreachable_endpoint_returns_error() {
        let config = Config {
            openai_base_url: "http://127.0.0.1:9/v1".to_string(),
            request_timeout_secs: 1,
            ..create_test_config()
        };
        let client = GradingClient::new(&config).unwrap();
        let request = GradingRequest {
            prompt: "Region 0:",
            system_message: "grade",
            image: &[1, 2, 3],
            mime_type: "image/png",
        };

        let result = client.grade(&request).await;
        assert!(result.is_err());
    }

    /// 测试批改模型连接性（需要 OPENAI_API_KEY 与 TEST_IMAGE）
    #[tokio::test]
    #[ignore]
    async fn test_grading_api_connectivity() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::default().with_env_overrides().unwrap();
        let client = GradingClient::new(&config).unwrap();
        let path = std::env::var("TEST_IMAGE").unwrap_or_else(|_| "sample.png".to_string());
        let bytes = std::fs::read(&path).unwrap();

        let response = client
            .grade(&GradingRequest {
                prompt: "Describe the handwriting in one sentence.",
                system_message: "You are a concise assistant.",
                image: &bytes,
                mime_type: "image/png",
            })
            .await
            .unwrap();

        println!("{}", response);
        assert!(!response.is_empty());
    }
}
