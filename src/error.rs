use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
///
/// 所有致命错误都汇总到这里；校验类的问题（`ValidationWarning`）不是错误，
/// 由 `CorrectionParser` 收集后随结果一起返回。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（缺少凭据等），在任何网络调用之前检查
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// OCR 或评分服务调用失败
    #[error("服务调用错误: {0}")]
    Provider(#[from] ProviderError),
    /// 图片读取或绘制失败
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少必需的凭据
    #[error("缺少必需的环境变量 {var_name}（{purpose}）")]
    MissingCredential {
        var_name: String,
        purpose: String,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件无法读取或解析
    #[error("配置文件 {path} 无效: {source}")]
    InvalidFile {
        path: String,
        #[source]
        source: BoxedSource,
    },
}

/// 外部服务错误（OCR / 评分模型）
#[derive(Debug, Error)]
pub enum ProviderError {
    /// OCR 调用失败：鉴权、配额、图片格式等问题都归到这里
    #[error("OCR 调用失败: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    /// 评分模型调用失败
    #[error("评分模型调用失败 (模型: {model}): {message}")]
    Grading {
        model: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    /// 调用超时
    #[error("{service} 调用超时 ({timeout_secs} 秒)")]
    Timeout {
        service: String,
        timeout_secs: u64,
    },
}

/// 渲染错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 源图片无法读取或解码
    #[error("无法读取图片 {path}: {source}")]
    UnreadableImage {
        path: String,
        #[source]
        source: BoxedSource,
    },
    /// 图片编码失败
    #[error("图片编码失败: {source}")]
    EncodeFailed {
        #[source]
        source: BoxedSource,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: BoxedSource,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: BoxedSource,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: BoxedSource,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建缺少凭据错误
    pub fn missing_credential(var_name: impl Into<String>, purpose: impl Into<String>) -> Self {
        AppError::Config(ConfigError::MissingCredential {
            var_name: var_name.into(),
            purpose: purpose.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建 JSON 解析错误
    pub fn json_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::JsonParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建图片读取错误
    pub fn unreadable_image(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Render(RenderError::UnreadableImage {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

impl ProviderError {
    /// 创建 OCR 错误
    pub fn ocr(message: impl Into<String>) -> Self {
        ProviderError::Ocr {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带底层原因的 OCR 错误
    pub fn ocr_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProviderError::Ocr {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 创建带底层原因的评分模型错误
    pub fn grading_with_source(
        model: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProviderError::Grading {
            model: model.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_missing_credential_message_names_variable() {
        let err = AppError::missing_credential("OPENAI_API_KEY", "评分模型");
        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(matches!(
            err,
            AppError::Config(ConfigError::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_provider_error_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = ProviderError::ocr_with_source("请求失败", io);
        let source = err.source().expect("应保留底层原因");
        assert_eq!(source.to_string(), "connection reset");
    }
}
