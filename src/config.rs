use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 程序配置
///
/// 进程启动时构造一次，按引用传给 OCR / 评分客户端，不存在全局客户端状态。
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OCR 配置 ---
    pub google_vision_api_key: Option<String>,
    pub google_vision_endpoint: String,
    // --- 评分模型配置 ---
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    /// 单次外部调用的超时时间（秒），不做自动重试
    pub request_timeout_secs: u64,
    /// 每次运行的输出目录的父目录
    pub output_root: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub grouping: GroupingConfig,
    pub overlay: OverlayConfig,
}

/// 词框分组的容差，均按中位数尺寸的比例给出
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// 垂直中心相差小于 `line_tolerance_ratio × 中位高度` 视为同一行
    pub line_tolerance_ratio: f64,
    /// 同一行内水平间隙小于 `word_gap_ratio × 中位宽度` 合并为同一区域
    pub word_gap_ratio: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            line_tolerance_ratio: 0.5,
            word_gap_ratio: 0.6,
        }
    }
}

/// 叠加图绘制参数
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// 标记符号（勾/叉/圈）的边长
    pub glyph_size: u32,
    /// 标记相对区域右上角向外偏移的距离
    pub anchor_margin: i32,
    /// 发生重叠时每次向下平移的步长
    pub displacement_step: i32,
    /// 最大平移次数，用尽后退回原位置（允许重叠）
    pub max_displacement_retries: u32,
    /// 批注文字字号
    pub font_size: f32,
    /// 首选字体文件
    pub font_path: Option<PathBuf>,
    pub panel_width: u32,
    pub panel_height: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            glyph_size: 28,
            anchor_margin: 6,
            displacement_step: 32,
            max_displacement_retries: 8,
            font_size: 24.0,
            font_path: None,
            panel_width: 640,
            panel_height: 320,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_vision_api_key: None,
            google_vision_endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o".to_string(),
            request_timeout_secs: 120,
            output_root: "outputs".to_string(),
            verbose_logging: false,
            grouping: GroupingConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Config {
    /// 加载配置：可选的 TOML 文件，再由环境变量覆盖
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let base = match config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件读取，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::InvalidFile { source, .. }) => {
                AppError::Config(ConfigError::InvalidFile {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| {
            AppError::Config(ConfigError::InvalidFile {
                path: String::new(),
                source: Box::new(e),
            })
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(v) = lookup("GOOGLE_VISION_API_KEY").filter(|v| !v.is_empty()) {
            self.google_vision_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.openai_base_url = v;
        }
        if let Some(v) = lookup("OPENAI_MODEL").filter(|v| !v.is_empty()) {
            self.openai_model = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v, "u64")?;
        }
        if let Some(v) = lookup("OUTPUT_ROOT").filter(|v| !v.is_empty()) {
            self.output_root = v;
        }
        if let Some(v) = lookup("OVERLAY_FONT").filter(|v| !v.is_empty()) {
            self.overlay.font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("VERBOSE_LOGGING") {
            self.verbose_logging = parse_env("VERBOSE_LOGGING", &v, "bool")?;
        }
        Ok(self)
    }

    /// 调用 OCR 之前的凭据检查
    pub fn require_vision_key(&self) -> AppResult<&str> {
        self.google_vision_api_key
            .as_deref()
            .ok_or_else(|| AppError::missing_credential("GOOGLE_VISION_API_KEY", "OCR 服务"))
    }

    /// 调用评分模型之前的凭据检查
    pub fn require_openai_key(&self) -> AppResult<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AppError::missing_credential("OPENAI_API_KEY", "评分模型"))
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str, value: &str, expected_type: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::Config(ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_toml_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            openai_model = "gpt-4.1"

            [grouping]
            word_gap_ratio = 1.2
            "#,
        )
        .unwrap();

        assert_eq!(config.openai_model, "gpt-4.1");
        assert_eq!(config.grouping.word_gap_ratio, 1.2);
        assert_eq!(config.grouping.line_tolerance_ratio, 0.5);
        assert_eq!(config.overlay, OverlayConfig::default());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = Config::default()
            .with_overrides(lookup_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_MODEL", "gpt-4o-mini"),
                ("REQUEST_TIMEOUT_SECS", "30"),
            ]))
            .unwrap();

        assert_eq!(config.require_openai_key().unwrap(), "sk-test");
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let err = Config::default()
            .with_overrides(lookup_from(&[("REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::EnvVarParseFailed { .. })
        ));
    }

    #[test]
    fn test_missing_credentials_fail_preflight() {
        let config = Config::default();
        assert!(config.require_vision_key().is_err());
        assert!(config.require_openai_key().is_err());
    }
}
