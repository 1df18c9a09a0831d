use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::{GradingClient, VisionClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::ArtifactStore;
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::{GradingFlow, GradingSource, OcrSource, RunCtx, RunReport};

/// 命令行给出的运行选项
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub image: PathBuf,
    /// 缺省为 `<output_root>/<时间戳>`
    pub out_dir: Option<PathBuf>,
    /// 使用保存的 OCR 数据代替 OCR 服务
    pub ocr_json: Option<PathBuf>,
    /// 使用保存的批改结果代替批改模型
    pub corrections: Option<PathBuf>,
    /// 复用输出目录中的 ocr_data.json
    pub skip_ocr: bool,
    /// 复用输出目录中的 corrections.json
    pub skip_grading: bool,
}

/// 应用主结构
pub struct App {
    config: Config,
    ctx: RunCtx,
    flow: GradingFlow,
}

impl App {
    /// 初始化应用
    ///
    /// 所有凭据检查都在这里完成，任何网络调用之前缺少凭据即失败。
    pub fn initialize(config: Config, options: RunOptions) -> AppResult<Self> {
        let out_dir = options
            .out_dir
            .clone()
            .unwrap_or_else(|| ArtifactStore::timestamped_dir(Path::new(&config.output_root)));
        let ctx = RunCtx::new(&options.image, out_dir);

        let ocr = select_ocr_source(&config, &options)?;
        let grading = select_grading_source(&config, &options)?;
        let flow = GradingFlow::new(&config, ocr, grading);

        log_startup(&ctx.image_path, &ctx.out_dir);

        Ok(Self { config, ctx, flow })
    }

    pub fn ctx(&self) -> &RunCtx {
        &self.ctx
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunReport> {
        let report = self.flow.run(&self.ctx).await?;

        for notice in &report.notices {
            warn!("⚠️ {}", notice);
        }
        if self.config.verbose_logging {
            if let Some(panel) = report.panel {
                info!("面板位置: {:?}", panel);
            }
        }

        print_final_stats(&report.summary, report.warnings.len(), &report.out_dir);
        Ok(report)
    }
}

/// 选择顺序：离线文件 → 复用上次结果 → OCR 服务
fn select_ocr_source(config: &Config, options: &RunOptions) -> AppResult<OcrSource> {
    if let Some(path) = &options.ocr_json {
        return Ok(OcrSource::SavedFile(path.clone()));
    }
    if options.skip_ocr {
        return Ok(OcrSource::PreviousRun);
    }
    Ok(OcrSource::Provider(Arc::new(VisionClient::new(config)?)))
}

/// 选择顺序：离线文件 → 复用上次结果 → 批改模型
fn select_grading_source(config: &Config, options: &RunOptions) -> AppResult<GradingSource> {
    if let Some(path) = &options.corrections {
        return Ok(GradingSource::SavedFile(path.clone()));
    }
    if options.skip_grading {
        return Ok(GradingSource::PreviousRun);
    }
    Ok(GradingSource::Provider(Arc::new(GradingClient::new(config)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ConfigError};

    #[test]
    fn test_missing_vision_key_fails_before_any_call() {
        let options = RunOptions {
            image: PathBuf::from("page.png"),
            ..Default::default()
        };
        let err = App::initialize(Config::default(), options).err().unwrap();
        match err {
            AppError::Config(ConfigError::MissingCredential { var_name, .. }) => {
                assert_eq!(var_name, "GOOGLE_VISION_API_KEY")
            }
            other => panic!("意外的错误: {}", other),
        }
    }

    #[test]
    fn test_missing_openai_key_reported_when_ocr_is_offline() {
        let options = RunOptions {
            image: PathBuf::from("page.png"),
            ocr_json: Some(PathBuf::from("ocr.json")),
            ..Default::default()
        };
        let err = App::initialize(Config::default(), options).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_fully_offline_needs_no_credentials() {
        let options = RunOptions {
            image: PathBuf::from("page.png"),
            out_dir: Some(PathBuf::from("outputs/existing")),
            skip_ocr: true,
            skip_grading: true,
            ..Default::default()
        };
        let app = App::initialize(Config::default(), options).unwrap();
        assert_eq!(app.ctx().out_dir, PathBuf::from("outputs/existing"));
    }

    #[test]
    fn test_default_out_dir_is_timestamped_under_output_root() {
        let config = Config {
            output_root: "runs".to_string(),
            ..Config::default()
        };
        let options = RunOptions {
            image: PathBuf::from("page.png"),
            ocr_json: Some(PathBuf::from("ocr.json")),
            corrections: Some(PathBuf::from("corrections.json")),
            ..Default::default()
        };
        let app = App::initialize(config, options).unwrap();
        assert!(app.ctx().out_dir.starts_with("runs"));
    }
}
