//! 批改流程 - 流程层
//!
//! 核心职责：定义"一张图片"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取图片
//! 2. OCR（在线 / 离线文件 / 上次运行结果）→ 分组 → 区域预览图
//! 3. 生成提示词
//! 4. 批改模型（在线 / 离线文件 / 上次运行结果）
//! 5. 容错解析，警告写入 warnings.txt
//! 6. 合成叠加图
//!
//! 外部调用失败立即终止；单条批改结论有问题只记警告。

use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{GradingProvider, GradingRequest, OcrProvider};
use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::{names, ArtifactStore};
use crate::models::{
    load_region_index, load_saved_ocr, load_text, AssessmentSummary, RegionIndex, SavedOcr,
    ValidationWarning, WordBox,
};
use crate::render::{render_region_preview, OverlayCompositor, OverlayFont, PanelPlacement};
use crate::services::{BoxGrouper, CorrectionParser, PromptEncoder};
use crate::utils::logging::{log_step, truncate_text};
use crate::workflow::run_ctx::RunCtx;

const TOTAL_STEPS: usize = 6;

/// OCR 数据来源
pub enum OcrSource {
    /// 调用 OCR 服务
    Provider(Arc<dyn OcrProvider>),
    /// 读取保存的区域数组或词框数组
    SavedFile(PathBuf),
    /// 复用输出目录中已有的 ocr_data.json
    PreviousRun,
}

/// 批改结果来源
pub enum GradingSource {
    /// 调用批改模型
    Provider(Arc<dyn GradingProvider>),
    /// 读取保存的批改结果（JSON 或模型原始文本）
    SavedFile(PathBuf),
    /// 复用输出目录中已有的 corrections.json
    PreviousRun,
}

impl OcrSource {
    fn describe(&self) -> String {
        match self {
            OcrSource::Provider(p) => p.name().to_string(),
            OcrSource::SavedFile(path) => path.display().to_string(),
            OcrSource::PreviousRun => names::OCR_DATA.to_string(),
        }
    }
}

impl GradingSource {
    fn describe(&self) -> String {
        match self {
            GradingSource::Provider(p) => format!("{} ({})", p.name(), p.model()),
            GradingSource::SavedFile(path) => path.display().to_string(),
            GradingSource::PreviousRun => names::CORRECTIONS.to_string(),
        }
    }
}

/// 单次运行的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub out_dir: PathBuf,
    pub region_count: usize,
    pub summary: AssessmentSummary,
    /// 批改结论的校验警告
    pub warnings: Vec<ValidationWarning>,
    /// 其他非致命提示（例如字体回退）
    pub notices: Vec<String>,
    pub panel: Option<PanelPlacement>,
    pub overlay_path: PathBuf,
}

#[derive(Serialize)]
struct ImageInfo<'a> {
    source: String,
    width: u32,
    height: u32,
    mime_type: &'a str,
    region_count: usize,
    ocr_source: String,
    grading_source: String,
    created_at: String,
}

/// 批改流程
///
/// - 编排完整的单图处理流程
/// - 决定何时调用外部服务、何时读取离线数据
/// - 只依赖业务能力（services / render）和注入的 provider
pub struct GradingFlow {
    config: Config,
    ocr: OcrSource,
    grading: GradingSource,
}

impl GradingFlow {
    pub fn new(config: &Config, ocr: OcrSource, grading: GradingSource) -> Self {
        Self {
            config: config.clone(),
            ocr,
            grading,
        }
    }

    pub async fn run(&self, ctx: &RunCtx) -> AppResult<RunReport> {
        let store = ArtifactStore::open(&ctx.out_dir).await?;

        // ========== 步骤 1: 读取图片 ==========
        log_step(1, TOTAL_STEPS, "读取图片");
        let (bytes, image, mime_type) = load_image(&ctx.image_path).await?;
        let (width, height) = image.dimensions();
        info!("{} ✓ 图片尺寸 {}x{} ({})", ctx, width, height, mime_type);

        let (font, notices) = OverlayFont::load(self.config.overlay.font_path.as_deref());

        // ========== 步骤 2: 识别文字并分组 ==========
        log_step(2, TOTAL_STEPS, "识别文字并分组");
        let index = self.load_regions(ctx, &store, &bytes).await?;
        info!("{} ✓ 共 {} 个区域", ctx, index.len());
        if self.config.verbose_logging {
            self.log_regions(&index);
        }
        store.write_json(names::OCR_DATA, &index).await?;
        let preview = render_region_preview(&image, &index, &font);
        store.write_png(names::VISUALIZED_BOXES, &preview).await?;

        // ========== 步骤 3: 生成提示词 ==========
        log_step(3, TOTAL_STEPS, "生成提示词");
        let encoder = PromptEncoder::new().with_image_size(width, height);
        let prompt = encoder.encode(&index);
        store.write_text(names::GRADING_PROMPT, &prompt).await?;
        debug!("提示词长度: {} 字符", prompt.len());

        // ========== 步骤 4: 获取批改结果 ==========
        log_step(4, TOTAL_STEPS, "获取批改结果");
        let request = GradingRequest {
            prompt: &prompt,
            system_message: encoder.system_message(),
            image: &bytes,
            mime_type,
        };
        let (raw, response_source) = self.load_response(ctx, &store, &request).await?;

        // ========== 步骤 5: 解析批改结果 ==========
        log_step(5, TOTAL_STEPS, "解析批改结果");
        let parsed = CorrectionParser::new(&index).parse(&raw);
        info!(
            "{} ✓ 有效批改 {} 条，警告 {} 条",
            ctx,
            parsed.corrections.len(),
            parsed.warnings.len()
        );
        store.write_json(names::CORRECTIONS, &parsed.to_correction_set()).await?;
        if !parsed.warnings.is_empty() {
            let writer = store.warn_writer();
            writer.write(&response_source, &parsed.warnings).map_err(|e| {
                AppError::File(FileError::WriteFailed {
                    path: writer.path().display().to_string(),
                    source: e.into(),
                })
            })?;
        }

        // ========== 步骤 6: 合成叠加图 ==========
        log_step(6, TOTAL_STEPS, "合成叠加图");
        let compositor = OverlayCompositor::new(&self.config.overlay, &font);
        let (annotated, summary) =
            compositor.compose(&image, &index, &parsed.corrections, &parsed.assessment);
        let overlay_path = store.write_png(names::CORRECTED_OVERLAY, &annotated.image).await?;
        info!("{} ✓ 叠加图已保存: {}", ctx, overlay_path.display());

        store
            .write_json(
                names::IMAGE_INFO,
                &ImageInfo {
                    source: ctx.image_path.display().to_string(),
                    width,
                    height,
                    mime_type,
                    region_count: index.len(),
                    ocr_source: self.ocr.describe(),
                    grading_source: self.grading.describe(),
                    created_at: chrono::Local::now().to_rfc3339(),
                },
            )
            .await?;

        Ok(RunReport {
            out_dir: store.dir().to_path_buf(),
            region_count: index.len(),
            summary,
            warnings: parsed.warnings,
            notices,
            panel: annotated.panel,
            overlay_path,
        })
    }

    async fn load_regions(&self, ctx: &RunCtx, store: &ArtifactStore, bytes: &[u8]) -> AppResult<RegionIndex> {
        match &self.ocr {
            OcrSource::Provider(provider) => {
                info!("{} 🔍 调用 OCR 服务 {}...", ctx, provider.name());
                let words = provider.recognize(bytes).await?;
                info!("{} ✓ 识别出 {} 个词", ctx, words.len());
                store.write_json(names::OCR_WORDS, &words).await?;
                Ok(self.group(&words))
            }
            OcrSource::SavedFile(path) => {
                info!("{} 📂 使用离线 OCR 数据: {}", ctx, path.display());
                match load_saved_ocr(path).await? {
                    SavedOcr::Regions(index) => Ok(index),
                    SavedOcr::Words(words) => Ok(self.group(&words)),
                }
            }
            OcrSource::PreviousRun => {
                let path = store.path(names::OCR_DATA);
                info!("{} 📂 跳过 OCR，复用 {}", ctx, path.display());
                load_region_index(&path).await
            }
        }
    }

    fn group(&self, words: &[WordBox]) -> RegionIndex {
        BoxGrouper::new(self.config.grouping).group(words).index
    }

    /// 返回响应文本及其来源名称（用于警告文件）
    async fn load_response(
        &self,
        ctx: &RunCtx,
        store: &ArtifactStore,
        request: &GradingRequest<'_>,
    ) -> AppResult<(String, String)> {
        match &self.grading {
            GradingSource::Provider(provider) => {
                info!("{} 🤖 调用批改模型 {}...", ctx, provider.model());
                let raw = provider.grade(request).await?;
                store.write_text(names::GRADING_RESPONSE, &raw).await?;
                Ok((raw, names::GRADING_RESPONSE.to_string()))
            }
            GradingSource::SavedFile(path) => {
                info!("{} 📂 使用离线批改结果: {}", ctx, path.display());
                let raw = load_text(path).await?;
                Ok((raw, path.display().to_string()))
            }
            GradingSource::PreviousRun => {
                let path = store.path(names::CORRECTIONS);
                info!("{} 📂 跳过批改模型，复用 {}", ctx, path.display());
                let raw = load_text(&path).await?;
                Ok((raw, names::CORRECTIONS.to_string()))
            }
        }
    }

    fn log_regions(&self, index: &RegionIndex) {
        for region in index.iter() {
            debug!(
                "  区域 {} (行 {}, {} 词) {:?}: {}",
                region.id,
                region.line_index,
                region.word_count,
                region.bbox,
                truncate_text(&region.text, 60)
            );
        }
    }
}

/// 读取并解码图片，返回原始字节、解码结果和 MIME 类型
async fn load_image(path: &Path) -> AppResult<(Vec<u8>, DynamicImage, &'static str)> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::File(FileError::NotFound {
                path: path.display().to_string(),
            })
        } else {
            AppError::file_read_failed(path.display().to_string(), e)
        }
    })?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| AppError::unreadable_image(path.display().to_string(), e))?;
    let mime_type = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/png");

    if image.width() == 0 || image.height() == 0 {
        warn!("⚠️ 图片尺寸为 0: {}", path.display());
    }

    Ok((bytes, image, mime_type))
}
