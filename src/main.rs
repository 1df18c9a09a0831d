use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

use grade_overlay::app::{App, RunOptions};
use grade_overlay::config::Config;
use grade_overlay::utils::logging;

/// 手写作业批改：OCR → 批改模型 → 叠加图
#[derive(Debug, Parser)]
#[command(name = "grade-overlay", version, about)]
struct Cli {
    /// 待批改的图片
    #[arg(long)]
    image: PathBuf,

    /// 输出目录（默认 <output_root>/<时间戳>）
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// 使用保存的 OCR JSON（区域数组或词框数组），不调用 OCR 服务
    #[arg(long)]
    use_ocr_json: Option<PathBuf>,

    /// 使用保存的批改结果（JSON 或模型原始文本），不调用批改模型
    #[arg(long)]
    use_corrections: Option<PathBuf>,

    /// 跳过 OCR，复用输出目录中的 ocr_data.json
    #[arg(long)]
    skip_ocr: bool,

    /// 跳过批改模型，复用输出目录中的 corrections.json
    #[arg(long)]
    skip_grading: bool,

    /// 叠加图字体文件
    #[arg(long)]
    font: Option<PathBuf>,

    /// TOML 配置文件
    #[arg(long, env = "GRADER_CONFIG")]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(font) = cli.font.clone() {
        config.overlay.font_path = Some(font);
    }
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let options = RunOptions {
        image: cli.image,
        out_dir: cli.out_dir,
        ocr_json: cli.use_ocr_json,
        corrections: cli.use_corrections,
        skip_ocr: cli.skip_ocr,
        skip_grading: cli.skip_grading,
    };

    // 初始化并运行应用
    let result = match App::initialize(config, options) {
        Ok(app) => app.run().await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!("❌ 运行失败: {}", e);
    }
    Ok(result?)
}
