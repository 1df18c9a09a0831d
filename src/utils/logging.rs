//! 日志工具模块
//!
//! 提供日志初始化和运行步骤输出的辅助函数

use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::AssessmentSummary;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时 verbose 模式为 debug，否则为 info。
/// 重复初始化（例如测试中）会被忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `image_path`: 待批改的图片
/// - `out_dir`: 本次运行的输出目录
pub fn log_startup(image_path: &Path, out_dir: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 手写作业批改");
    info!("🖼️ 图片: {}", image_path.display());
    info!("📁 输出目录: {}", out_dir.display());
    info!("{}", "=".repeat(60));
}

/// 记录单个步骤开始
pub fn log_step(index: usize, total: usize, title: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📌 步骤 {}/{}: {}", index, total, title);
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 批改结论统计
/// - `warnings`: 警告数量
/// - `out_dir`: 输出目录
pub fn print_final_stats(summary: &AssessmentSummary, warnings: usize, out_dir: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批改完成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 正确: {}", summary.correct);
    info!("❌ 错误: {}", summary.incorrect);
    info!("💡 建议: {}", summary.suggestion);
    if let Some(status) = &summary.assessment.final_answer_status {
        info!("🎯 最终答案: {}", status);
    }
    if warnings > 0 {
        info!("⚠️ 警告: {} 条，详见 warnings.txt", warnings);
    }
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", out_dir.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
