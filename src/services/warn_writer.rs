//! 警告写入服务 - 业务能力层
//!
//! 只负责把校验警告追加写入 warnings.txt，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::ValidationWarning;

/// 警告写入服务
///
/// 职责：
/// - 将非致命的校验警告落盘，方便运行结束后排查
/// - 不影响流水线结果
pub struct WarnWriter {
    warn_file_path: PathBuf,
}

impl WarnWriter {
    /// 使用默认文件名创建
    pub fn new() -> Self {
        Self {
            warn_file_path: PathBuf::from("warnings.txt"),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.warn_file_path
    }

    /// 追加写入一组警告
    ///
    /// # 参数
    /// - `source`: 警告来源（例如 "grading_response.txt"）
    /// - `warnings`: 警告列表，为空时不创建文件
    pub fn write(&self, source: &str, warnings: &[ValidationWarning]) -> Result<()> {
        if warnings.is_empty() {
            return Ok(());
        }

        debug!(
            "写入 {} 条警告到 {}",
            warnings.len(),
            self.warn_file_path.display()
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)?;

        for warning in warnings {
            writeln!(file, "{} | {}", source, warning)?;
        }

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}
