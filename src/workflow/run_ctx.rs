//! 运行上下文
//!
//! 封装"正在批改哪张图片、结果写到哪里"这一信息

use std::fmt::Display;
use std::path::PathBuf;

/// 单次运行的上下文
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 待批改的图片
    pub image_path: PathBuf,

    /// 本次运行的输出目录
    pub out_dir: PathBuf,
}

impl RunCtx {
    pub fn new(image_path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            out_dir: out_dir.into(),
        }
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.image_path.display().to_string());
        write!(f, "[图片 {} → {}]", name, self.out_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_file_name() {
        let ctx = RunCtx::new("/data/scans/page1.png", "outputs/20250101_120000");
        assert_eq!(ctx.to_string(), "[图片 page1.png → outputs/20250101_120000]");
    }
}
