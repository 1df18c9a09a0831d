//! 运行产物存储 - 基础设施层
//!
//! 持有本次运行的输出目录，只暴露"原子写入一个产物"的能力：
//! 先写同目录下的临时文件，再重命名到目标位置。

use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppError, AppResult, RenderError};
use crate::services::WarnWriter;

/// 产物文件名
pub mod names {
    pub const OCR_WORDS: &str = "ocr_words.json";
    pub const OCR_DATA: &str = "ocr_data.json";
    pub const VISUALIZED_BOXES: &str = "visualized_boxes.png";
    pub const GRADING_PROMPT: &str = "grading_prompt.txt";
    pub const GRADING_RESPONSE: &str = "grading_response.txt";
    pub const CORRECTIONS: &str = "corrections.json";
    pub const WARNINGS: &str = "warnings.txt";
    pub const CORRECTED_OVERLAY: &str = "corrected_overlay.png";
    pub const IMAGE_INFO: &str = "image_info.json";
}

/// 运行产物存储
pub struct ArtifactStore {
    out_dir: PathBuf,
}

impl ArtifactStore {
    /// 打开（必要时创建）输出目录
    pub async fn open(out_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let out_dir = out_dir.into();
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| AppError::file_write_failed(out_dir.display().to_string(), e))?;
        Ok(Self { out_dir })
    }

    /// `<root>/<YYYYmmdd_HHMMSS>`
    pub fn timestamped_dir(root: &Path) -> PathBuf {
        root.join(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    pub fn warn_writer(&self) -> WarnWriter {
        WarnWriter::with_path(self.path(names::WARNINGS))
    }

    /// 原子写入字节
    pub async fn write_bytes(&self, name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        let target = self.path(name);
        let tmp = self.out_dir.join(format!(".{}.tmp", name));

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| AppError::file_write_failed(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| AppError::file_write_failed(target.display().to_string(), e))?;

        debug!("💾 已写入 {} ({} 字节)", target.display(), bytes.len());
        Ok(target)
    }

    pub async fn write_text(&self, name: &str, text: &str) -> AppResult<PathBuf> {
        self.write_bytes(name, text.as_bytes()).await
    }

    /// 以缩进格式写入 JSON
    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> AppResult<PathBuf> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::file_write_failed(self.path(name).display().to_string(), e))?;
        self.write_bytes(name, &json).await
    }

    /// 编码为 PNG 后写入
    pub async fn write_png(&self, name: &str, image: &RgbaImage) -> AppResult<PathBuf> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| RenderError::EncodeFailed { source: Box::new(e) })?;
        self.write_bytes(name, &buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("run")).await.unwrap();

        let path = store.write_text(names::GRADING_PROMPT, "Region 0:").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Region 0:");
        let entries: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_write_json_and_png() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();

        store
            .write_json(names::IMAGE_INFO, &serde_json::json!({"width": 4, "height": 2}))
            .await
            .unwrap();
        let png = store
            .write_png(names::CORRECTED_OVERLAY, &RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255])))
            .await
            .unwrap();

        let info: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path(names::IMAGE_INFO)).unwrap()).unwrap();
        assert_eq!(info["width"], 4);
        assert_eq!(image::open(png).unwrap().to_rgba8().dimensions(), (4, 2));
    }

    #[test]
    fn test_timestamped_dir_is_under_root() {
        let dir = ArtifactStore::timestamped_dir(Path::new("outputs"));
        assert!(dir.starts_with("outputs"));
        assert_eq!(dir.file_name().unwrap().to_string_lossy().len(), 15);
    }
}
