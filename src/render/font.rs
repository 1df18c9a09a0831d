//! 批注字体加载与度量
//!
//! 优先使用配置中的字体；不可用时依次尝试常见系统字体。都找不到时
//! 文字层不绘制，但仍用近似度量参与排版，整体流程不因字体失败。

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FALLBACK_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 无字体时每个字符的近似宽度（相对字号）
const APPROX_ADVANCE: f32 = 0.55;

/// 叠加图使用的字体
pub struct OverlayFont {
    font: Option<FontVec>,
    source: Option<PathBuf>,
}

impl OverlayFont {
    /// 加载字体，返回字体和加载过程中产生的警告
    pub fn load(preferred: Option<&Path>) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(path) = preferred {
            match read_font(path) {
                Some(font) => {
                    debug!("使用首选字体: {}", path.display());
                    return (Self::from_font(font, path), warnings);
                }
                None => {
                    let msg = format!("首选字体不可用: {}，改用默认字体", path.display());
                    warn!("⚠️ {}", msg);
                    warnings.push(msg);
                }
            }
        }

        for candidate in FALLBACK_FONT_PATHS {
            let path = Path::new(candidate);
            if let Some(font) = read_font(path) {
                debug!("使用默认字体: {}", path.display());
                return (Self::from_font(font, path), warnings);
            }
        }

        let msg = "找不到可用字体，叠加图将不绘制文字".to_string();
        warn!("⚠️ {}", msg);
        warnings.push(msg);
        (Self::without_font(), warnings)
    }

    /// 不带字体（只绘制图形标记）
    pub fn without_font() -> Self {
        Self {
            font: None,
            source: None,
        }
    }

    fn from_font(font: FontVec, path: &Path) -> Self {
        Self {
            font: Some(font),
            source: Some(path.to_path_buf()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.font.is_some()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 文字宽度（像素）
    pub fn text_width(&self, text: &str, size: f32) -> u32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(size), font, text).0,
            None => (text.chars().count() as f32 * size * APPROX_ADVANCE).ceil() as u32,
        }
    }

    /// 行高（像素）
    pub fn line_height(&self, size: f32) -> u32 {
        (size * 1.3).ceil() as u32
    }

    /// 绘制单行文字；没有字体时什么也不画
    pub fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: i32, y: i32, size: f32, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, x, y, PxScale::from(size), font, text);
        }
    }

    /// 按宽度换行；单个超宽的词独占一行
    pub fn wrap(&self, text: &str, size: f32, max_width: u32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if self.text_width(&candidate, size) <= max_width || current.is_empty() {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

fn read_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    FontVec::try_from_vec(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_preferred_font_is_a_warning() {
        let (_, warnings) = OverlayFont::load(Some(Path::new("/no/such/font.ttf")));
        assert!(warnings.iter().any(|w| w.contains("/no/such/font.ttf")));
    }

    #[test]
    fn test_wrap_respects_width_with_approximate_metrics() {
        let font = OverlayFont::without_font();
        // 字号 20 时每字符约 11 像素
        let lines = font.wrap("one two three four five six", 20.0, 100);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(font.text_width(line, 20.0) <= 100, "行过宽: {}", line);
        }
        assert_eq!(lines.join(" "), "one two three four five six");
    }

    #[test]
    fn test_wrap_keeps_overlong_word() {
        let font = OverlayFont::without_font();
        let lines = font.wrap("supercalifragilistic ok", 20.0, 40);
        assert_eq!(lines, vec!["supercalifragilistic".to_string(), "ok".to_string()]);
    }
}
