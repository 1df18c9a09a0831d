//! OCR 区域预览图
//!
//! 用循环配色框出每个区域，并标注 `ID:<id> (<词数>): <文字>`，
//! 方便在调用批改模型之前人工核对分组结果。

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::models::{BBox, RegionIndex};
use crate::render::font::OverlayFont;
use crate::utils::logging::truncate_text;

const PALETTE: [Rgba<u8>; 6] = [
    Rgba([230, 25, 75, 255]),
    Rgba([60, 180, 75, 255]),
    Rgba([0, 130, 200, 255]),
    Rgba([245, 130, 48, 255]),
    Rgba([145, 30, 180, 255]),
    Rgba([0, 128, 128, 255]),
];
const LABEL_BG: Rgba<u8> = Rgba([255, 255, 255, 230]);
const LABEL_SIZE: f32 = 14.0;
const LABEL_TEXT_CHARS: usize = 30;

/// 预览标签文字
pub fn region_label(id: u32, word_count: u32, text: &str) -> String {
    format!("ID:{} ({}): {}", id, word_count, truncate_text(text, LABEL_TEXT_CHARS))
}

/// 绘制区域预览图
pub fn render_region_preview(source: &DynamicImage, index: &RegionIndex, font: &OverlayFont) -> RgbaImage {
    let mut canvas = source.to_rgba8();
    let (width, height) = canvas.dimensions();
    let regions = index.clamped_to(width, height);
    let line_h = font.line_height(LABEL_SIZE) as i32;

    for (i, region) in regions.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let b = region.bbox;
        for grow in 0..2 {
            if let Some(rect) = rect_of(BBox::new(b.x_min - grow, b.y_min - grow, b.x_max + grow, b.y_max + grow)) {
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }
        }

        let label = region_label(region.id.0, region.word_count, &region.text);
        let label_w = font.text_width(&label, LABEL_SIZE) as i32 + 6;
        // 标签放在框上方，放不下时放在框下方
        let label_y = if b.y_min - line_h - 2 >= 0 {
            b.y_min - line_h - 2
        } else {
            b.y_max + 2
        };

        if let Some(rect) = rect_of(BBox::new(b.x_min, label_y, b.x_min + label_w, label_y + line_h)) {
            draw_filled_rect_mut(&mut canvas, rect, LABEL_BG);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
        font.draw(&mut canvas, color, b.x_min + 3, label_y, LABEL_SIZE, &label);
    }

    canvas
}

fn rect_of(b: BBox) -> Option<Rect> {
    if b.width() <= 0 || b.height() <= 0 {
        return None;
    }
    Some(Rect::at(b.x_min, b.y_min).of_size(b.width() as u32, b.height() as u32))
}
