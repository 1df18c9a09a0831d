//! 叠加图合成 - 渲染层
//!
//! 在源图副本上为每条批改结论绘制标记（勾/叉/圈），并绘制整体评价面板。
//! 源图只读；画布由合成器独占，合成完成后不再修改。

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::models::{
    AssessmentSummary, BBox, Correction, CorrectionKind, OverallAssessment, RegionId, RegionIndex,
};
use crate::render::font::OverlayFont;
use crate::render::layout::{AnnotationLayout, Placement};

const GREEN: Rgba<u8> = Rgba([0, 160, 0, 255]);
const RED: Rgba<u8> = Rgba([220, 30, 30, 255]);
const ORANGE: Rgba<u8> = Rgba([235, 140, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 180, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PANEL_BORDER: Rgba<u8> = Rgba([90, 90, 90, 255]);

/// 面板与画布边缘的距离
const PANEL_MARGIN: i32 = 10;
const PANEL_PADDING: i32 = 12;
const LABEL_GAP: i32 = 4;

/// 已放置的批注
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedAnnotation {
    pub region_id: RegionId,
    pub kind: CorrectionKind,
    pub placement: Placement,
}

/// 汇总面板的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPlacement {
    /// 图片底部空白处
    Bottom(BBox),
    /// 图片右侧空白处
    Right(BBox),
    /// 没有足够空白，画布向下扩展
    Extended(BBox),
}

impl PanelPlacement {
    pub fn rect(&self) -> BBox {
        match self {
            PanelPlacement::Bottom(r) | PanelPlacement::Right(r) | PanelPlacement::Extended(r) => *r,
        }
    }
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pub image: RgbaImage,
    pub annotations: Vec<PlacedAnnotation>,
    pub panel: Option<PanelPlacement>,
}

/// 面板中的一行文字
#[derive(Debug, Clone, PartialEq)]
struct PanelLine {
    text: String,
    color: Rgba<u8>,
    indent: i32,
}

/// 叠加图合成器
pub struct OverlayCompositor<'a> {
    config: &'a OverlayConfig,
    font: &'a OverlayFont,
}

impl<'a> OverlayCompositor<'a> {
    pub fn new(config: &'a OverlayConfig, font: &'a OverlayFont) -> Self {
        Self { config, font }
    }

    /// 合成叠加图
    ///
    /// 没有任何批改结论时原样返回源图副本，统计全为 0。
    pub fn compose(
        &self,
        source: &DynamicImage,
        index: &RegionIndex,
        corrections: &[Correction],
        assessment: &OverallAssessment,
    ) -> (AnnotatedImage, AssessmentSummary) {
        let summary = AssessmentSummary::from_corrections(corrections, assessment.clone());
        let source = source.to_rgba8();

        if corrections.is_empty() {
            info!("没有批改结论，输出原图");
            return (
                AnnotatedImage {
                    image: source,
                    annotations: Vec::new(),
                    panel: None,
                },
                summary,
            );
        }

        let (width, height) = source.dimensions();
        let regions = index.clamped_to(width, height);
        let panel = self.choose_panel_placement(&regions, width, height);

        let (canvas_w, canvas_h) = match panel {
            PanelPlacement::Extended(rect) => (
                width.max((rect.x_max + PANEL_MARGIN) as u32),
                (rect.y_max + PANEL_MARGIN) as u32,
            ),
            _ => (width, height),
        };

        let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, WHITE);
        image::imageops::replace(&mut canvas, &source, 0, 0);

        let mut layout = AnnotationLayout::new(
            self.config.displacement_step,
            self.config.max_displacement_retries,
            (canvas_w, canvas_h),
        );
        layout.reserve(panel.rect());

        let mut annotations = Vec::with_capacity(corrections.len());
        for correction in corrections {
            let Some(region) = regions.get(correction.region_id) else {
                warn!("⚠️ 区域 {} 不在索引中，跳过该批注", correction.region_id);
                continue;
            };

            let label = self.label_for(correction);
            let desired = self.annotation_rect(region.bbox, label);
            let placement = layout.place(desired);
            if placement.overlapping {
                debug!("区域 {} 的批注无法避开重叠，按原位置绘制", region.id);
            }

            if correction.kind == CorrectionKind::Incorrect {
                self.outline_region(&mut canvas, region.bbox);
            }
            self.draw_annotation(&mut canvas, correction.kind, &placement, label);

            annotations.push(PlacedAnnotation {
                region_id: correction.region_id,
                kind: correction.kind,
                placement,
            });
        }

        self.draw_panel(&mut canvas, panel.rect(), &summary);

        (
            AnnotatedImage {
                image: canvas,
                annotations,
                panel: Some(panel),
            },
            summary,
        )
    }

    /// 面板优先放在底部空白处，其次右侧，都放不下就扩展画布
    fn choose_panel_placement(&self, regions: &RegionIndex, width: u32, height: u32) -> PanelPlacement {
        let panel_w = self.config.panel_width.max(1) as i32;
        let panel_h = self.config.panel_height.max(1) as i32;
        let (w, h) = (width as i32, height as i32);
        let (content_right, content_bottom) = regions
            .extent()
            .map(|e| (e.x_max, e.y_max))
            .unwrap_or((0, 0));

        let fits_width = w >= panel_w + 2 * PANEL_MARGIN;
        let fits_height = h >= panel_h + 2 * PANEL_MARGIN;

        if fits_width && h - content_bottom >= panel_h + 2 * PANEL_MARGIN {
            return PanelPlacement::Bottom(BBox::new(
                PANEL_MARGIN,
                h - PANEL_MARGIN - panel_h,
                PANEL_MARGIN + panel_w,
                h - PANEL_MARGIN,
            ));
        }

        if fits_height && w - content_right >= panel_w + 2 * PANEL_MARGIN {
            return PanelPlacement::Right(BBox::new(
                w - PANEL_MARGIN - panel_w,
                PANEL_MARGIN,
                w - PANEL_MARGIN,
                PANEL_MARGIN + panel_h,
            ));
        }

        PanelPlacement::Extended(BBox::new(
            PANEL_MARGIN,
            h + PANEL_MARGIN,
            PANEL_MARGIN + panel_w,
            h + PANEL_MARGIN + panel_h,
        ))
    }

    /// 需要显示替换文字时返回该文字
    fn label_for<'c>(&self, correction: &'c Correction) -> Option<&'c str> {
        match correction.kind {
            CorrectionKind::Correct => None,
            CorrectionKind::Incorrect | CorrectionKind::Suggestion => {
                correction.replacement_text.as_deref().filter(|t| !t.is_empty())
            }
        }
    }

    /// 批注的期望位置：区域右上角向外偏移，标记在左、替换文字在右
    fn annotation_rect(&self, bbox: BBox, label: Option<&str>) -> BBox {
        let glyph = self.config.glyph_size.max(4) as i32;
        let label_w = label
            .map(|t| self.font.text_width(t, self.config.font_size) as i32 + LABEL_GAP)
            .unwrap_or(0);
        let label_h = label
            .map(|_| self.font.line_height(self.config.font_size) as i32)
            .unwrap_or(0);

        let x0 = bbox.x_max + self.config.anchor_margin;
        let y0 = bbox.y_min - self.config.anchor_margin;
        BBox::new(x0, y0, x0 + glyph + label_w, y0 + glyph.max(label_h))
    }

    fn outline_region(&self, canvas: &mut RgbaImage, bbox: BBox) {
        let padding = (self.config.glyph_size / 5) as i32;
        let outer = BBox::new(
            bbox.x_min - padding,
            bbox.y_min - padding,
            bbox.x_max + padding,
            bbox.y_max + padding,
        );
        for i in 0..3 {
            if let Some(rect) = to_rect(BBox::new(
                outer.x_min - i,
                outer.y_min - i,
                outer.x_max + i,
                outer.y_max + i,
            )) {
                draw_hollow_rect_mut(canvas, rect, RED);
            }
        }
    }

    fn draw_annotation(
        &self,
        canvas: &mut RgbaImage,
        kind: CorrectionKind,
        placement: &Placement,
        label: Option<&str>,
    ) {
        let g = self.config.glyph_size.max(4) as f32;
        let x = placement.rect.x_min as f32;
        let y = placement.rect.y_min as f32;
        let thickness = (g / 8.0).max(2.0) as i32;

        match kind {
            CorrectionKind::Correct => {
                draw_thick_line(canvas, (x + 0.15 * g, y + 0.55 * g), (x + 0.4 * g, y + 0.8 * g), thickness, GREEN);
                draw_thick_line(canvas, (x + 0.4 * g, y + 0.8 * g), (x + 0.9 * g, y + 0.15 * g), thickness, GREEN);
            }
            CorrectionKind::Incorrect => {
                draw_thick_line(canvas, (x + 0.15 * g, y + 0.15 * g), (x + 0.85 * g, y + 0.85 * g), thickness, RED);
                draw_thick_line(canvas, (x + 0.85 * g, y + 0.15 * g), (x + 0.15 * g, y + 0.85 * g), thickness, RED);
            }
            CorrectionKind::Suggestion => {
                let center = ((x + g / 2.0) as i32, (y + g / 2.0) as i32);
                let radius = (g / 2.0) as i32 - 1;
                for r in 0..thickness {
                    draw_hollow_circle_mut(canvas, center, (radius - r).max(1), ORANGE);
                }
            }
        }

        if let Some(text) = label {
            let color = match kind {
                CorrectionKind::Suggestion => ORANGE,
                _ => RED,
            };
            self.font.draw(
                canvas,
                color,
                placement.rect.x_min + g as i32 + LABEL_GAP,
                placement.rect.y_min,
                self.config.font_size,
                text,
            );
        }
    }

    fn draw_panel(&self, canvas: &mut RgbaImage, rect: BBox, summary: &AssessmentSummary) {
        if let Some(r) = to_rect(rect) {
            draw_filled_rect_mut(canvas, r, WHITE);
            draw_hollow_rect_mut(canvas, r, PANEL_BORDER);
        }

        let size = self.config.font_size * 0.8;
        let line_h = self.font.line_height(size) as i32;
        let max_width = (rect.width() - 2 * PANEL_PADDING).max(1) as u32;
        let mut y = rect.y_min + PANEL_PADDING;

        for line in self.panel_lines(summary, size, max_width) {
            if y + line_h > rect.y_max - PANEL_PADDING {
                debug!("面板空间不足，剩余内容被截断");
                break;
            }
            self.font.draw(
                canvas,
                line.color,
                rect.x_min + PANEL_PADDING + line.indent,
                y,
                size,
                &line.text,
            );
            y += line_h;
        }
    }

    /// 面板文字内容（已按宽度换行）
    fn panel_lines(&self, summary: &AssessmentSummary, size: f32, max_width: u32) -> Vec<PanelLine> {
        let indent = (size * 1.2) as i32;
        let wrapped_width = max_width.saturating_sub(indent as u32).max(1);
        let mut lines = vec![
            PanelLine {
                text: "OVERALL ASSESSMENT".to_string(),
                color: BLACK,
                indent: 0,
            },
            PanelLine {
                text: format!(
                    "Correct: {}   Incorrect: {}   Suggestions: {}",
                    summary.correct, summary.incorrect, summary.suggestion
                ),
                color: BLUE,
                indent: 0,
            },
        ];

        let assessment = &summary.assessment;
        if let Some(status) = &assessment.final_answer_status {
            let color = match status.trim().to_ascii_lowercase().as_str() {
                "correct" => GREEN,
                "incorrect" => RED,
                _ => ORANGE,
            };
            lines.push(PanelLine {
                text: format!("Final answer: {}", status.to_uppercase()),
                color,
                indent: 0,
            });
        }

        let sections = [
            ("Key strengths:", assessment.key_strengths.as_deref(), GREEN),
            ("Areas for improvement:", assessment.areas_for_improvement.as_deref(), RED),
            ("Comments:", assessment.commentary.as_deref(), BLACK),
        ];
        for (title, body, color) in sections {
            let Some(body) = body else { continue };
            lines.push(PanelLine {
                text: title.to_string(),
                color: BLUE,
                indent: 0,
            });
            for (i, text) in self.font.wrap(body, size, wrapped_width).into_iter().enumerate() {
                let text = if i == 0 { format!("- {}", text) } else { text };
                lines.push(PanelLine { text, color, indent });
            }
        }

        lines
    }
}

fn to_rect(b: BBox) -> Option<Rect> {
    if b.width() <= 0 || b.height() <= 0 {
        return None;
    }
    Some(Rect::at(b.x_min, b.y_min).of_size(b.width() as u32, b.height() as u32))
}

fn draw_thick_line(canvas: &mut RgbaImage, start: (f32, f32), end: (f32, f32), thickness: i32, color: Rgba<u8>) {
    let half = thickness / 2;
    for dx in -half..=half {
        for dy in -half..=half {
            let (ox, oy) = (dx as f32, dy as f32);
            draw_line_segment_mut(canvas, (start.0 + ox, start.1 + oy), (end.0 + ox, end.1 + oy), color);
        }
    }
}
