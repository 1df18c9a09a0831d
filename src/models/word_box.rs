use serde::{Deserialize, Serialize};

use super::geometry::{BBox, Point};

/// OCR 识别出的单个词及其像素多边形
///
/// 由 OCR 客户端在 I/O 边界处构造一次，之后只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    /// 顶点顺序与 OCR 返回一致，通常为 4 个点
    pub polygon: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl WordBox {
    pub fn new(text: impl Into<String>, polygon: Vec<Point>) -> Self {
        Self {
            text: text.into(),
            polygon,
            confidence: None,
        }
    }

    /// 由轴对齐矩形构造（部分 OCR 只返回矩形）
    pub fn from_rect(text: impl Into<String>, x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self::new(
            text,
            vec![
                Point::new(x_min, y_min),
                Point::new(x_max, y_min),
                Point::new(x_max, y_max),
                Point::new(x_min, y_max),
            ],
        )
    }

    /// 规整后的包围盒
    pub fn bbox(&self) -> BBox {
        BBox::from_polygon(&self.polygon)
    }
}
