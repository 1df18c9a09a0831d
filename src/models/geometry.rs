//! 像素坐标系下的基础几何类型

use serde::{Deserialize, Serialize};

/// 像素坐标点
///
/// OCR 服务可能省略为 0 的坐标分量，反序列化时缺省为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Point {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 轴对齐包围盒 (x_min, y_min, x_max, y_max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BBox {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// 由任意多边形得到包围盒
    ///
    /// 退化的多边形（无顶点、零宽或零高）会被规整为围绕质心的最小盒子，
    /// 宽高至少为 1 像素，保证后续分组总能拿到可用的几何信息。
    pub fn from_polygon(points: &[Point]) -> Self {
        if points.is_empty() {
            return Self::new(0, 0, 1, 1);
        }

        let x_min = points.iter().map(|p| p.x).min().unwrap_or(0);
        let x_max = points.iter().map(|p| p.x).max().unwrap_or(0);
        let y_min = points.iter().map(|p| p.y).min().unwrap_or(0);
        let y_max = points.iter().map(|p| p.y).max().unwrap_or(0);

        let n = points.len() as i64;
        let cx = (points.iter().map(|p| p.x as i64).sum::<i64>() / n) as i32;
        let cy = (points.iter().map(|p| p.y as i64).sum::<i64>() / n) as i32;

        let (x_min, x_max) = if x_max > x_min {
            (x_min, x_max)
        } else {
            let cx = cx.min(i32::MAX - 1);
            (cx, cx + 1)
        };
        let (y_min, y_max) = if y_max > y_min {
            (y_min, y_max)
        } else {
            let cy = cy.min(i32::MAX - 1);
            (cy, cy + 1)
        };

        Self::new(x_min, y_min, x_max, y_max)
    }

    /// 宽度，超出 i32 范围时饱和
    pub fn width(&self) -> i32 {
        self.x_max.saturating_sub(self.x_min)
    }

    /// 高度，超出 i32 范围时饱和
    pub fn height(&self) -> i32 {
        self.y_max.saturating_sub(self.y_min)
    }

    pub fn area(&self) -> i64 {
        let w = (self.x_max as i64 - self.x_min as i64).max(0);
        let h = (self.y_max as i64 - self.y_min as i64).max(0);
        w.saturating_mul(h)
    }

    /// 质心（浮点）
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min as f64 + self.x_max as f64) / 2.0,
            (self.y_min as f64 + self.y_max as f64) / 2.0,
        )
    }

    /// 两个盒子的并集
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x_min.min(other.x_min),
            self.y_min.min(other.y_min),
            self.x_max.max(other.x_max),
            self.y_max.max(other.y_max),
        )
    }

    /// 点是否落在盒子内（含边界）
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }

    /// 是否与另一个盒子有面积相交（仅边界接触不算相交）
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }

    /// 平移
    pub fn translated(&self, dx: i32, dy: i32) -> BBox {
        BBox::new(
            self.x_min.saturating_add(dx),
            self.y_min.saturating_add(dy),
            self.x_max.saturating_add(dx),
            self.y_max.saturating_add(dy),
        )
    }

    /// 裁剪到 `[0, width] x [0, height]` 范围内，结果至少保留 1 像素
    pub fn clamped(&self, width: u32, height: u32) -> BBox {
        let w = (width as i32).max(1);
        let h = (height as i32).max(1);
        let x_min = self.x_min.clamp(0, w - 1);
        let y_min = self.y_min.clamp(0, h - 1);
        let x_max = self.x_max.clamp(x_min + 1, w);
        let y_max = self.y_max.clamp(y_min + 1, h);
        BBox::new(x_min, y_min, x_max, y_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_polygon_quad() {
        let quad = [
            Point::new(10, 10),
            Point::new(50, 10),
            Point::new(50, 30),
            Point::new(10, 30),
        ];
        assert_eq!(BBox::from_polygon(&quad), BBox::new(10, 10, 50, 30));
    }

    #[test]
    fn test_from_polygon_rotated_quad_uses_extremes() {
        let quad = [
            Point::new(12, 8),
            Point::new(52, 12),
            Point::new(50, 32),
            Point::new(10, 28),
        ];
        assert_eq!(BBox::from_polygon(&quad), BBox::new(10, 8, 52, 32));
    }

    #[test]
    fn test_degenerate_polygon_becomes_minimal_box_at_centroid() {
        let line = [
            Point::new(10, 20),
            Point::new(30, 20),
            Point::new(30, 20),
            Point::new(10, 20),
        ];
        let bbox = BBox::from_polygon(&line);
        assert_eq!(bbox, BBox::new(10, 20, 30, 21));

        let dot = [Point::new(7, 9); 4];
        assert_eq!(BBox::from_polygon(&dot), BBox::new(7, 9, 8, 10));

        assert_eq!(BBox::from_polygon(&[]), BBox::new(0, 0, 1, 1));
    }

    #[test]
    fn test_intersects_ignores_touching_edges() {
        let a = BBox::new(0, 0, 10, 10);
        assert!(a.intersects(&BBox::new(5, 5, 15, 15)));
        assert!(!a.intersects(&BBox::new(10, 0, 20, 10)));
        assert!(!a.intersects(&BBox::new(0, 10, 10, 20)));
    }

    #[test]
    fn test_clamped_keeps_box_inside_image() {
        let bbox = BBox::new(-5, 90, 120, 140);
        assert_eq!(bbox.clamped(100, 100), BBox::new(0, 90, 100, 100));

        let outside = BBox::new(150, 150, 160, 160);
        assert_eq!(outside.clamped(100, 100), BBox::new(99, 99, 100, 100));
    }

    #[test]
    fn test_extreme_coordinates_saturate() {
        let wide = BBox::new(-2_000_000_000, 0, 2_000_000_000, 20);
        assert_eq!(wide.width(), i32::MAX);
        assert_eq!(wide.area(), 4_000_000_000 * 20);
        assert_eq!(wide.center(), (0.0, 10.0));

        let corner = BBox::from_polygon(&[Point::new(i32::MAX, i32::MAX)]);
        assert_eq!(corner, BBox::new(i32::MAX - 1, i32::MAX - 1, i32::MAX, i32::MAX));
    }
}

