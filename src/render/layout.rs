//! 批注排版：避免批注彼此重叠
//!
//! 维护已占用区域列表；新批注与任何已占用区域相交时向下平移固定步长重试，
//! 次数用尽后退回原位置（允许重叠），批注永远不会被丢弃。

use crate::models::BBox;

/// 一次放置的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub rect: BBox,
    /// 相对期望位置的垂直位移
    pub displaced_by: i32,
    /// 重试用尽、按原位置重叠放置
    pub overlapping: bool,
}

/// 批注排版器
#[derive(Debug, Clone)]
pub struct AnnotationLayout {
    occupied: Vec<BBox>,
    step: i32,
    max_retries: u32,
    bounds: (u32, u32),
}

impl AnnotationLayout {
    /// - `step`: 每次平移的像素数
    /// - `max_retries`: 最多平移次数
    /// - `bounds`: 画布尺寸，平移后的位置会被限制在画布内
    pub fn new(step: i32, max_retries: u32, bounds: (u32, u32)) -> Self {
        Self {
            occupied: Vec::new(),
            step: step.max(1),
            max_retries,
            bounds,
        }
    }

    /// 预先占用一块区域（例如汇总面板）
    pub fn reserve(&mut self, rect: BBox) {
        self.occupied.push(rect);
    }

    pub fn occupied(&self) -> &[BBox] {
        &self.occupied
    }

    /// 放置一个批注
    pub fn place(&mut self, desired: BBox) -> Placement {
        let desired = self.fit(desired);

        for attempt in 0..=self.max_retries {
            let dy = attempt as i32 * self.step;
            let candidate = self.fit(desired.translated(0, dy));
            if !self.collides(&candidate) {
                self.occupied.push(candidate);
                return Placement {
                    rect: candidate,
                    displaced_by: candidate.y_min - desired.y_min,
                    overlapping: false,
                };
            }
        }

        self.occupied.push(desired);
        Placement {
            rect: desired,
            displaced_by: 0,
            overlapping: true,
        }
    }

    fn collides(&self, rect: &BBox) -> bool {
        self.occupied.iter().any(|o| o.intersects(rect))
    }

    /// 在不改变尺寸的前提下把矩形挪进画布
    fn fit(&self, rect: BBox) -> BBox {
        let (w, h) = (self.bounds.0 as i32, self.bounds.1 as i32);
        let dx = if rect.x_max > w {
            w - rect.x_max
        } else {
            0
        };
        let dy = if rect.y_max > h {
            h - rect.y_max
        } else {
            0
        };
        let moved = rect.translated(dx, dy);
        let dx = if moved.x_min < 0 { -moved.x_min } else { 0 };
        let dy = if moved.y_min < 0 { -moved.y_min } else { 0 };
        moved.translated(dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_colliding_annotation_stays_put() {
        let mut layout = AnnotationLayout::new(30, 5, (500, 500));
        let p = layout.place(BBox::new(100, 100, 128, 128));
        assert_eq!(p.rect, BBox::new(100, 100, 128, 128));
        assert_eq!(p.displaced_by, 0);
        assert!(!p.overlapping);
    }

    #[test]
    fn test_nearby_annotations_are_separated() {
        let mut layout = AnnotationLayout::new(30, 5, (500, 500));
        let a = layout.place(BBox::new(100, 100, 128, 128));
        // 锚点只差 4 像素
        let b = layout.place(BBox::new(104, 102, 132, 130));
        let c = layout.place(BBox::new(98, 99, 126, 127));

        for (x, y) in [(a, b), (a, c), (b, c)] {
            assert!(!x.rect.intersects(&y.rect), "{:?} 与 {:?} 重叠", x.rect, y.rect);
        }
        assert!(b.displaced_by > 0);
        assert!(c.displaced_by > b.displaced_by);
    }

    #[test]
    fn test_exhausted_retries_fall_back_to_original_position() {
        // 画布很矮，向下平移会被限制在画布内，始终重叠
        let mut layout = AnnotationLayout::new(10, 3, (200, 40));
        layout.reserve(BBox::new(0, 0, 200, 40));
        let p = layout.place(BBox::new(50, 5, 70, 25));
        assert!(p.overlapping);
        assert_eq!(p.rect, BBox::new(50, 5, 70, 25));
        assert_eq!(layout.occupied().len(), 2);
    }

    #[test]
    fn test_annotation_outside_canvas_is_pulled_in() {
        let mut layout = AnnotationLayout::new(30, 5, (100, 100));
        let p = layout.place(BBox::new(90, -10, 118, 18));
        assert_eq!(p.rect, BBox::new(72, 0, 100, 28));
    }
}
