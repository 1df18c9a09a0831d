//! 词框分组服务 - 业务能力层
//!
//! 把 OCR 返回的零散词框按行聚类、行内按间隙合并，产出带稳定 ID 的区域。
//!
//! ## 算法
//! 1. 多边形 → 轴对齐包围盒（退化盒子规整为最小盒子）
//! 2. 计算中位高度 / 中位宽度
//! 3. 按垂直中心排序（相同时按左边界），再按与行平均中心的距离聚成行
//! 4. 行内按左边界排序，间隙小于阈值的相邻词合并
//! 5. 从上到下、从左到右依次分配 ID

use tracing::debug;

use crate::config::GroupingConfig;
use crate::models::{BBox, Region, RegionId, RegionIndex, WordBox};

/// 分组结果
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub index: RegionIndex,
    /// `assignments[i]` 为第 i 个输入词所属区域
    pub assignments: Vec<RegionId>,
}

/// 词框分组器
///
/// 职责：
/// - 只处理几何与排序，不做任何 I/O
/// - 永远不会因为数据形状失败
#[derive(Debug, Clone, Default)]
pub struct BoxGrouper {
    config: GroupingConfig,
}

/// 规整后的词
struct NormalizedWord<'a> {
    input_pos: usize,
    text: &'a str,
    bbox: BBox,
}

impl NormalizedWord<'_> {
    /// 垂直中心的两倍，用整数比较避免浮点误差
    fn center_y2(&self) -> i64 {
        self.bbox.y_min as i64 + self.bbox.y_max as i64
    }
}

impl BoxGrouper {
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    pub fn group(&self, words: &[WordBox]) -> Grouping {
        if words.is_empty() {
            debug!("没有词框，返回空的区域索引");
            return Grouping {
                index: RegionIndex::empty(),
                assignments: Vec::new(),
            };
        }

        let mut normalized: Vec<NormalizedWord> = words
            .iter()
            .enumerate()
            .map(|(input_pos, w)| NormalizedWord {
                input_pos,
                text: w.text.trim(),
                bbox: w.bbox(),
            })
            .collect();

        let median_height = median(normalized.iter().map(|w| w.bbox.height() as f64));
        let median_width = median(normalized.iter().map(|w| w.bbox.width() as f64));
        let line_tolerance = self.config.line_tolerance_ratio * median_height;
        let gap_tolerance = self.config.word_gap_ratio * median_width;

        debug!(
            "分组参数: 中位高度 {:.1}, 中位宽度 {:.1}, 行容差 {:.1}, 间隙容差 {:.1}",
            median_height, median_width, line_tolerance, gap_tolerance
        );

        normalized.sort_by_key(|w| (w.center_y2(), w.bbox.x_min, w.input_pos));

        let lines = cluster_lines(normalized, line_tolerance);

        let mut regions = Vec::new();
        let mut assignments = vec![RegionId(0); words.len()];

        for (line_index, mut line) in lines.into_iter().enumerate() {
            line.sort_by_key(|w| (w.bbox.x_min, w.center_y2(), w.input_pos));

            let mut current: Option<RegionBuilder> = None;
            for word in line {
                let merges = current.as_ref().map_or(false, |builder| {
                    ((word.bbox.x_min as i64 - builder.bbox.x_max as i64) as f64) < gap_tolerance
                });

                if merges {
                    if let Some(builder) = current.as_mut() {
                        builder.push(&word);
                    }
                    continue;
                }

                if let Some(done) = current.take() {
                    regions.push(done.finish(&mut assignments));
                }
                let id = RegionId(regions.len() as u32);
                current = Some(RegionBuilder::start(id, line_index as u32, &word));
            }
            if let Some(done) = current.take() {
                regions.push(done.finish(&mut assignments));
            }
        }

        debug!("{} 个词分组为 {} 个区域", words.len(), regions.len());

        // ID 按构造顺序连续分配，不可能重复
        let index = RegionIndex::from_regions(regions).unwrap_or_default();

        Grouping { index, assignments }
    }
}

/// 按垂直中心聚成行，输入需已按垂直中心排序
fn cluster_lines(sorted: Vec<NormalizedWord<'_>>, tolerance: f64) -> Vec<Vec<NormalizedWord<'_>>> {
    let mut lines: Vec<Vec<NormalizedWord>> = Vec::new();
    let mut line_center_sum = 0.0;

    for word in sorted {
        let center = word.center_y2() as f64 / 2.0;
        let joins_current = match lines.last() {
            Some(line) => (center - line_center_sum / line.len() as f64).abs() <= tolerance,
            None => false,
        };

        if joins_current {
            line_center_sum += center;
            if let Some(line) = lines.last_mut() {
                line.push(word);
            }
        } else {
            line_center_sum = center;
            lines.push(vec![word]);
        }
    }

    lines
}

struct RegionBuilder {
    id: RegionId,
    line_index: u32,
    texts: Vec<String>,
    members: Vec<usize>,
    bbox: BBox,
}

impl RegionBuilder {
    fn start(id: RegionId, line_index: u32, word: &NormalizedWord<'_>) -> Self {
        let mut builder = Self {
            id,
            line_index,
            texts: Vec::new(),
            members: Vec::new(),
            bbox: word.bbox,
        };
        builder.push(word);
        builder
    }

    fn push(&mut self, word: &NormalizedWord<'_>) {
        if !word.text.is_empty() {
            self.texts.push(word.text.to_string());
        }
        self.members.push(word.input_pos);
        self.bbox = self.bbox.union(&word.bbox);
    }

    fn finish(self, assignments: &mut [RegionId]) -> Region {
        for &pos in &self.members {
            assignments[pos] = self.id;
        }
        Region {
            id: self.id,
            text: self.texts.join(" "),
            bbox: self.bbox,
            line_index: self.line_index,
            word_count: self.members.len() as u32,
        }
    }
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn grouper() -> BoxGrouper {
        BoxGrouper::new(GroupingConfig::default())
    }

    #[test]
    fn test_empty_input_yields_empty_index() {
        let grouping = grouper().group(&[]);
        assert!(grouping.index.is_empty());
        assert!(grouping.assignments.is_empty());
    }

    #[test]
    fn test_close_words_merge_into_one_region() {
        let words = vec![
            WordBox::new(
                "the",
                vec![
                    Point::new(10, 10),
                    Point::new(50, 10),
                    Point::new(50, 30),
                    Point::new(10, 30),
                ],
            ),
            WordBox::new(
                "cat",
                vec![
                    Point::new(55, 10),
                    Point::new(90, 10),
                    Point::new(90, 30),
                    Point::new(55, 30),
                ],
            ),
        ];

        let grouping = grouper().group(&words);

        assert_eq!(grouping.index.len(), 1);
        let region = grouping.index.get(RegionId(0)).unwrap();
        assert_eq!(region.text, "the cat");
        assert_eq!(region.bbox, BBox::new(10, 10, 90, 30));
        assert_eq!(region.word_count, 2);
        assert_eq!(grouping.assignments, vec![RegionId(0), RegionId(0)]);
    }

    #[test]
    fn test_wide_gap_splits_regions_left_to_right() {
        // 输入顺序故意打乱
        let words = vec![
            WordBox::from_rect("right", 300, 10, 340, 30),
            WordBox::from_rect("left", 10, 10, 50, 30),
        ];

        let grouping = grouper().group(&words);

        let texts: Vec<&str> = grouping.index.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right"]);
        assert_eq!(grouping.assignments, vec![RegionId(1), RegionId(0)]);
        assert!(grouping.index.iter().all(|r| r.line_index == 0));
    }

    #[test]
    fn test_lines_are_numbered_top_to_bottom() {
        let words = vec![
            WordBox::from_rect("second", 10, 60, 70, 80),
            WordBox::from_rect("first", 10, 10, 60, 30),
            WordBox::from_rect("line", 65, 12, 100, 32),
        ];

        let grouping = grouper().group(&words);

        assert_eq!(grouping.index.len(), 2);
        let first = grouping.index.get(RegionId(0)).unwrap();
        assert_eq!(first.text, "first line");
        assert_eq!(first.line_index, 0);
        let second = grouping.index.get(RegionId(1)).unwrap();
        assert_eq!(second.text, "second");
        assert_eq!(second.line_index, 1);
    }

    #[test]
    fn test_identical_centers_order_by_horizontal_start() {
        let words = vec![
            WordBox::from_rect("b", 400, 10, 420, 30),
            WordBox::from_rect("a", 100, 10, 120, 30),
            WordBox::from_rect("c", 700, 10, 720, 30),
        ];

        let grouping = grouper().group(&words);
        let texts: Vec<&str> = grouping.index.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_single_word_is_own_region() {
        let grouping = grouper().group(&[WordBox::from_rect("42", 5, 5, 25, 20)]);
        assert_eq!(grouping.index.len(), 1);
        assert_eq!(grouping.index.get(RegionId(0)).unwrap().text, "42");
    }

    #[test]
    fn test_degenerate_polygon_still_grouped() {
        let words = vec![
            WordBox::from_rect("x", 10, 10, 40, 30),
            WordBox::new("=", vec![Point::new(45, 20); 4]),
            WordBox::from_rect("3", 50, 10, 70, 30),
        ];

        let grouping = grouper().group(&words);

        assert_eq!(grouping.index.len(), 1);
        assert_eq!(grouping.index.get(RegionId(0)).unwrap().text, "x = 3");
    }

    #[test]
    fn test_larger_gap_ratio_merges_more() {
        let words = vec![
            WordBox::from_rect("a", 0, 0, 40, 20),
            WordBox::from_rect("b", 80, 0, 120, 20),
        ];

        let strict = grouper().group(&words);
        assert_eq!(strict.index.len(), 2);

        let loose = BoxGrouper::new(GroupingConfig {
            word_gap_ratio: 1.5,
            ..GroupingConfig::default()
        })
        .group(&words);
        assert_eq!(loose.index.len(), 1);
    }

    #[test]
    fn test_extreme_coordinates_do_not_panic() {
        let words = vec![
            WordBox::from_rect("wide", -2_000_000_000, 0, 2_000_000_000, 20),
            WordBox::from_rect("far", i32::MAX - 10, 0, i32::MAX, 20),
            WordBox::from_rect("edge", i32::MIN, 40, i32::MIN + 5, 60),
        ];

        let grouping = grouper().group(&words);

        assert_eq!(grouping.assignments.len(), 3);
        assert!(!grouping.index.is_empty());
        let located = grouping.index.locate(crate::models::Point::new(0, 10));
        assert!(located.is_some());
    }
}
