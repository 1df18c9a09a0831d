//! 文本区域与区域索引
//!
//! `RegionIndex` 是整条流水线的"坐标字典"：提示词和叠加图都只通过
//! `RegionId` 引用区域。索引构造后只读，任何"修改"都会产生新的索引。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{BBox, Point};

/// 区域 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一个或多个词合并后的可寻址文本区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub text: String,
    pub bbox: BBox,
    pub line_index: u32,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
}

fn default_word_count() -> u32 {
    1
}

/// 区域 ID 重复
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("区域 ID {0} 重复")]
pub struct DuplicateRegionId(pub RegionId);

/// 有序、按 ID 索引的只读区域集合
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Region>", into = "Vec<Region>")]
pub struct RegionIndex {
    regions: Vec<Region>,
    by_id: HashMap<RegionId, usize>,
}

impl RegionIndex {
    /// 由已排好序的区域构造索引
    ///
    /// 用于加载离线保存的区域数据；分组器产生的区域也走这里。
    pub fn from_regions(regions: Vec<Region>) -> Result<Self, DuplicateRegionId> {
        let mut by_id = HashMap::with_capacity(regions.len());
        for (pos, region) in regions.iter().enumerate() {
            if by_id.insert(region.id, pos).is_some() {
                return Err(DuplicateRegionId(region.id));
            }
        }
        Ok(Self { regions, by_id })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.by_id.get(&id).map(|&pos| &self.regions[pos])
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.iter().map(|r| r.id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    /// 按像素点定位区域
    ///
    /// 先找包含该点的区域（多个时取面积最小者，再取 ID 最小者），
    /// 否则退化为质心距离最近的区域。索引为空时返回 `None`。
    pub fn locate(&self, point: Point) -> Option<&Region> {
        let containing = self
            .regions
            .iter()
            .filter(|r| r.bbox.contains(point))
            .min_by_key(|r| (r.bbox.area(), r.id));
        if containing.is_some() {
            return containing;
        }

        let (px, py) = (point.x as f64, point.y as f64);
        self.regions.iter().min_by(|a, b| {
            let da = squared_distance(a.bbox.center(), (px, py));
            let db = squared_distance(b.bbox.center(), (px, py));
            da.total_cmp(&db).then(a.id.cmp(&b.id))
        })
    }

    /// 返回所有包围盒裁剪到图片范围内的新索引，ID、顺序和文字保持不变
    pub fn clamped_to(&self, width: u32, height: u32) -> RegionIndex {
        let regions = self
            .regions
            .iter()
            .map(|r| Region {
                bbox: r.bbox.clamped(width, height),
                ..r.clone()
            })
            .collect();
        RegionIndex {
            regions,
            by_id: self.by_id.clone(),
        }
    }

    /// 所有区域的最大下边界 / 右边界（用于判断图片空白边距）
    pub fn extent(&self) -> Option<BBox> {
        self.regions
            .iter()
            .map(|r| r.bbox)
            .reduce(|acc, b| acc.union(&b))
    }
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

impl TryFrom<Vec<Region>> for RegionIndex {
    type Error = DuplicateRegionId;

    fn try_from(regions: Vec<Region>) -> Result<Self, Self::Error> {
        Self::from_regions(regions)
    }
}

impl From<RegionIndex> for Vec<Region> {
    fn from(index: RegionIndex) -> Self {
        index.regions
    }
}
