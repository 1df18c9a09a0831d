use crate::error::{AppError, AppResult};
use crate::models::geometry::BBox;
use crate::models::region::{DuplicateRegionId, Region, RegionId, RegionIndex};
use crate::models::word_box::WordBox;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 离线保存的 OCR 数据
///
/// 既可以是分组后的区域数组（ocr_data.json），也可以是原始词框数组
/// （ocr_words.json）；两者字段不同，按结构自动识别。
/// 旧版流水线写出的 ocr_data.json（`top_left`/`bottom_right` 包围盒）
/// 在加载时转换为区域数组。
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawSavedOcr")]
pub enum SavedOcr {
    Regions(RegionIndex),
    Words(Vec<WordBox>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSavedOcr {
    Regions(RegionIndex),
    Words(Vec<WordBox>),
    Legacy(Vec<LegacyRegion>),
}

/// 旧版区域记录
#[derive(Deserialize)]
struct LegacyRegion {
    id: u32,
    text: String,
    bbox: LegacyBBox,
    #[serde(default)]
    original_boxes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct LegacyBBox {
    top_left: [i32; 2],
    bottom_right: [i32; 2],
}

impl LegacyRegion {
    fn into_region(self, line_index: u32) -> Region {
        let [x1, y1] = self.bbox.top_left;
        let [x2, y2] = self.bbox.bottom_right;
        Region {
            id: RegionId(self.id),
            text: self.text,
            bbox: BBox::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)),
            line_index,
            word_count: self.original_boxes.len().max(1) as u32,
        }
    }
}

impl TryFrom<RawSavedOcr> for SavedOcr {
    type Error = DuplicateRegionId;

    fn try_from(raw: RawSavedOcr) -> Result<Self, Self::Error> {
        match raw {
            RawSavedOcr::Regions(index) => Ok(Self::Regions(index)),
            RawSavedOcr::Words(words) => Ok(Self::Words(words)),
            RawSavedOcr::Legacy(items) => {
                // 旧格式没有行号，按文件顺序编号
                let regions = items
                    .into_iter()
                    .enumerate()
                    .map(|(pos, item)| item.into_region(pos as u32))
                    .collect();
                RegionIndex::from_regions(regions).map(Self::Regions)
            }
        }
    }
}

/// 读取文本文件
pub async fn load_text(path: &Path) -> AppResult<String> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(AppError::File(crate::error::FileError::NotFound {
            path: path.display().to_string(),
        }));
    }
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

/// 从 JSON 文件加载离线 OCR 数据
pub async fn load_saved_ocr(path: &Path) -> AppResult<SavedOcr> {
    let content = load_text(path).await?;
    let saved: SavedOcr = serde_json::from_str(&content)
        .map_err(|e| AppError::json_parse_failed(path.display().to_string(), e))?;

    match &saved {
        SavedOcr::Regions(index) => {
            tracing::info!("已加载离线区域数据: {} 个区域", index.len())
        }
        SavedOcr::Words(words) => {
            tracing::info!("已加载离线词框数据: {} 个词", words.len())
        }
    }

    Ok(saved)
}

/// 从 JSON 文件加载区域索引（`--skip-ocr` 时读取输出目录中的 ocr_data.json）
pub async fn load_region_index(path: &Path) -> AppResult<RegionIndex> {
    let content = load_text(path).await?;
    let saved: SavedOcr = serde_json::from_str(&content)
        .map_err(|e| AppError::json_parse_failed(path.display().to_string(), e))?;
    match saved {
        SavedOcr::Regions(index) => Ok(index),
        SavedOcr::Words(_) => Err(AppError::json_parse_failed(
            path.display().to_string(),
            <serde_json::Error as serde::de::Error>::custom("需要区域数组，实际为词框数组"),
        )),
    }
}
