use std::fmt;

use serde::{Deserialize, Serialize};

use super::region::RegionId;

/// 批改结论类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    Correct,
    Incorrect,
    Suggestion,
}

impl CorrectionKind {
    /// 不区分大小写地解析；无法识别时返回 `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "correct" => Some(CorrectionKind::Correct),
            "incorrect" => Some(CorrectionKind::Incorrect),
            "suggestion" => Some(CorrectionKind::Suggestion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionKind::Correct => "correct",
            CorrectionKind::Incorrect => "incorrect",
            CorrectionKind::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 评分模型针对某个区域给出的结论（已通过校验）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub region_id: RegionId,
    pub kind: CorrectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_text: Option<String>,
}

/// 评分模型给出的整体评价
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverallAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_strengths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas_for_improvement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
}

impl OverallAssessment {
    pub fn is_empty(&self) -> bool {
        self.final_answer_status.is_none()
            && self.key_strengths.is_none()
            && self.areas_for_improvement.is_none()
            && self.commentary.is_none()
    }
}

/// 规范化后的批改结果，也是 corrections.json 的落盘格式
///
/// 离线回放时该文件会再次经过 `CorrectionParser`，因此字段名与
/// 发给评分模型的响应格式保持一致。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrectionSet {
    pub corrections: Vec<Correction>,
    #[serde(default)]
    pub overall_assessment: OverallAssessment,
}

/// 校验警告类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// 整个响应无法解析为预期的 JSON
    MalformedResponse,
    /// 条目缺少 region_id 或 kind
    MissingField,
    /// region_id 不是非负整数
    InvalidRegionId,
    /// region_id 在索引中不存在
    UnknownRegion,
    /// kind 无法识别，已按 suggestion 处理
    UnrecognizedKind,
}

/// 非致命的校验警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    /// 出问题的条目下标；整体性问题为 `None`
    pub item_index: Option<usize>,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(kind: WarningKind, item_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            item_index,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item_index {
            Some(i) => write!(f, "[{:?}] 第 {} 项: {}", self.kind, i, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

/// 批改结论统计
///
/// 只从一组 `Correction` 推导而来，不单独落盘。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssessmentSummary {
    pub correct: usize,
    pub incorrect: usize,
    pub suggestion: usize,
    pub assessment: OverallAssessment,
}

impl AssessmentSummary {
    pub fn from_corrections(corrections: &[Correction], assessment: OverallAssessment) -> Self {
        let mut summary = AssessmentSummary {
            assessment,
            ..Default::default()
        };
        for correction in corrections {
            match correction.kind {
                CorrectionKind::Correct => summary.correct += 1,
                CorrectionKind::Incorrect => summary.incorrect += 1,
                CorrectionKind::Suggestion => summary.suggestion += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.suggestion
    }
}
