//! 批改结果解析 - 业务能力层
//!
//! 对评分模型返回的文本做逐项容错校验：单个坏条目只会被丢弃并记一条警告，
//! 绝不会让整个响应作废。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{
    Correction, CorrectionKind, CorrectionSet, OverallAssessment, RegionId, RegionIndex,
    ValidationWarning, WarningKind,
};

/// 解析结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResponse {
    pub corrections: Vec<Correction>,
    pub assessment: OverallAssessment,
    pub warnings: Vec<ValidationWarning>,
}

impl ParsedResponse {
    fn malformed(message: impl Into<String>) -> Self {
        Self {
            warnings: vec![ValidationWarning::new(
                WarningKind::MalformedResponse,
                None,
                message,
            )],
            ..Default::default()
        }
    }

    /// 规范化后的可落盘形式
    pub fn to_correction_set(&self) -> CorrectionSet {
        CorrectionSet {
            corrections: self.corrections.clone(),
            overall_assessment: self.assessment.clone(),
        }
    }
}

/// 单个条目的校验结果
enum ItemOutcome {
    Accepted(Correction, Option<ValidationWarning>),
    Skipped(ValidationWarning),
}

/// 批改结果解析器
pub struct CorrectionParser<'a> {
    index: &'a RegionIndex,
}

impl<'a> CorrectionParser<'a> {
    pub fn new(index: &'a RegionIndex) -> Self {
        Self { index }
    }

    /// 解析原始响应文本
    pub fn parse(&self, raw: &str) -> ParsedResponse {
        let value = match extract_json(raw) {
            Ok(value) => value,
            Err(message) => {
                warn!("⚠️ 评分响应无法解析: {}", message);
                return ParsedResponse::malformed(message);
            }
        };

        let (items, assessment) = match value {
            Value::Array(items) => (items, OverallAssessment::default()),
            Value::Object(mut obj) => match obj.remove("corrections") {
                Some(Value::Array(items)) => {
                    let assessment = obj
                        .remove("overall_assessment")
                        .map(parse_assessment)
                        .unwrap_or_default();
                    (items, assessment)
                }
                _ => {
                    let message = "响应 JSON 缺少 corrections 数组";
                    warn!("⚠️ {}", message);
                    return ParsedResponse::malformed(message);
                }
            },
            other => {
                let message = format!("响应 JSON 顶层类型不是对象或数组: {}", type_name(&other));
                warn!("⚠️ {}", message);
                return ParsedResponse::malformed(message);
            }
        };

        let mut parsed = ParsedResponse {
            assessment,
            ..Default::default()
        };

        for (item_index, item) in items.into_iter().enumerate() {
            match self.validate_item(item_index, item) {
                ItemOutcome::Accepted(correction, warning) => {
                    if let Some(w) = warning {
                        warn!("⚠️ {}", w);
                        parsed.warnings.push(w);
                    }
                    parsed.corrections.push(correction);
                }
                ItemOutcome::Skipped(w) => {
                    warn!("⚠️ {}", w);
                    parsed.warnings.push(w);
                }
            }
        }

        parsed
    }

    /// 依次检查：字段齐全 → region_id 合法且存在 → kind 规范化
    fn validate_item(&self, item_index: usize, item: Value) -> ItemOutcome {
        let skip = |kind, message: String| {
            ItemOutcome::Skipped(ValidationWarning::new(kind, Some(item_index), message))
        };

        let Value::Object(obj) = item else {
            return skip(WarningKind::MissingField, "条目不是 JSON 对象".to_string());
        };

        let Some(raw_id) = field(&obj, &["region_id", "id"]) else {
            return skip(WarningKind::MissingField, "缺少 region_id".to_string());
        };
        let Some(raw_kind) = field(&obj, &["kind", "status"]) else {
            return skip(WarningKind::MissingField, "缺少 kind".to_string());
        };

        let Some(region_id) = parse_region_id(raw_id) else {
            return skip(
                WarningKind::InvalidRegionId,
                format!("region_id 不是非负整数: {}", raw_id),
            );
        };
        if !self.index.contains(region_id) {
            return skip(
                WarningKind::UnknownRegion,
                format!("region_id {} 不存在", region_id),
            );
        }

        let kind_text = raw_kind.as_str().map(str::to_string).unwrap_or_else(|| raw_kind.to_string());
        let (kind, warning) = match CorrectionKind::parse(&kind_text) {
            Some(kind) => (kind, None),
            None => (
                CorrectionKind::Suggestion,
                Some(ValidationWarning::new(
                    WarningKind::UnrecognizedKind,
                    Some(item_index),
                    format!("无法识别的 kind '{}'，按 suggestion 处理", kind_text),
                )),
            ),
        };

        let correction = Correction {
            region_id,
            kind,
            note: text_field(&obj, &["note", "reasoning", "comment"]),
            replacement_text: text_field(&obj, &["replacement_text", "corrected_text"]),
        };

        ItemOutcome::Accepted(correction, warning)
    }
}

/// 从响应文本中提取 JSON：整体、```json 代码块、最外层括号片段依次尝试
fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("响应为空".to_string());
    }

    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    let fenced = FENCED.get_or_init(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").ok());
    if let Some(block) = fenced
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|c| c.get(1))
    {
        if let Ok(value) = serde_json::from_str::<Value>(block.as_str()) {
            return Ok(value);
        }
    }

    // 先出现的括号是最外层，优先尝试
    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| Some((trimmed.find(open)?, trimmed.rfind(close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    for (start, end) in spans {
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            return Ok(value);
        }
    }

    Err(format!("响应中找不到有效的 JSON: {}", first_error))
}

fn field<'v>(obj: &'v Map<String, Value>, names: &[&str]) -> Option<&'v Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

fn text_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(obj, names)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_region_id(value: &Value) -> Option<RegionId> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(id).ok().map(RegionId)
}

fn parse_assessment(value: Value) -> OverallAssessment {
    let Value::Object(obj) = value else {
        return OverallAssessment::default();
    };
    OverallAssessment {
        final_answer_status: text_field(&obj, &["final_answer_status"]),
        key_strengths: text_field(&obj, &["key_strengths"]),
        areas_for_improvement: text_field(&obj, &["areas_for_improvement"]),
        commentary: text_field(&obj, &["commentary", "summary"]),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BBox, Region};

    /// ID 0..=4 的五个区域
    fn index() -> RegionIndex {
        RegionIndex::from_regions(
            (0..5)
                .map(|i| Region {
                    id: RegionId(i),
                    text: format!("line {}", i),
                    bbox: BBox::new(10, 10 + i as i32 * 40, 200, 40 + i as i32 * 40),
                    line_index: i,
                    word_count: 2,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_region_dropped_and_rest_kept() {
        let index = index();
        let raw = r#"[
            {"region_id": 999, "kind": "incorrect"},
            {"region_id": 2, "kind": "correct", "note": "good"}
        ]"#;

        let parsed = CorrectionParser::new(&index).parse(raw);

        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].region_id, RegionId(2));
        assert_eq!(parsed.corrections[0].note.as_deref(), Some("good"));
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnknownRegion);
        assert_eq!(parsed.warnings[0].item_index, Some(0));
    }

    #[test]
    fn test_malformed_json_yields_single_warning() {
        let index = index();
        let parsed = CorrectionParser::new(&index).parse("I could not grade this page, sorry.");
        assert!(parsed.corrections.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::MalformedResponse);
    }

    #[test]
    fn test_missing_fields_are_skipped() {
        let index = index();
        let raw = r#"[
            {"kind": "correct"},
            {"region_id": 1},
            "not an object",
            {"region_id": 3, "kind": "incorrect", "replacement_text": "x = 4"}
        ]"#;

        let parsed = CorrectionParser::new(&index).parse(raw);

        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].replacement_text.as_deref(), Some("x = 4"));
        assert_eq!(parsed.warnings.len(), 3);
        assert!(parsed
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::MissingField));
    }

    #[test]
    fn test_unrecognized_kind_becomes_suggestion() {
        let index = index();
        let parsed = CorrectionParser::new(&index)
            .parse(r#"[{"region_id": 0, "kind": "needs work"}]"#);
        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].kind, CorrectionKind::Suggestion);
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnrecognizedKind);
    }

    #[test]
    fn test_invalid_region_id_types() {
        let index = index();
        let raw = r#"[
            {"region_id": -1, "kind": "correct"},
            {"region_id": "two", "kind": "correct"},
            {"region_id": "4", "kind": "correct"}
        ]"#;
        let parsed = CorrectionParser::new(&index).parse(raw);
        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].region_id, RegionId(4));
        assert_eq!(parsed.warnings.len(), 2);
        assert!(parsed
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::InvalidRegionId));
    }

    #[test]
    fn test_object_response_in_code_fence_with_aliases() {
        let index = index();
        let raw = r#"Here is my grading:
```json
{
  "corrections": [
    {"id": 1, "status": "Incorrect", "reasoning": "sign error", "corrected_text": "x = -2"}
  ],
  "overall_assessment": {"final_answer_status": "incorrect", "key_strengths": "clear layout"}
}
```
"#;

        let parsed = CorrectionParser::new(&index).parse(raw);

        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.corrections,
            vec![Correction {
                region_id: RegionId(1),
                kind: CorrectionKind::Incorrect,
                note: Some("sign error".to_string()),
                replacement_text: Some("x = -2".to_string()),
            }]
        );
        assert_eq!(parsed.assessment.final_answer_status.as_deref(), Some("incorrect"));
        assert_eq!(parsed.assessment.key_strengths.as_deref(), Some("clear layout"));
    }

    #[test]
    fn test_object_without_corrections_is_malformed() {
        let index = index();
        let parsed = CorrectionParser::new(&index).parse(r#"{"result": "ok"}"#);
        assert!(parsed.corrections.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::MalformedResponse);
    }

    #[test]
    fn test_normalized_set_replays_identically() {
        let index = index();
        let raw = r#"{"corrections": [
            {"region_id": 0, "kind": "correct"},
            {"region_id": 4, "kind": "suggestion", "note": "show the units"}
        ], "overall_assessment": {"commentary": "solid"}}"#;

        let parser = CorrectionParser::new(&index);
        let first = parser.parse(raw);
        let saved = serde_json::to_string_pretty(&first.to_correction_set()).unwrap();
        let replayed = parser.parse(&saved);

        assert_eq!(replayed.corrections, first.corrections);
        assert_eq!(replayed.assessment, first.assessment);
        assert!(replayed.warnings.is_empty());
    }

    #[test]
    fn test_prose_wrapped_array_keeps_corrections() {
        let index = index();
        let raw = r#"Here are the corrections: [{"region_id": 1, "kind": "correct"}] Hope this helps."#;

        let parsed = CorrectionParser::new(&index).parse(raw);

        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].region_id, RegionId(1));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_prose_wrapped_object_still_preferred_when_first() {
        let index = index();
        let raw = r#"Result: {"corrections": [{"region_id": 2, "kind": "incorrect"}]} (ids [0-4])"#;

        let parsed = CorrectionParser::new(&index).parse(raw);

        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].kind, CorrectionKind::Incorrect);
    }
}
