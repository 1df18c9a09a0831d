//! 提示词编码 - 业务能力层
//!
//! 把区域索引编码成发给评分模型的文本。输出只取决于索引（和可选的图片尺寸），
//! 同样的输入永远得到逐字节相同的提示词，离线回放依赖这一点。

use std::fmt::Write as _;

use crate::models::RegionIndex;

const SYSTEM_MESSAGE: &str = "You are an experienced mathematics and English teacher evaluating a \
student's handwritten work from a scanned page. Focus on mathematical correctness and grammar; \
be tolerant of handwriting and OCR noise.";

const PREAMBLE: &str = "Evaluate the student's work shown in the attached image. \
The text below was extracted by OCR and grouped into numbered regions. \
Refer to regions only by their region number.";

const RESPONSE_SCHEMA: &str = r#"Return strict JSON only, with no surrounding prose, in exactly this shape:
{
  "corrections": [
    {
      "region_id": <integer region number from the list above>,
      "kind": "correct" | "incorrect" | "suggestion",
      "note": "<short reasoning, optional>",
      "replacement_text": "<what the student should have written, optional>"
    }
  ],
  "overall_assessment": {
    "final_answer_status": "correct" | "incorrect" | "partially correct",
    "key_strengths": "<one or two sentences>",
    "areas_for_improvement": "<one or two sentences>"
  }
}
Only reference region numbers that appear in the list above."#;

/// 提示词编码器
#[derive(Debug, Clone, Default)]
pub struct PromptEncoder {
    image_size: Option<(u32, u32)>,
}

impl PromptEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在提示词中附带图片尺寸
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    /// 固定的系统消息
    pub fn system_message(&self) -> &'static str {
        SYSTEM_MESSAGE
    }

    /// 编码区域索引
    pub fn encode(&self, index: &RegionIndex) -> String {
        let mut prompt = String::with_capacity(1024 + index.len() * 96);

        prompt.push_str(PREAMBLE);
        prompt.push_str("\n\n");

        if let Some((width, height)) = self.image_size {
            let _ = writeln!(prompt, "Image size: {}x{} pixels\n", width, height);
        }

        prompt.push_str("DETECTED TEXT REGIONS:\n");
        if index.is_empty() {
            prompt.push_str("(no text regions were detected)\n");
        }

        for region in index.iter() {
            let b = &region.bbox;
            // JSON 字符串转义保证引号和换行不会破坏结构
            let quoted = serde_json::to_string(&region.text)
                .unwrap_or_else(|_| format!("\"{}\"", region.text));
            let _ = write!(
                prompt,
                "Region {}:\nPosition: [{},{}] to [{},{}]\nStudent wrote: {}\n---\n",
                region.id, b.x_min, b.y_min, b.x_max, b.y_max, quoted
            );
        }

        prompt.push('\n');
        prompt.push_str(RESPONSE_SCHEMA);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BBox, Region, RegionId};

    fn sample_index() -> RegionIndex {
        RegionIndex::from_regions(vec![
            Region {
                id: RegionId(0),
                text: "the cat".to_string(),
                bbox: BBox::new(10, 10, 90, 30),
                line_index: 0,
                word_count: 2,
            },
            Region {
                id: RegionId(1),
                text: "say \"hi\"".to_string(),
                bbox: BBox::new(10, 50, 80, 70),
                line_index: 1,
                word_count: 2,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = PromptEncoder::new().with_image_size(800, 600);
        let index = sample_index();
        let first = encoder.encode(&index);
        let second = encoder.encode(&index.clone());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_regions_listed_in_index_order() {
        let prompt = PromptEncoder::new().encode(&sample_index());
        let first = prompt.find("Region 0:").unwrap();
        let second = prompt.find("Region 1:").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Position: [10,10] to [90,30]"));
        assert!(prompt.contains(r#"Student wrote: "say \"hi\"""#));
        assert!(prompt.contains("\"region_id\""));
    }

    #[test]
    fn test_image_size_line_is_optional() {
        let index = sample_index();
        assert!(!PromptEncoder::new().encode(&index).contains("Image size"));
        assert!(PromptEncoder::new()
            .with_image_size(1024, 768)
            .encode(&index)
            .contains("Image size: 1024x768 pixels"));
    }

    #[test]
    fn test_empty_index_still_encodes() {
        let prompt = PromptEncoder::new().encode(&RegionIndex::empty());
        assert!(prompt.contains("(no text regions were detected)"));
        assert!(prompt.ends_with(RESPONSE_SCHEMA));
    }
}
