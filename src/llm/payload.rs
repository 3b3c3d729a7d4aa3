//! Locating and decoding structured payloads inside free-form model output.
//!
//! Models routinely wrap their structured answer in markdown fences or
//! surround it with prose, so the payload is located by its outermost
//! expected tag rather than assuming the whole response is clean XML.

use serde::de::DeserializeOwned;

use crate::llm::LlmError;

/// Strip surrounding markdown code fences, if present.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => return text,
    };
    inner.trim_end().trim_end_matches("```").trim()
}

/// Locate the outermost `<tag>...</tag>` fragment in free-form text.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Result<&'a str, LlmError> {
    let text = strip_fences(text);
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open);
    let end = text.rfind(&close);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => Ok(&text[start..end + close.len()]),
        _ => Err(LlmError::Format(format!(
            "response contains no <{}> payload",
            tag
        ))),
    }
}

/// Locate and decode the expected payload in one step.
pub fn parse_payload<T: DeserializeOwned>(text: &str, tag: &str) -> Result<T, LlmError> {
    let fragment = extract_tagged(text, tag)?;
    quick_xml::de::from_str(fragment)
        .map_err(|e| LlmError::Format(format!("malformed <{}> payload: {}", tag, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Demo {
        query: String,
        reasoning: Option<String>,
    }

    #[test]
    fn test_extract_plain_payload() {
        let text = "<strategy><query>CRP AND diabetes</query></strategy>";
        assert_eq!(extract_tagged(text, "strategy").unwrap(), text);
    }

    #[test]
    fn test_extract_with_surrounding_prose() {
        let text = "Here is my strategy:\n<strategy><query>q</query></strategy>\nLet me know.";
        assert_eq!(
            extract_tagged(text, "strategy").unwrap(),
            "<strategy><query>q</query></strategy>"
        );
    }

    #[test]
    fn test_extract_inside_code_fence() {
        let text = "```xml\n<strategy><query>q</query></strategy>\n```";
        assert_eq!(
            extract_tagged(text, "strategy").unwrap(),
            "<strategy><query>q</query></strategy>"
        );
    }

    #[test]
    fn test_missing_tag_is_format_error() {
        let err = extract_tagged("no payload here", "strategy").unwrap_err();
        assert!(matches!(err, LlmError::Format(_)));
    }

    #[test]
    fn test_parse_payload_decodes_fields() {
        let text = "```\n<strategy><query>CRP AND diabetes</query><reasoning>why</reasoning></strategy>\n```";
        let demo: Demo = parse_payload(text, "strategy").unwrap();
        assert_eq!(demo.query, "CRP AND diabetes");
        assert_eq!(demo.reasoning.as_deref(), Some("why"));
    }

    #[test]
    fn test_parse_payload_malformed_xml() {
        let text = "<strategy><query>unclosed</strategy>";
        let err = parse_payload::<Demo>(text, "strategy").unwrap_err();
        assert!(matches!(err, LlmError::Format(_)));
    }
}
