use serde::de::DeserializeOwned;

use crate::DelverError;

/// Strips markdown code fences around an LLM response so the remainder can
/// be fed to a JSON parser.
pub fn extract_json(raw: &str) -> &str {
    let cleaned = raw.trim();
    let cleaned = if let Some(rest) = cleaned.strip_prefix("```json") {
        rest.trim_end_matches("```").trim()
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        rest.trim_end_matches("```").trim()
    } else {
        cleaned
    };

    // Some providers wrap the payload in prose. Fall back to the outermost
    // JSON value when the trimmed text does not start with one.
    if cleaned.starts_with('{') || cleaned.starts_with('[') {
        return cleaned;
    }
    let open = cleaned.find(['{', '[']);
    let close = cleaned.rfind(['}', ']']);
    match (open, close) {
        (Some(open), Some(close)) if close > open => &cleaned[open..=close],
        _ => cleaned,
    }
}

pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, DelverError> {
    let cleaned = extract_json(raw);
    serde_json::from_str(cleaned).map_err(|err| DelverError::ParseFailed {
        output: raw.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"value\": 3}\n```";
        let probe: Probe = parse_json(raw).unwrap();
        assert_eq!(probe, Probe { value: 3 });
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Here is the result: {\"value\": 7} Hope that helps.";
        let probe: Probe = parse_json(raw).unwrap();
        assert_eq!(probe.value, 7);
    }

    #[test]
    fn surfaces_parse_failure_with_output() {
        let raw = "not json at all";
        let err = parse_json::<Probe>(raw).unwrap_err();
        match err {
            DelverError::ParseFailed { output, .. } => assert_eq!(output, raw),
            other => panic!("expected ParseFailed, got {other:?}"),
        }
    }
}
