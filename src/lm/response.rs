//! JSON object extraction from free-form model responses.
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Extract the JSON object a model response carries.
///
/// Tries, in order: the whole text, the text with code fences stripped, the
/// slice from the first `{` to the last `}`, then the first `{` from which a
/// complete value deserializes. CLI envelopes of the form
/// `{"type": "result", "result": "<text>"}` are unwrapped.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty response"));
    }
    let value = serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| parse_candidates(&strip_code_fences(trimmed)))
        .or_else(|| parse_candidates(trimmed))
        .ok_or_else(|| {
            anyhow!(
                "no JSON object found in response (first 200 chars: {})",
                crate::util::truncate_string(trimmed, 200)
            )
        })?;
    match value {
        Value::Object(map) => unwrap_envelope(map),
        other => Err(anyhow!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        )),
    }
}

fn parse_candidates(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
    }
    first_embedded_object(text)
}

fn first_embedded_object(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}

fn unwrap_envelope(map: Map<String, Value>) -> Result<Map<String, Value>> {
    if let Some(Value::Object(structured)) = map.get("structured_output") {
        return Ok(structured.clone());
    }
    let is_envelope = map.get("type").and_then(Value::as_str) == Some("result");
    if is_envelope {
        if let Some(inner) = map.get("result").and_then(Value::as_str) {
            return extract_json_object(inner);
        }
    }
    Ok(map)
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip the language tag on the opening fence.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let map = extract_json_object(r#"{"denominazione": "Alfa"}"#).unwrap();
        assert_eq!(map["denominazione"], "Alfa");
    }

    #[test]
    fn fenced_object_with_language_tag() {
        let text = "Ecco il risultato:\n```json\n{\"pec\": \"a@pec.it\"}\n```\nFine.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["pec"], "a@pec.it");
    }

    #[test]
    fn prose_around_object_uses_first_to_last_brace() {
        let text = "Risposta: {\"soci\": [{\"nome\": \"Rossi\"}]} spero sia utile.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["soci"][0]["nome"], "Rossi");
    }

    #[test]
    fn trailing_braces_in_prose_fall_back_to_streaming_scan() {
        let text = "{\"a\": 1} e poi {non json}";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn cli_envelope_is_unwrapped() {
        let text = r#"{"type":"result","subtype":"success","result":"```json\n{\"esercizio\":\"2025\"}\n```"}"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["esercizio"], "2025");
    }

    #[test]
    fn non_object_and_missing_json_are_errors() {
        let err = extract_json_object("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(extract_json_object("nessun dato").is_err());
        assert!(extract_json_object("   ").is_err());
    }
}
