//! Defensive parsing of lookup service responses.
//!
//! The service has answered in three shapes over its lifetime:
//!
//! 1. an envelope `{ "statusCode": 200, "headers": {..}, "body": .. }` where
//!    `body` is an object or a JSON-encoded string,
//! 2. the bare body object `{ "Results": [..], "Version": "..", "Changes": [..] }`,
//! 3. a bare array of results at the document root.
//!
//! Shapes are tried in that order and the first one producing results wins.
//! Nothing here returns an error: anything unparseable degrades to an empty
//! [`ParsedResponse`].

use serde_json::{Map, Value};
use tracing::debug;

use crate::record::{LookupResult, LookupResults};

/// Results plus service metadata extracted from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub results: LookupResults,
    /// Service-reported version, if any.
    pub version: Option<String>,
    /// Service changelog notes accompanying the version.
    pub notes: Vec<String>,
}

/// Parses a raw response document into lookup results.
#[must_use]
pub fn parse_lookup_response(raw: &str) -> ParsedResponse {
    let Ok(root) = serde_json::from_str::<Value>(raw) else {
        debug!(len = raw.len(), "lookup response is not JSON");
        return ParsedResponse::default();
    };

    let mut parsed = ParsedResponse::default();

    if let Some(body) = envelope_body(&root) {
        merge_body(&mut parsed, &body);
        if !parsed.results.is_empty() {
            debug!(shape = "envelope", results = parsed.results.len(), "parsed lookup response");
            return parsed;
        }
    }

    if let Value::Object(object) = &root {
        merge_body(&mut parsed, object);
        if !parsed.results.is_empty() {
            debug!(shape = "body", results = parsed.results.len(), "parsed lookup response");
            return parsed;
        }
    }

    if let Value::Array(items) = &root {
        parsed.results = parse_results(items);
        debug!(shape = "array", results = parsed.results.len(), "parsed lookup response");
    }

    parsed
}

/// Extracts the envelope body as an object, decoding string bodies.
fn envelope_body(root: &Value) -> Option<Map<String, Value>> {
    let object = root.as_object()?;
    get_field(object, "statuscode")?;
    match get_field(object, "body")? {
        Value::Object(body) => Some(body.clone()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(body)) => Some(body),
            _ => None,
        },
        _ => None,
    }
}

/// Fills results, version and notes from a body object, keeping earlier values.
fn merge_body(parsed: &mut ParsedResponse, body: &Map<String, Value>) {
    if parsed.results.is_empty()
        && let Some(Value::Array(items)) =
            get_field(body, "results").or_else(|| get_field(body, "data"))
    {
        parsed.results = parse_results(items);
    }

    if parsed.version.is_none() {
        parsed.version = get_field(body, "version")
            .and_then(scalar_to_string)
            .filter(|version| !version.is_empty());
    }

    if parsed.notes.is_empty() {
        parsed.notes = match get_field(body, "changes") {
            Some(Value::Array(notes)) => notes.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        };
    }
}

fn parse_results(items: &[Value]) -> LookupResults {
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(parse_result)
        .collect()
}

fn parse_result(item: &Map<String, Value>) -> Option<(String, LookupResult)> {
    let text = |name: &str| {
        get_field(item, name)
            .and_then(scalar_to_string)
            .unwrap_or_default()
    };

    let result = LookupResult {
        document_id: text("documentid"),
        content_id: text("contentid"),
        title: text("title"),
        status: text("status"),
    };

    let key = Some(text("lookupid"))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| result.document_id.clone());
    if key.is_empty() {
        return None;
    }
    Some((key, result))
}

/// Finds a field ignoring case and underscores (`Document_ID` == `documentId`).
fn get_field<'a>(object: &'a Map<String, Value>, normalized_name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| normalize_key(key) == normalized_name)
        .map(|(_, value)| value)
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn result_json(id: &str, title: &str) -> Value {
        serde_json::json!({
            "Lookup_ID": id,
            "Document_ID": format!("doc-{id}"),
            "Content_ID": "123456",
            "Title": title,
            "Status": "Released"
        })
    }

    #[test]
    fn test_parse_envelope_with_object_body() {
        let raw = serde_json::json!({
            "statusCode": 200,
            "headers": {"Content-Type": "application/json"},
            "body": {
                "Results": [result_json("TSRC-ABC-123456", "Policy Document")],
                "Version": "2.1",
                "Changes": ["Added expiry status"]
            }
        })
        .to_string();

        let parsed = parse_lookup_response(&raw);
        assert_eq!(parsed.results.len(), 1);
        let result = &parsed.results["TSRC-ABC-123456"];
        assert_eq!(result.title, "Policy Document");
        assert_eq!(result.document_id, "doc-TSRC-ABC-123456");
        assert_eq!(parsed.version.as_deref(), Some("2.1"));
        assert_eq!(parsed.notes, vec!["Added expiry status".to_string()]);
    }

    #[test]
    fn test_parse_envelope_with_string_body() {
        let body = serde_json::json!({
            "Results": [result_json("TSRC-ABC-000111", "Final")]
        })
        .to_string();
        let raw = serde_json::json!({"statusCode": 200, "body": body}).to_string();

        let parsed = parse_lookup_response(&raw);
        assert_eq!(parsed.results["TSRC-ABC-000111"].title, "Final");
    }

    #[test]
    fn test_empty_envelope_falls_back_to_bare_body() {
        let raw = serde_json::json!({
            "statusCode": 200,
            "body": {"Results": [], "Version": "3.0"},
            "Results": [result_json("TSRC-ABC-123456", "From root")]
        })
        .to_string();

        let parsed = parse_lookup_response(&raw);
        assert_eq!(parsed.results["TSRC-ABC-123456"].title, "From root");
        assert_eq!(parsed.version.as_deref(), Some("3.0"));
    }

    #[test]
    fn test_parse_bare_body() {
        let raw = serde_json::json!({
            "results": [{"lookupId": "TSRC-ABC-123456", "title": "Lower", "contentId": 123456}],
            "version": "1.0",
            "changes": "single note"
        })
        .to_string();

        let parsed = parse_lookup_response(&raw);
        let result = &parsed.results["TSRC-ABC-123456"];
        assert_eq!(result.title, "Lower");
        assert_eq!(result.content_id, "123456");
        assert_eq!(parsed.notes, vec!["single note".to_string()]);
    }

    #[test]
    fn test_parse_bare_array() {
        let raw = serde_json::json!([
            result_json("TSRC-ABC-123456", "One"),
            result_json("TSRC-ABC-654321", "Two")
        ])
        .to_string();

        let parsed = parse_lookup_response(&raw);
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.version.is_none());
    }

    #[test]
    fn test_result_without_lookup_id_is_keyed_by_document_id() {
        let raw = serde_json::json!([{"DocumentId": "DOC-9", "Title": "Keyed"}]).to_string();
        let parsed = parse_lookup_response(&raw);
        assert_eq!(parsed.results["DOC-9"].title, "Keyed");
    }

    #[test]
    fn test_unusable_documents_degrade_to_empty() {
        for raw in ["", "not json", "42", "null", "{\"statusCode\": 500, \"body\": \"oops\"}"] {
            let parsed = parse_lookup_response(raw);
            assert!(parsed.results.is_empty(), "{raw}");
        }
        let parsed = parse_lookup_response("[{\"Title\": \"no key\"}, 7, \"x\"]");
        assert!(parsed.results.is_empty());
    }
}
