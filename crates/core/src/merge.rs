//! Field-level merge of a cached GET payload into an outgoing write.
//!
//! Caller fields always win; cached fields only fill gaps. Anything that is
//! not a JSON object (or a form body on the caller side) disables the merge.

use sealgate_domain::constants::{FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};
use sealgate_domain::CachedEntry;
use serde_json::{Map, Value};

/// Top-level fields of a cached payload, if it is a JSON object.
pub fn cached_fields(entry: &CachedEntry) -> Option<Map<String, Value>> {
    match entry.payload_json()? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

/// Caller fields from a JSON object or form-urlencoded body.
///
/// An absent or empty body is an empty field set.
pub fn caller_fields(body: Option<&[u8]>, content_type: &str) -> Option<Map<String, Value>> {
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => return Some(Map::new()),
    };

    if media_type(content_type) == FORM_CONTENT_TYPE {
        let fields = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Some(fields);
    }

    match serde_json::from_slice::<Value>(body).ok()? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

/// `cached` overlaid with `caller`.
pub fn merge_fields(cached: Map<String, Value>, caller: Map<String, Value>) -> Map<String, Value> {
    let mut merged = cached;
    merged.extend(caller);
    merged
}

/// Merged JSON body, or `None` when either side cannot take part.
pub fn merged_body(
    entry: &CachedEntry,
    body: Option<&[u8]>,
    content_type: &str,
) -> Option<(Vec<u8>, &'static str)> {
    let cached = cached_fields(entry)?;
    let caller = caller_fields(body, content_type)?;
    let merged = Value::Object(merge_fields(cached, caller));
    Some((merged.to_string().into_bytes(), JSON_CONTENT_TYPE))
}

fn media_type(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use sealgate_domain::LogicalKey;
    use serde_json::json;

    use super::*;

    fn entry(payload: &[u8]) -> CachedEntry {
        CachedEntry::new(LogicalKey::from("GET:/posts/1"), 200, payload.to_vec())
    }

    /// Validates `merged_body` behavior for the caller-wins scenario.
    ///
    /// Assertions:
    /// - Cached `id` fills the gap, caller `title` overrides the cached one.
    #[test]
    fn test_caller_field_wins() {
        let cached = entry(br#"{"id":1,"title":"x"}"#);
        let (body, content_type) =
            merged_body(&cached, Some(br#"{"title":"y"}"#), JSON_CONTENT_TYPE).unwrap();

        let merged: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(merged, json!({"id": 1, "title": "y"}));
        assert_eq!(content_type, JSON_CONTENT_TYPE);
    }

    #[test]
    fn test_form_body_merges_as_strings() {
        let cached = entry(br#"{"id":1,"title":"x","userId":7}"#);
        let (body, _) = merged_body(
            &cached,
            Some(b"title=hello+world&body=text"),
            "application/x-www-form-urlencoded; charset=utf-8",
        )
        .unwrap();

        let merged: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(merged, json!({"id": 1, "title": "hello world", "body": "text", "userId": 7}));
    }

    #[test]
    fn test_empty_caller_body_takes_cached_fields() {
        let cached = entry(br#"{"id":1}"#);
        let (body, _) = merged_body(&cached, None, JSON_CONTENT_TYPE).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"id": 1}));
    }

    /// Validates `merged_body` behavior for the unmergeable input scenario.
    ///
    /// Assertions:
    /// - Corrupt or non-object cached payloads disable the merge.
    /// - Non-object caller bodies disable the merge.
    #[test]
    fn test_unmergeable_inputs() {
        assert!(merged_body(&entry(b"{not json"), Some(b"{}"), JSON_CONTENT_TYPE).is_none());
        assert!(merged_body(&entry(b"[1,2]"), Some(b"{}"), JSON_CONTENT_TYPE).is_none());
        assert!(merged_body(&entry(br#"{"id":1}"#), Some(b"[1]"), JSON_CONTENT_TYPE).is_none());
        assert!(merged_body(&entry(br#"{"id":1}"#), Some(b"plain"), "text/plain").is_none());
    }
}
