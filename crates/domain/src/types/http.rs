//! Request and response values passed through the pipeline.
//!
//! Both are immutable once built. Every transformation (merge, encryption,
//! decryption) produces a new value and leaves the original untouched.

use std::fmt;

use sealgate_common::base64_bytes;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::constants::{CONTENT_TYPE_HEADER, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};
use crate::errors::{InterceptError, Result};
use crate::impl_label_conversions;

/// HTTP verbs handled by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl_label_conversions!(HttpMethod {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
});

impl HttpMethod {
    /// POST and PUT may carry a body and take part in merge chaining.
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

/// Method plus resource path, e.g. `GET:/posts/1`.
///
/// Correlates a cached GET result with later writes to the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalKey(String);

impl LogicalKey {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        let path = if path.is_empty() { "/" } else { path };
        Self(format!("{method}:{path}"))
    }

    /// Key of the GET that reads the same resource as `target`.
    pub fn get_for(target: &Url) -> Self {
        Self::new(HttpMethod::Get, target.path())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Outbound request in its logical (plaintext) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: Uuid,
    method: HttpMethod,
    target: Url,
    headers: Vec<(String, String)>,
    #[serde(with = "base64_bytes::option", default)]
    body: Option<Vec<u8>>,
    content_type: String,
    #[serde(default)]
    chain_to: Option<LogicalKey>,
}

impl Request {
    pub fn builder(method: HttpMethod, target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, target)
    }

    pub fn get(target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Get, target)
    }

    pub fn post(target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Post, target)
    }

    pub fn put(target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Put, target)
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    pub const fn target(&self) -> &Url {
        &self.target
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Explicit chain target, if the caller set one.
    pub const fn chain_to(&self) -> Option<&LogicalKey> {
        self.chain_to.as_ref()
    }

    pub fn logical_key(&self) -> LogicalKey {
        LogicalKey::new(self.method, self.target.path())
    }

    /// New request with the same identity and a replaced body.
    #[must_use]
    pub fn with_body(&self, body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self { body: Some(body), content_type: content_type.into(), ..self.clone() }
    }

    /// New request with `name` set to `value`, replacing existing values.
    #[must_use]
    pub fn with_header(&self, name: &str, value: impl Into<String>) -> Self {
        let mut headers: Vec<(String, String)> =
            self.headers.iter().filter(|(k, _)| !k.eq_ignore_ascii_case(name)).cloned().collect();
        headers.push((name.to_string(), value.into()));
        Self { headers, ..self.clone() }
    }
}

/// Builder for [`Request`]. Validation happens in [`RequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: HttpMethod,
    target: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    content_type: Option<String>,
    chain_to: Option<LogicalKey>,
}

impl RequestBuilder {
    pub fn new(method: HttpMethod, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
            content_type: None,
            chain_to: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body; sets the content type to `application/json`.
    #[must_use]
    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.body = Some(value.to_string().into_bytes());
        self.content_type = Some(JSON_CONTENT_TYPE.to_string());
        self
    }

    /// Form-urlencoded body built from `pairs`.
    #[must_use]
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        self.body = Some(encoded.into_bytes());
        self.content_type = Some(FORM_CONTENT_TYPE.to_string());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Merge cached fields from `key` into this write before sending.
    #[must_use]
    pub fn chain_to(mut self, key: impl Into<LogicalKey>) -> Self {
        self.chain_to = Some(key.into());
        self
    }

    /// Validate and build the request.
    ///
    /// # Errors
    /// Returns `InterceptError::InvalidRequest` when the target is not an
    /// absolute http(s) URL or a GET carries a body.
    pub fn build(self) -> Result<Request> {
        let target = Url::parse(&self.target)
            .map_err(|e| InterceptError::InvalidRequest(format!("invalid target URL: {e}")))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(InterceptError::InvalidRequest(format!(
                "unsupported scheme '{}'",
                target.scheme()
            )));
        }
        if self.method == HttpMethod::Get && self.body.as_ref().is_some_and(|b| !b.is_empty()) {
            return Err(InterceptError::InvalidRequest("GET requests cannot carry a body".into()));
        }

        let header_type = self
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
            .map(|(_, v)| v.clone());
        let content_type = self
            .content_type
            .or(header_type)
            .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string());
        let headers = self
            .headers
            .into_iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
            .collect();

        Ok(Request {
            id: Uuid::now_v7(),
            method: self.method,
            target,
            headers,
            body: self.body,
            content_type,
            chain_to: self.chain_to,
        })
    }
}

/// Upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Response {
    pub const fn new(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: None }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set `name` to `value`, dropping every existing value of that header.
    #[must_use]
    pub fn replace_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// New response with the same status and headers and a replaced body.
    #[must_use]
    pub fn replace_body(&self, body: Option<Vec<u8>>) -> Self {
        Self { status: self.status, headers: self.headers.clone(), body }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE_HEADER)
    }

    /// Body as UTF-8 text, lossy.
    pub fn text(&self) -> String {
        self.body.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default()
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    /// Returns `InterceptError::MalformedData` for a missing or invalid body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| InterceptError::MalformedData("response has no body".into()))?;
        Ok(serde_json::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Validates `RequestBuilder::build` behavior for the content type
    /// scenario.
    ///
    /// Assertions:
    /// - A `Content-Type` header becomes the logical content type.
    /// - The header is not kept in the header list.
    #[test]
    fn test_content_type_header_is_lifted() {
        let request = Request::put("https://api.example.com/posts/1")
            .header("Content-Type", "text/csv")
            .header("X-Trace", "abc")
            .body("a,b")
            .build()
            .unwrap();

        assert_eq!(request.content_type(), "text/csv");
        assert!(request.header("content-type").is_none());
        assert_eq!(request.header("x-trace"), Some("abc"));
    }

    #[test]
    fn test_get_with_body_is_rejected() {
        let err = Request::get("https://api.example.com/posts").body("x").build().unwrap_err();
        assert!(matches!(err, InterceptError::InvalidRequest(_)));
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let err = Request::get("ftp://example.com/file").build().unwrap_err();
        assert!(matches!(err, InterceptError::InvalidRequest(_)));
        assert!(Request::get("not a url").build().is_err());
    }

    /// Validates `Request::logical_key` behavior for the resource path
    /// scenario.
    ///
    /// Assertions:
    /// - The key is `METHOD:path` and ignores the query string.
    #[test]
    fn test_logical_key_format() {
        let request = Request::get("https://api.example.com/posts/1?expand=true").build().unwrap();
        assert_eq!(request.logical_key().as_str(), "GET:/posts/1");
        assert_eq!(LogicalKey::get_for(request.target()), request.logical_key());
    }

    /// Validates `Request::with_body` behavior for the immutable rewrite
    /// scenario.
    ///
    /// Assertions:
    /// - The original request keeps its body.
    /// - The derived request keeps the id.
    #[test]
    fn test_with_body_derives_new_request() {
        let original =
            Request::post("https://api.example.com/posts").json(&json!({"a": 1})).build().unwrap();
        let derived = original.with_body(b"sealed".to_vec(), "text/plain");

        assert_eq!(original.body(), Some(br#"{"a":1}"#.as_slice()));
        assert_eq!(derived.body(), Some(b"sealed".as_slice()));
        assert_eq!(derived.id(), original.id());
        assert_eq!(derived.content_type(), "text/plain");
    }

    #[test]
    fn test_form_body_encoding() {
        let request = Request::put("https://api.example.com/posts/1")
            .form(&[("title", "hello world"), ("body", "a&b")])
            .build()
            .unwrap();
        assert_eq!(request.content_type(), FORM_CONTENT_TYPE);
        assert_eq!(request.body(), Some(b"title=hello+world&body=a%26b".as_slice()));
    }

    #[test]
    fn test_request_serde_keeps_body() {
        let request = Request::put("https://api.example.com/posts/1")
            .json(&json!({"title": "y"}))
            .chain_to("GET:/posts/1")
            .build()
            .unwrap();
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new(201).with_header("ETag", "v1").with_body(r#"{"ok":true}"#);
        assert!(response.is_success());
        assert_eq!(response.header("etag"), Some("v1"));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);

        assert!(!Response::new(503).is_success());
        assert!(Response::new(204).json::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_replace_header_drops_previous_values() {
        let response = Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("content-type", "text/html")
            .replace_header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
        assert_eq!(response.content_type(), Some(JSON_CONTENT_TYPE));
        assert_eq!(response.headers().len(), 1);
    }
}
