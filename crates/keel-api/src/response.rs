//! Outbound response handle
//!
//! A [`ResponseHandle`] is shared between the adapter, middlewares and the
//! business handler. Whoever sends first wins; any later send fails with
//! [`ResponseError::AlreadySent`] so a response is never written twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Response headers already sent")]
    AlreadySent,

    #[error("Failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A response that has been committed.
#[derive(Debug, Clone, PartialEq)]
pub struct SentResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl SentResponse {
    /// Parse the body as JSON. An empty body reads as `Null`.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug)]
struct ResponseState {
    status_code: u16,
    headers: BTreeMap<String, String>,
    sent: Option<SentResponse>,
}

/// Mutable, shareable response for one request.
#[derive(Debug, Clone)]
pub struct ResponseHandle {
    inner: Arc<Mutex<ResponseState>>,
}

impl Default for ResponseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResponseState {
                status_code: 200,
                headers: BTreeMap::new(),
                sent: None,
            })),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.inner.lock().status_code
    }

    /// Set the status used by the next send.
    pub fn status(&self, code: u16) -> &Self {
        self.inner.lock().status_code = code;
        self
    }

    pub fn set_header(&self, name: impl AsRef<str>, value: impl Into<String>) -> &Self {
        self.inner
            .lock()
            .headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .headers
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn headers_sent(&self) -> bool {
        self.inner.lock().sent.is_some()
    }

    /// Serialize `body` as JSON and commit the response.
    ///
    /// `status` overrides the current status code. `headers` are merged over
    /// those already set; `content-type` defaults to JSON.
    pub fn send(
        &self,
        body: &Value,
        status: Option<u16>,
        headers: &[(&str, &str)],
    ) -> Result<(), ResponseError> {
        let bytes = serde_json::to_vec(body)?;
        self.commit(Bytes::from(bytes), status, headers, Some(JSON_CONTENT_TYPE))
    }

    /// Send `body` with the current status.
    pub fn json(&self, body: &Value) -> Result<(), ResponseError> {
        self.send(body, None, &[])
    }

    /// Commit an empty body, e.g. for `204 No Content`.
    pub fn end(&self, status: Option<u16>) -> Result<(), ResponseError> {
        self.commit(Bytes::new(), status, &[], None)
    }

    /// The committed response, if any.
    pub fn sent(&self) -> Option<SentResponse> {
        self.inner.lock().sent.clone()
    }

    fn commit(
        &self,
        body: Bytes,
        status: Option<u16>,
        headers: &[(&str, &str)],
        content_type: Option<&str>,
    ) -> Result<(), ResponseError> {
        let mut state = self.inner.lock();
        if state.sent.is_some() {
            return Err(ResponseError::AlreadySent);
        }

        if let Some(code) = status {
            state.status_code = code;
        }

        let mut merged = state.headers.clone();
        for (name, value) in headers {
            merged.insert(name.to_ascii_lowercase(), (*value).to_string());
        }
        if let Some(ct) = content_type {
            merged
                .entry("content-type".to_string())
                .or_insert_with(|| ct.to_string());
        }

        state.sent = Some(SentResponse {
            status: state.status_code,
            headers: merged,
            body,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_defaults_to_json() {
        let res = ResponseHandle::new();
        res.json(&json!({"ok": true})).unwrap();

        let sent = res.sent().unwrap();
        assert_eq!(sent.status, 200);
        assert_eq!(sent.header("Content-Type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(sent.json().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_status_and_headers() {
        let res = ResponseHandle::new();
        res.status(201).set_header("Location", "/users/1");
        res.send(&json!({"id": 1}), None, &[("X-Trace", "t1")]).unwrap();

        let sent = res.sent().unwrap();
        assert_eq!(sent.status, 201);
        assert_eq!(sent.header("location"), Some("/users/1"));
        assert_eq!(sent.header("x-trace"), Some("t1"));
    }

    #[test]
    fn test_second_send_is_rejected() {
        let res = ResponseHandle::new();
        res.send(&json!({"first": true}), Some(202), &[]).unwrap();
        assert!(res.headers_sent());

        let err = res.json(&json!({"second": true})).unwrap_err();
        assert!(matches!(err, ResponseError::AlreadySent));
        assert_eq!(res.sent().unwrap().json().unwrap(), json!({"first": true}));
    }

    #[test]
    fn test_end_has_empty_body() {
        let res = ResponseHandle::new();
        res.end(Some(204)).unwrap();

        let sent = res.sent().unwrap();
        assert_eq!(sent.status, 204);
        assert!(sent.body.is_empty());
        assert_eq!(sent.header("content-type"), None);
    }

    #[test]
    fn test_clones_share_state() {
        let res = ResponseHandle::new();
        let other = res.clone();
        other.status(418);
        assert_eq!(res.status_code(), 418);
    }
}
