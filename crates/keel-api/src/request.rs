//! Inbound request representation
//!
//! The server decodes everything the adapter needs up front: the query string
//! into a JSON object, path parameters from the router and the body as parsed
//! JSON. Handlers and middlewares never touch raw bytes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// HTTP Method
// ============================================================================

/// HTTP request methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(format!("Invalid HTTP method: {}", s)),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A decoded HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    /// Original request target, including the query string
    pub url: String,
    pub path: String,
    /// Decoded query string. Repeated keys collect into an array.
    pub query: Map<String, Value>,
    /// Path parameters bound by the router
    pub params: Map<String, Value>,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, `Null` when absent
    pub body: Value,
    /// Scratch space middlewares can use to pass data to handlers
    pub locals: Map<String, Value>,
}

impl Request {
    /// Build a request from a method and a request target such as
    /// `/users?search=ada`.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (url.clone(), Map::new()),
        };

        Self {
            method,
            url,
            path,
            query,
            params: Map::new(),
            headers: HashMap::new(),
            body: Value::Null,
            locals: Map::new(),
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body;
        self.with_header("content-type", "application/json")
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map_or(false, |ct| ct.contains("application/json") || ct.contains("+json"))
    }
}

// ============================================================================
// Query String
// ============================================================================

/// Decode a query string (without the leading `?`) into a JSON object of
/// strings. A key seen more than once maps to an array of its values.
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut out = Map::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_query_component(key).into_owned();
        let value = Value::String(decode_query_component(value).into_owned());

        match out.get_mut(&key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key, value);
            }
        }
    }

    out
}

/// Decode a query component, borrowing when nothing is encoded.
#[inline]
pub(crate) fn decode_query_component(s: &str) -> Cow<'_, str> {
    if !s.contains('+') && !s.contains('%') {
        return Cow::Borrowed(s);
    }

    if s.contains('+') {
        let with_spaces = s.replace('+', " ");
        match urlencoding::decode(&with_spaces) {
            Ok(decoded) => Cow::Owned(decoded.into_owned()),
            Err(_) => Cow::Owned(with_spaces),
        }
    } else {
        match urlencoding::decode(s) {
            Ok(decoded) => decoded,
            Err(_) => Cow::Borrowed(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_round_trip() {
        for method in HttpMethod::ALL {
            assert_eq!(method.as_str().parse::<HttpMethod>(), Ok(method));
        }
        assert_eq!("patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_request_splits_query() {
        let req = Request::new(HttpMethod::Get, "/users?search=ada+l&page=2");
        assert_eq!(req.path, "/users");
        assert_eq!(req.query["search"], json!("ada l"));
        assert_eq!(req.query["page"], json!("2"));
        assert_eq!(req.body, Value::Null);
    }

    #[test]
    fn test_repeated_keys_collect() {
        let query = parse_query("tag=a&tag=b&tag=c&flag");
        assert_eq!(query["tag"], json!(["a", "b", "c"]));
        assert_eq!(query["flag"], json!(""));
    }

    #[test]
    fn test_decode_query_component() {
        assert!(matches!(decode_query_component("plain"), Cow::Borrowed("plain")));
        assert_eq!(decode_query_component("a%20b"), "a b");
        assert_eq!(decode_query_component("%E6%97%A5"), "日");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = Request::new(HttpMethod::Post, "/users")
            .with_header("X-Request-Id", "abc")
            .with_json(json!({"name": "Ada"}));
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert!(req.is_json());
    }
}
