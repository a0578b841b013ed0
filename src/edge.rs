//! Runtime-neutral request and response shapes.
//!
//! The gateway core works on these instead of any particular hosting
//! runtime, so the same logic serves a Worker fetch event, an axum
//! middleware, or a test harness.

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::collections::HashMap;
use tower_cookies::cookie::Cookie;

/// An incoming viewer request as seen at the edge.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: Method,
    pub path: String,
    pub querystring: Option<String>,
    pub headers: HeaderMap,
}

impl EdgeRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            querystring: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_query(mut self, querystring: impl Into<String>) -> Self {
        self.querystring = Some(querystring.into());
        self
    }

    /// Appends a header value; repeated calls keep earlier values.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            querystring: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
        }
    }

    /// First non-empty value of a header.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| !value.is_empty())
    }

    pub fn header_all(&self, name: &HeaderName) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Cookies from every `Cookie` header. The first occurrence of a name wins.
    pub fn cookies(&self) -> HashMap<String, String> {
        let joined = self.header_all(&http::header::COOKIE).join(";");
        let mut cookies = HashMap::new();

        for cookie in Cookie::split_parse(joined).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }

        cookies
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.querystring.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// A response generated at the edge instead of forwarding to the origin.
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl EdgeResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Every `Set-Cookie` header, in insertion order.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }
}
