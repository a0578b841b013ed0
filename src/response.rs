//! Builds the responses the gateway answers with directly: redirects and HTML pages.
//!
//! Every cookie in a response becomes its own `Set-Cookie` header.

use crate::edge::EdgeResponse;
use crate::session::CookiePolicy;
use crate::utilities::Utilities;
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::time::Duration;
use time::OffsetDateTime;
use tower_cookies::cookie::Cookie;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CookieValue {
    Set(String),
    /// Expire the cookie immediately.
    Clear,
}

/// A cookie to write, named and scoped by its policy.
#[derive(Clone, Debug)]
pub struct ResponseCookie {
    pub value: CookieValue,
    pub policy: CookiePolicy,
    /// Drives `Max-Age` and `Expires`; ignored when clearing.
    pub lifetime: Option<Duration>,
}

impl ResponseCookie {
    pub fn set(policy: &CookiePolicy, value: String, lifetime: Option<Duration>) -> Self {
        Self {
            value: CookieValue::Set(value),
            policy: policy.clone(),
            lifetime,
        }
    }

    pub fn clear(policy: &CookiePolicy) -> Self {
        Self {
            value: CookieValue::Clear,
            policy: policy.clone(),
            lifetime: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResponseOptions {
    pub cookies: Vec<ResponseCookie>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
}

impl ResponseOptions {
    pub fn cookie(mut self, cookie: ResponseCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// A `302 Found` to `url`, with `options.query` appended.
pub fn redirect(url: &str, options: ResponseOptions) -> EdgeResponse {
    let location = Utilities::append_query(url, &options.query);
    let mut response = build(StatusCode::FOUND, &options, Utc::now());

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            response.headers.insert(LOCATION, value);
        }
        Err(_) => warn!("redirect location is not a valid header value"),
    }
    response.body = Some(format!("Redirecting to: {location}"));
    response
}

/// An HTML page with an arbitrary status. `options.query` is ignored.
pub fn page(status: StatusCode, options: ResponseOptions, body: String) -> EdgeResponse {
    let mut response = build(status, &options, Utc::now());
    response
        .headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("text/html"));
    response.body = Some(body);
    response
}

fn build(status: StatusCode, options: &ResponseOptions, now: DateTime<Utc>) -> EdgeResponse {
    let mut response = EdgeResponse::new(status);

    for cookie in &options.cookies {
        match HeaderValue::from_str(&serialize_cookie_at(cookie, now)) {
            Ok(value) => {
                response.headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = %cookie.policy.name, "cookie is not a valid header value"),
        }
    }

    for (name, value) in &options.headers {
        response.headers.insert(name.clone(), value.clone());
    }

    response
}

/// Serializes one cookie as a `Set-Cookie` value, taking `now` as the current time.
pub fn serialize_cookie_at(cookie: &ResponseCookie, now: DateTime<Utc>) -> String {
    let policy = &cookie.policy;
    let value = match &cookie.value {
        CookieValue::Set(value) => value.clone(),
        CookieValue::Clear => String::new(),
    };

    let mut builder = Cookie::build((policy.name.clone(), value))
        .http_only(policy.http_only)
        .secure(policy.secure);
    if let Some(path) = &policy.path {
        builder = builder.path(path.clone());
    }
    if let Some(domain) = &policy.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(same_site) = policy.same_site {
        builder = builder.same_site(same_site);
    }

    match (&cookie.value, cookie.lifetime) {
        (CookieValue::Clear, _) => {
            builder = builder.expires(OffsetDateTime::UNIX_EPOCH);
        }
        (CookieValue::Set(_), Some(lifetime)) => {
            let seconds = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
            builder = builder.max_age(time::Duration::seconds(seconds));
            if let Ok(expires) =
                OffsetDateTime::from_unix_timestamp(now.timestamp().saturating_add(seconds))
            {
                builder = builder.expires(expires);
            }
        }
        (CookieValue::Set(_), None) => {}
    }

    builder.build().to_string()
}
