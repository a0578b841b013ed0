#![allow(clippy::all)]

use super::*;
use crate::config::{GatewayConfig, GatewayConfigBuilder};
use http::header::{COOKIE, HOST, LOCATION};
use http::Method;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


const VIEWER_HOST: &str = "d0000000.cloudfront.local";
const BASE_URL: &str = "https://d0000000.cloudfront.dev.local";
const CODE: &str = "A1B2C3D4E5";

const POST_LOGIN: &str = "/test-start";
const LOGIN_START: &str = "/test-login";
const LOGIN_CALLBACK: &str = "/test-login-callback";
const LOGOUT: &str = "/test-logout";

// Helper function to create a configuration pointing at a mock provider
fn config_builder(server: &MockServer) -> GatewayConfigBuilder {
    GatewayConfig::builder()
        .client_id("test-client-id")
        .client_secret("test-client-secret")
        .authorize_url("https://idp.example/authorize")
        .authorize_query_param("scope", "openid email")
        .token_url(format!("{}/oauth/token", server.uri()))
        .base_url(BASE_URL)
        .post_login_path(POST_LOGIN)
        .login_start_path(LOGIN_START)
        .login_callback_path(LOGIN_CALLBACK)
        .logout_path(LOGOUT)
}

fn gateway(config: GatewayConfig) -> Gateway {
    Gateway::builder(config).build().unwrap()
}

// Helper function to create a viewer request
fn request(path: &str) -> EdgeRequest {
    EdgeRequest::new(Method::GET, path).with_header(HOST, VIEWER_HOST)
}

fn callback_request() -> EdgeRequest {
    request(LOGIN_CALLBACK).with_query(format!("code={CODE}"))
}

fn with_session_cookie(request: EdgeRequest, value: &str) -> EdgeRequest {
    request.with_header(COOKIE, &format!("auth={value}"))
}

fn respond(outcome: Outcome) -> EdgeResponse {
    match outcome {
        Outcome::Respond(response) => response,
        Outcome::PassThrough(context) => panic!("expected a response, request passed through: {context:?}"),
    }
}

fn pass_through(outcome: Outcome) -> AuthContext {
    match outcome {
        Outcome::PassThrough(context) => context,
        Outcome::Respond(response) => panic!("expected pass-through, got {response:?}"),
    }
}

fn location(response: &EdgeResponse) -> &str {
    response.header(&LOCATION).unwrap()
}

/// Value of the single `Set-Cookie` header, without attributes.
fn cookie_value(response: &EdgeResponse) -> String {
    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 1, "expected one Set-Cookie header");
    let pair = cookies[0].split(';').next().unwrap();
    pair.strip_prefix("auth=").unwrap().to_string()
}

fn assert_cookie_cleared(response: &EdgeResponse) {
    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 1, "expected one Set-Cookie header");
    assert!(cookies[0].starts_with("auth=;"), "cookie not cleared: {}", cookies[0]);
    assert!(cookies[0].contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
}

fn session(id_token: Option<String>) -> Session {
    Session {
        token_type: "Bearer".to_string(),
        access_token: "access-token".to_string(),
        id_token,
        refresh_token: None,
        expires_in: Some(86400),
        scope: Some("openid email".to_string()),
    }
}

fn token_body(id_token: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "access_token": "access-token",
        "token_type": "Bearer",
        "expires_in": 86400,
        "scope": "openid email",
    });
    if let Some(id_token) = id_token {
        body["id_token"] = json!(id_token);
    }
    body
}

async fn mock_token_endpoint(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(response)
        .mount(server)
        .await;
}
