use crate::config::TokenEndpoint;
use crate::session::Session;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, StatusCode};
use oauth2::{AuthorizationCode, ClientId, ClientSecret, RedirectUrl};
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("the token exchange request did fail: {source}")]
    RequestFailed {
        #[from]
        source: reqwest::Error,
    },
    #[error("could not correctly serialize token exchange payload")]
    PayloadSerialization,
    #[error("token endpoint rejected the exchange with status {status}: {error_description}")]
    Provider {
        status: u16,
        error_code: Option<String>,
        error_description: String,
    },
    #[error("token endpoint responded with status {status}")]
    Upstream { status: u16 },
    #[error("could not parse token exchange response: {source}")]
    ParseResponse {
        #[from]
        source: serde_json::Error,
    },
    #[error("token endpoint returned no id_token")]
    IdTokenRequired,
}

impl ExchangeError {
    /// Machine-readable code shown on the error page.
    pub fn code(&self) -> &str {
        match self {
            Self::Provider {
                error_code: Some(code),
                ..
            } => code.as_str(),
            Self::IdTokenRequired => "id_token_required",
            _ => "upstream_error",
        }
    }

    /// Provider-supplied description, when the failure could be classified.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Provider {
                error_description, ..
            } => Some(error_description.as_str()),
            Self::IdTokenRequired => Some("The identity provider did not return an ID token"),
            _ => None,
        }
    }
}

/// Error body shapes seen across providers.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

impl ProviderErrorBody {
    fn classify(self, status: StatusCode) -> ExchangeError {
        match self.error_description.or(self.message) {
            Some(error_description) => ExchangeError::Provider {
                status: status.as_u16(),
                error_code: self.error.or(self.error_code),
                error_description,
            },
            None => ExchangeError::Upstream {
                status: status.as_u16(),
            },
        }
    }
}

/// Exchanges authorization codes for tokens at the provider's token endpoint.
#[derive(Clone, Debug)]
pub struct TokenExchangeClient {
    http: reqwest::Client,
    endpoint: TokenEndpoint,
    client_id: ClientId,
    client_secret: ClientSecret,
    require_id_token: bool,
}

impl TokenExchangeClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: TokenEndpoint,
        client_id: ClientId,
        client_secret: ClientSecret,
        require_id_token: bool,
    ) -> Self {
        Self {
            http,
            endpoint,
            client_id,
            client_secret,
            require_id_token,
        }
    }

    /// Redeems `code`, logging the outcome. `redirect_uri` must be the value
    /// sent to the authorize endpoint.
    pub async fn exchange(
        &self,
        code: &AuthorizationCode,
        redirect_uri: &RedirectUrl,
    ) -> Result<Session, ExchangeError> {
        let result = self.request_token(code, redirect_uri).await;

        match &result {
            Ok(session) => info!(
                url = %self.endpoint.url.as_str(),
                token_type = %session.token_type,
                expires_in = ?session.expires_in,
                id_token = session.id_token.is_some(),
                "token exchange succeeded"
            ),
            Err(err) => error!(
                url = %self.endpoint.url.as_str(),
                error_code = %err.code(),
                error = %err,
                "token exchange failed"
            ),
        }

        let session = result?;
        if self.require_id_token && session.id_token.is_none() {
            error!(url = %self.endpoint.url.as_str(), "token exchange returned no id_token");
            return Err(ExchangeError::IdTokenRequired);
        }

        Ok(session)
    }

    async fn request_token(
        &self,
        code: &AuthorizationCode,
        redirect_uri: &RedirectUrl,
    ) -> Result<Session, ExchangeError> {
        let response = self
            .http
            .post(self.endpoint.url.as_str())
            .headers(self.headers())
            .body(self.payload(code, redirect_uri)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status != StatusCode::OK {
            let error_body = serde_json::from_slice::<ProviderErrorBody>(&body).unwrap_or_default();
            return Err(error_body.classify(status));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        if let Ok(user_agent) = HeaderValue::from_str(&self.endpoint.user_agent) {
            headers.insert(USER_AGENT, user_agent);
        }
        for (name, value) in &self.endpoint.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    fn payload(
        &self,
        code: &AuthorizationCode,
        redirect_uri: &RedirectUrl,
    ) -> Result<String, ExchangeError> {
        serde_urlencoded::to_string([
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.secret().as_str()),
            ("code", code.secret().as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .map_err(|_| ExchangeError::PayloadSerialization)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::all)]

    use super::*;
    use oauth2::TokenUrl;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CODE: &str = "A1B2C3D4E5";
    const REDIRECT_URI: &str = "https://d0000000.cloudfront.dev.local/test-login-callback";

    fn client(server: &MockServer, require_id_token: bool) -> TokenExchangeClient {
        client_for(&server.uri(), require_id_token)
    }

    fn client_for(base: &str, require_id_token: bool) -> TokenExchangeClient {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", HeaderValue::from_static("acme"));

        TokenExchangeClient::new(
            reqwest::Client::new(),
            TokenEndpoint {
                url: TokenUrl::new(format!("{}/oauth/token", base)).unwrap(),
                headers,
                user_agent: "exchange-test".to_string(),
            },
            ClientId::new("my-client-id".to_string()),
            ClientSecret::new("my-client-secret".to_string()),
            require_id_token,
        )
    }

    async fn exchange(client: &TokenExchangeClient) -> Result<Session, ExchangeError> {
        client
            .exchange(
                &AuthorizationCode::new(CODE.to_string()),
                &RedirectUrl::new(REDIRECT_URI.to_string()).unwrap(),
            )
            .await
    }

    #[tokio::test]
    async fn posts_form_and_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("accept", "application/json"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("user-agent", "exchange-test"))
            .and(header("x-tenant", "acme"))
            .and(body_string(
                "grant_type=authorization_code&client_id=my-client-id&client_secret=my-client-secret\
                 &code=A1B2C3D4E5&redirect_uri=https%3A%2F%2Fd0000000.cloudfront.dev.local%2Ftest-login-callback",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "some-access-token",
                "expires_in": 86400,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = exchange(&client(&server, false)).await.unwrap();

        assert_eq!(session.token_type, "Bearer");
        assert_eq!(session.access_token, "some-access-token");
        assert_eq!(session.expires_in, Some(86400));
        assert_eq!(session.id_token, None);
    }

    #[tokio::test]
    async fn classifies_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_request",
                "error_description": "Something went really wrong",
            })))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, false)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Provider { status: 400, .. }));
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.description(), Some("Something went really wrong"));
        assert_eq!(
            err.to_string(),
            "token endpoint rejected the exchange with status 400: Something went really wrong"
        );
    }

    #[tokio::test]
    async fn classifies_message_style_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error_code": "access_denied",
                "message": "Unauthorized client",
            })))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, false)).await.unwrap_err();

        assert_eq!(err.code(), "access_denied");
        assert_eq!(err.description(), Some("Unauthorized client"));
    }

    #[tokio::test]
    async fn unclassified_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, false)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Upstream { status: 502 }));
        assert_eq!(err.code(), "upstream_error");
        assert_eq!(err.description(), None);
    }

    #[tokio::test]
    async fn non_200_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "some-access-token",
            })))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, false)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Upstream { status: 201 }));
    }

    #[tokio::test]
    async fn malformed_success_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, false)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::ParseResponse { .. }));
    }

    #[tokio::test]
    async fn missing_required_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "some-access-token",
            })))
            .mount(&server)
            .await;

        let err = exchange(&client(&server, true)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::IdTokenRequired));
        assert_eq!(err.code(), "id_token_required");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_failure() {
        let client = client_for("http://127.0.0.1:1", false);

        let err = exchange(&client).await.unwrap_err();

        assert!(matches!(err, ExchangeError::RequestFailed { .. }));
        assert_eq!(err.code(), "upstream_error");
    }
}
