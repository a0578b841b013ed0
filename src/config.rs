//! Configuration management for the gateway.
//!
//! [`GatewayConfig`] is immutable once built. Values are resolved with a fixed
//! precedence: built-in defaults, then whatever the caller supplies to the
//! [`GatewayConfigBuilder`], then the invariants the gateway enforces at
//! [`GatewayConfigBuilder::build`].

use crate::session::CookiePolicy;
use http::{HeaderMap, HeaderName, HeaderValue};
use oauth2::{AuthUrl, ClientId, ClientSecret, TokenUrl};
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use tower_cookies::cookie::SameSite;
use tracing::warn;
use url::Url;

pub const DEFAULT_POST_LOGIN_PATH: &str = "/";
pub const DEFAULT_LOGIN_START_PATH: &str = "/auth/login";
pub const DEFAULT_LOGIN_CALLBACK_PATH: &str = "/auth/callback";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

/// User agent sent to the identity provider unless overridden.
pub const DEFAULT_USER_AGENT: &str = env!("CARGO_PKG_NAME");

/// Name of the Worker service binding requests are forwarded to once authenticated.
pub const PROXY_TARGET_BINDING: &str = "PROXY_TARGET";

/// Provider authorize endpoint and the extra query parameters sent with it.
#[derive(Clone, Debug)]
pub struct AuthorizeEndpoint {
    pub url: AuthUrl,
    pub query: Vec<(String, String)>,
}

/// Provider token endpoint for the authorization-code exchange.
#[derive(Clone, Debug)]
pub struct TokenEndpoint {
    pub url: TokenUrl,
    pub headers: HeaderMap,
    pub user_agent: String,
}

/// How an ID token is checked before its claims are trusted.
#[derive(Clone)]
pub enum IdTokenVerification {
    /// Verify the signature with keys published at a JWKS endpoint.
    Jwks {
        url: Url,
        headers: HeaderMap,
        user_agent: String,
    },
    /// Verify an HMAC signature with a secret shared with the provider.
    SharedSecret { secret: String },
    /// Decode the payload without checking the signature or expiry.
    Unverified,
}

impl Debug for IdTokenVerification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwks { url, user_agent, .. } => f
                .debug_struct("Jwks")
                .field("url", &url.as_str())
                .field("user_agent", user_agent)
                .finish_non_exhaustive(),
            Self::SharedSecret { .. } => f
                .debug_struct("SharedSecret")
                .field("secret", &"[redacted]")
                .finish(),
            Self::Unverified => f.write_str("Unverified"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdTokenPolicy {
    pub verification: IdTokenVerification,
    /// Fail the callback when the provider returns no ID token.
    pub required: bool,
}

/// The gateway's special paths. Matching is exact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub post_login: String,
    pub login_start: String,
    pub login_callback: String,
    pub logout: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            post_login: DEFAULT_POST_LOGIN_PATH.to_string(),
            login_start: DEFAULT_LOGIN_START_PATH.to_string(),
            login_callback: DEFAULT_LOGIN_CALLBACK_PATH.to_string(),
            logout: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// The client ID registered with the identity provider
    pub client_id: ClientId,
    /// The client secret registered with the identity provider
    pub client_secret: ClientSecret,
    pub authorize: AuthorizeEndpoint,
    pub token: TokenEndpoint,
    /// Provider end-session endpoint, if the provider has one
    pub logout_url: Option<Url>,
    pub id_token: Option<IdTokenPolicy>,
    /// Public origin of the protected site; falls back to `https://{Host}`
    pub base_url: Option<String>,
    pub routes: Routes,
    pub cookie: CookiePolicy,
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Create a new configuration from flat key/value settings
    ///
    /// # Arguments
    ///
    /// * `lookup` - Resolves a setting name such as `OAUTH_CLIENT_ID` to its value
    ///
    /// # Returns
    ///
    /// A Result containing the configuration or an error if required values are missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let mut builder = GatewayConfigBuilder::new()
            .client_id(get("OAUTH_CLIENT_ID").ok_or(ConfigError::MissingValue("OAUTH_CLIENT_ID"))?)
            .client_secret(
                get("OAUTH_CLIENT_SECRET").ok_or(ConfigError::MissingValue("OAUTH_CLIENT_SECRET"))?,
            )
            .authorize_url(
                get("OAUTH_AUTHORIZE_URL").ok_or(ConfigError::MissingValue("OAUTH_AUTHORIZE_URL"))?,
            )
            .token_url(get("OAUTH_TOKEN_URL").ok_or(ConfigError::MissingValue("OAUTH_TOKEN_URL"))?);

        if let Some(query) = get("OAUTH_AUTHORIZE_QUERY") {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                builder = builder.authorize_query_param(key, value);
            }
        }
        if let Some(user_agent) = get("OAUTH_TOKEN_USER_AGENT") {
            builder = builder.token_user_agent(user_agent);
        }
        if let Some(url) = get("OAUTH_LOGOUT_URL") {
            builder = builder.logout_url(url);
        }
        if let Some(url) = get("OAUTH_JWKS_URL") {
            builder = builder.jwks_url(url);
        }
        if let Some(secret) = get("OAUTH_JWT_SECRET") {
            builder = builder.jwt_secret(secret);
        }
        if flag(&get, "OAUTH_ID_TOKEN_UNVERIFIED")?.unwrap_or(false) {
            builder = builder.unverified_id_token();
        }
        if let Some(required) = flag(&get, "OAUTH_ID_TOKEN_REQUIRED")? {
            builder = builder.require_id_token(required);
        }

        if let Some(base_url) = get("BASE_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(path) = get("POST_LOGIN_PATH") {
            builder = builder.post_login_path(path);
        }
        if let Some(path) = get("LOGIN_START_PATH") {
            builder = builder.login_start_path(path);
        }
        if let Some(path) = get("LOGIN_CALLBACK_PATH") {
            builder = builder.login_callback_path(path);
        }
        if let Some(path) = get("LOGOUT_PATH") {
            builder = builder.logout_path(path);
        }

        if let Some(name) = get("COOKIE_NAME") {
            builder = builder.cookie_name(name);
        }
        if let Some(path) = get("COOKIE_PATH") {
            builder = builder.cookie_path(path);
        }
        if let Some(domain) = get("COOKIE_DOMAIN") {
            builder = builder.cookie_domain(domain);
        }
        if let Some(http_only) = flag(&get, "COOKIE_HTTP_ONLY")? {
            builder = builder.cookie_http_only(http_only);
        }
        if let Some(secure) = flag(&get, "COOKIE_SECURE")? {
            builder = builder.cookie_secure(secure);
        }
        if let Some(same_site) = get("COOKIE_SAME_SITE") {
            builder = builder.cookie_same_site(parse_same_site(&same_site)?);
        }
        if let Some(secret) = get("COOKIE_SECRET") {
            builder = builder.cookie_secret(secret);
        }
        if let Some(expires) = get("COOKIE_EXPIRES") {
            builder = builder.cookie_expires(expires);
        }
        if let Some(dev_mode) = flag(&get, "DEV_MODE")? {
            builder = builder.dev_mode(dev_mode);
        }

        builder.build()
    }

    /// Create a new configuration from the Worker environment, preferring
    /// secrets over plain vars for every key.
    #[cfg(target_arch = "wasm32")]
    pub fn from_env(env: &worker::Env) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            env.secret(key)
                .map(|secret| secret.to_string())
                .or_else(|_| env.var(key).map(|var| var.to_string()))
                .ok()
        })
    }

    /// Create a new configuration from the process environment.
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn flag<F>(get: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|value| value.to_ascii_lowercase()) {
        None => Ok(None),
        Some(value) if value == "true" || value == "1" => Ok(Some(true)),
        Some(value) if value == "false" || value == "0" => Ok(Some(false)),
        Some(_) => Err(ConfigError::InvalidValue(key)),
    }
}

fn parse_same_site(value: &str) -> Result<SameSite, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" => Ok(SameSite::None),
        _ => Err(ConfigError::InvalidValue("COOKIE_SAME_SITE")),
    }
}

/// Builds a [`GatewayConfig`].
#[derive(Default)]
pub struct GatewayConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    authorize_url: Option<String>,
    authorize_query: Vec<(String, String)>,
    token_url: Option<String>,
    token_headers: Vec<(String, String)>,
    token_user_agent: Option<String>,
    logout_url: Option<String>,
    jwks_url: Option<String>,
    jwks_headers: Vec<(String, String)>,
    jwks_user_agent: Option<String>,
    jwt_secret: Option<String>,
    unverified_id_token: bool,
    require_id_token: bool,
    base_url: Option<String>,
    routes: Routes,
    cookie: CookiePolicy,
    cookie_expires: Option<String>,
    dev_mode: bool,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for an Auth0 tenant.
    ///
    /// `domain` is the bare tenant host, e.g. `example.eu.auth0.com`. ID tokens
    /// are required and verified against the tenant's published key set.
    pub fn auth0(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        domain: &str,
        scopes: &[&str],
    ) -> Result<Self, ConfigError> {
        if domain.starts_with("http://") || domain.starts_with("https://") {
            return Err(ConfigError::InvalidValue("auth0 domain must not start with http(s)://"));
        }

        let scope = ["openid", "email"]
            .iter()
            .chain(scopes)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Self::new()
            .client_id(client_id)
            .client_secret(client_secret)
            .authorize_url(format!("https://{domain}/authorize"))
            .authorize_query_param("scope", scope)
            .token_url(format!("https://{domain}/oauth/token"))
            .jwks_url(format!("https://{domain}/.well-known/jwks.json"))
            .require_id_token(true))
    }

    /// Preset for Google accounts.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: &[&str],
    ) -> Self {
        let mut builder = Self::new()
            .client_id(client_id)
            .client_secret(client_secret)
            .authorize_url("https://accounts.google.com/o/oauth2/v2/auth")
            .token_url("https://oauth2.googleapis.com/token")
            .jwks_url("https://www.googleapis.com/oauth2/v3/certs")
            .require_id_token(true);

        if !scopes.is_empty() {
            builder = builder.authorize_query_param("scope", scopes.join(" "));
        }
        builder
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = Some(url.into());
        self
    }

    /// Adds an authorize query parameter, replacing an earlier one with the same key.
    pub fn authorize_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.authorize_query.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.authorize_query.push((key, value)),
        }
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    pub fn token_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_headers.push((name.into(), value.into()));
        self
    }

    pub fn token_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.token_user_agent = Some(user_agent.into());
        self
    }

    pub fn logout_url(mut self, url: impl Into<String>) -> Self {
        self.logout_url = Some(url.into());
        self
    }

    pub fn jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn jwks_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.jwks_headers.push((name.into(), value.into()));
        self
    }

    pub fn jwks_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.jwks_user_agent = Some(user_agent.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Accept ID tokens without checking their signature.
    pub fn unverified_id_token(mut self) -> Self {
        self.unverified_id_token = true;
        self
    }

    pub fn require_id_token(mut self, required: bool) -> Self {
        self.require_id_token = required;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn post_login_path(mut self, path: impl Into<String>) -> Self {
        self.routes.post_login = path.into();
        self
    }

    pub fn login_start_path(mut self, path: impl Into<String>) -> Self {
        self.routes.login_start = path.into();
        self
    }

    pub fn login_callback_path(mut self, path: impl Into<String>) -> Self {
        self.routes.login_callback = path.into();
        self
    }

    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.routes.logout = path.into();
        self
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    pub fn cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = Some(path.into());
        self
    }

    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    pub fn cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    pub fn cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = Some(same_site);
        self
    }

    pub fn cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie.secret = Some(secret.into());
        self
    }

    /// Fixed cookie lifetime as a duration string such as `"1d"` or `"10m"`.
    pub fn cookie_expires(mut self, expires: impl Into<String>) -> Self {
        self.cookie_expires = Some(expires.into());
        self
    }

    /// Development mode drops the `Secure` cookie attribute so plain-http hosts work.
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        let client_id = self.client_id.ok_or(ConfigError::MissingValue("client_id"))?;
        let client_secret = self
            .client_secret
            .ok_or(ConfigError::MissingValue("client_secret"))?;

        let authorize_url = self
            .authorize_url
            .ok_or(ConfigError::MissingValue("authorize_url"))?;
        let authorize_url =
            AuthUrl::new(authorize_url).map_err(|_| ConfigError::InvalidUrl("authorize_url"))?;

        let token_url = self.token_url.ok_or(ConfigError::MissingValue("token_url"))?;
        let token_url = TokenUrl::new(token_url).map_err(|_| ConfigError::InvalidUrl("token_url"))?;

        let logout_url = self
            .logout_url
            .map(|url| Url::parse(&url).map_err(|_| ConfigError::InvalidUrl("logout_url")))
            .transpose()?;

        let verification = match (self.jwks_url, self.jwt_secret) {
            (Some(url), secret) => {
                if secret.is_some() {
                    warn!("jwt secret ignored because a jwks url is configured");
                }
                Some(IdTokenVerification::Jwks {
                    url: Url::parse(&url).map_err(|_| ConfigError::InvalidUrl("jwks_url"))?,
                    headers: header_map(self.jwks_headers)?,
                    user_agent: self
                        .jwks_user_agent
                        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                })
            }
            (None, Some(secret)) => Some(IdTokenVerification::SharedSecret { secret }),
            (None, None) if self.unverified_id_token || self.require_id_token => {
                Some(IdTokenVerification::Unverified)
            }
            (None, None) => None,
        };

        let id_token = verification.map(|verification| IdTokenPolicy {
            verification,
            required: self.require_id_token,
        });

        let mut cookie = self.cookie;
        if cookie.name.is_empty() {
            return Err(ConfigError::InvalidValue("cookie name must not be empty"));
        }
        if let Some(expires) = self.cookie_expires {
            cookie.expires = Some(
                humantime::parse_duration(&expires)
                    .map_err(|source| ConfigError::InvalidDuration { value: expires, source })?,
            );
        }
        if self.dev_mode {
            cookie.secure = false;
        }

        Ok(GatewayConfig {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            authorize: AuthorizeEndpoint {
                url: authorize_url,
                query: self.authorize_query,
            },
            token: TokenEndpoint {
                url: token_url,
                headers: header_map(self.token_headers)?,
                user_agent: self
                    .token_user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
            logout_url,
            id_token,
            base_url: self.base_url,
            routes: self.routes,
            cookie,
        })
    }
}

fn header_map(headers: Vec<(String, String)>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_str(&name).map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(&value).map_err(|_| ConfigError::InvalidHeader(name.to_string()))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration value is missing
    #[error("Missing required configuration value: {0}")]
    MissingValue(&'static str),
    #[error("Invalid URL for configuration value: {0}")]
    InvalidUrl(&'static str),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Invalid duration {value:?}: {source}")]
    InvalidDuration {
        value: String,
        source: humantime::DurationError,
    },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn minimal() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
            .client_id("client")
            .client_secret("secret")
            .authorize_url("https://idp.example/authorize")
            .token_url("https://idp.example/oauth/token")
    }

    #[test]
    fn test_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.routes, Routes::default());
        assert_eq!(config.routes.login_start, "/auth/login");
        assert_eq!(config.cookie.name, "auth");
        assert_eq!(config.cookie.path.as_deref(), Some("/"));
        assert!(config.cookie.http_only);
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.same_site, Some(SameSite::Lax));
        assert_eq!(config.token.user_agent, DEFAULT_USER_AGENT);
        assert!(config.id_token.is_none());
        assert!(config.logout_url.is_none());
    }

    #[test]
    fn test_missing_values() {
        let err = GatewayConfigBuilder::new().client_id("client").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("client_secret")));

        let err = minimal().token_url("not a url").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl("token_url")));
    }

    #[test]
    fn test_jwks_discards_shared_secret() {
        let config = minimal()
            .jwt_secret("shh")
            .jwks_url("https://idp.example/.well-known/jwks.json")
            .build()
            .unwrap();

        let policy = config.id_token.unwrap();
        assert!(matches!(policy.verification, IdTokenVerification::Jwks { .. }));
        assert!(!policy.required);
    }

    #[test]
    fn test_shared_secret_and_unverified() {
        let config = minimal().jwt_secret("shh").build().unwrap();
        assert!(matches!(
            config.id_token.unwrap().verification,
            IdTokenVerification::SharedSecret { .. }
        ));

        let config = minimal().unverified_id_token().build().unwrap();
        assert!(matches!(
            config.id_token.unwrap().verification,
            IdTokenVerification::Unverified
        ));

        let config = minimal().require_id_token(true).build().unwrap();
        let policy = config.id_token.unwrap();
        assert!(policy.required);
        assert!(matches!(policy.verification, IdTokenVerification::Unverified));
    }

    #[test]
    fn test_dev_mode_forces_insecure_cookie() {
        let config = minimal().cookie_secure(true).dev_mode(true).build().unwrap();
        assert!(!config.cookie.secure);
    }

    #[test]
    fn test_cookie_expires() {
        let config = minimal().cookie_expires("1d").build().unwrap();
        assert_eq!(config.cookie.expires, Some(Duration::from_secs(86400)));

        let err = minimal().cookie_expires("soon").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn test_auth0_preset() {
        let config = GatewayConfigBuilder::auth0("client", "secret", "tenant.eu.auth0.com", &["profile"])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.authorize.url.as_str(), "https://tenant.eu.auth0.com/authorize");
        assert_eq!(
            config.authorize.query,
            vec![("scope".to_string(), "openid email profile".to_string())]
        );
        assert_eq!(config.token.url.as_str(), "https://tenant.eu.auth0.com/oauth/token");
        let policy = config.id_token.unwrap();
        assert!(policy.required);
        match policy.verification {
            IdTokenVerification::Jwks { url, .. } => {
                assert_eq!(url.as_str(), "https://tenant.eu.auth0.com/.well-known/jwks.json")
            }
            other => panic!("unexpected verification {other:?}"),
        }

        assert!(GatewayConfigBuilder::auth0("c", "s", "https://tenant.auth0.com", &[]).is_err());
    }

    #[test]
    fn test_google_preset() {
        let config = GatewayConfigBuilder::google("client", "secret", &["openid", "email"])
            .build()
            .unwrap();

        assert_eq!(
            config.authorize.url.as_str(),
            "https://accounts.google.com/o/oauth2/v2/auth"
        );
        assert_eq!(config.token.url.as_str(), "https://oauth2.googleapis.com/token");
        assert!(config.id_token.unwrap().required);
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OAUTH_CLIENT_ID", "client"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("OAUTH_AUTHORIZE_URL", "https://idp.example/authorize"),
            ("OAUTH_AUTHORIZE_QUERY", "scope=openid+email&prompt=login"),
            ("OAUTH_TOKEN_URL", "https://idp.example/oauth/token"),
            ("OAUTH_JWT_SECRET", "shh"),
            ("OAUTH_ID_TOKEN_REQUIRED", "true"),
            ("BASE_URL", "https://app.example"),
            ("LOGIN_CALLBACK_PATH", "/cb"),
            ("COOKIE_NAME", "session"),
            ("COOKIE_SAME_SITE", "Strict"),
            ("COOKIE_EXPIRES", "10m"),
            ("COOKIE_DOMAIN", ""),
            ("DEV_MODE", "true"),
        ]);

        let config =
            GatewayConfig::from_lookup(|key| env.get(key).map(|value| value.to_string())).unwrap();

        assert_eq!(config.client_id.as_str(), "client");
        assert_eq!(config.client_secret.secret(), "secret");
        assert_eq!(
            config.authorize.query,
            vec![
                ("scope".to_string(), "openid email".to_string()),
                ("prompt".to_string(), "login".to_string()),
            ]
        );
        assert_eq!(config.base_url.as_deref(), Some("https://app.example"));
        assert_eq!(config.routes.login_callback, "/cb");
        assert_eq!(config.routes.logout, DEFAULT_LOGOUT_PATH);
        assert_eq!(config.cookie.name, "session");
        assert_eq!(config.cookie.domain, None);
        assert_eq!(config.cookie.same_site, Some(SameSite::Strict));
        assert_eq!(config.cookie.expires, Some(Duration::from_secs(600)));
        assert!(!config.cookie.secure);
        let policy = config.id_token.unwrap();
        assert!(policy.required);
        assert!(matches!(policy.verification, IdTokenVerification::SharedSecret { .. }));
    }

    #[test]
    fn test_from_lookup_rejects_bad_flags() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OAUTH_CLIENT_ID", "client"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("OAUTH_AUTHORIZE_URL", "https://idp.example/authorize"),
            ("OAUTH_TOKEN_URL", "https://idp.example/oauth/token"),
            ("COOKIE_SECURE", "maybe"),
        ]);

        let err = GatewayConfig::from_lookup(|key| env.get(key).map(|value| value.to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("COOKIE_SECURE")));

        let err = GatewayConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("OAUTH_CLIENT_ID")));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = minimal().jwt_secret("jwt-shh").cookie_secret("cookie-shh").build().unwrap();
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("jwt-shh"));
        assert!(!rendered.contains("cookie-shh"));
        assert!(!rendered.contains("\"secret\""));
    }
}
