//! The per-request decision: answer at the edge, or let the request through.
//!
//! Nothing is remembered between requests. Whether a caller is authenticated
//! is derived each time from the session cookie and, when configured, its
//! ID token.

use crate::config::{ConfigError, GatewayConfig};
use crate::edge::{EdgeRequest, EdgeResponse};
use crate::error::GatewayError;
use crate::oidc::id_token::{IdTokenClaims, IdTokenValidator};
use crate::oidc::jwks::cache::in_memory::InMemoryJwksCache;
use crate::oidc::jwks::cache::JwksCache;
use crate::oidc::token_exchange::TokenExchangeClient;
use crate::policy::Authorizer;
use crate::response::{page, redirect, ResponseCookie, ResponseOptions};
use crate::session::{CookieCodec, Session};
use crate::template::{DefaultTemplate, TemplateRenderer};
use crate::utilities::Utilities;
use http::StatusCode;
use oauth2::{AuthorizationCode, RedirectUrl};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Deadline for each call to the identity provider.
#[cfg(not(target_arch = "wasm32"))]
pub const UPSTREAM_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// What the gateway knows about an authenticated caller.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub session: Session,
    /// Present when the session's ID token was validated.
    pub claims: Option<IdTokenClaims>,
}

/// Result of handling one request.
#[derive(Debug)]
pub enum Outcome {
    /// Answer the viewer directly.
    Respond(EdgeResponse),
    /// Forward the original request to the origin unchanged.
    PassThrough(AuthContext),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    LoginStart,
    LoginCallback,
    Logout,
    Protected,
}

impl Route {
    /// Exact path match, checked in the order login start, callback, logout.
    pub fn resolve(path: &str, config: &GatewayConfig) -> Self {
        let routes = &config.routes;
        if path == routes.login_start {
            Route::LoginStart
        } else if path == routes.login_callback {
            Route::LoginCallback
        } else if path == routes.logout {
            Route::Logout
        } else {
            Route::Protected
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

#[derive(Debug)]
struct GatewayInner {
    config: GatewayConfig,
    codec: CookieCodec,
    exchange: TokenExchangeClient,
    validator: Option<IdTokenValidator>,
    template: Arc<dyn TemplateRenderer>,
    authorizers: Vec<Arc<dyn Authorizer>>,
}

pub struct GatewayBuilder {
    config: GatewayConfig,
    template: Arc<dyn TemplateRenderer>,
    jwks_cache: Arc<dyn JwksCache>,
    authorizers: Vec<Arc<dyn Authorizer>>,
    http: Option<reqwest::Client>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            template: Arc::new(DefaultTemplate),
            jwks_cache: Arc::new(InMemoryJwksCache::new()),
            authorizers: Vec::new(),
            http: None,
        }
    }

    pub fn with_template(mut self, template: impl TemplateRenderer + 'static) -> Self {
        self.template = Arc::new(template);
        self
    }

    /// Share a key cache between gateways, e.g. across requests in one isolate.
    pub fn with_jwks_cache(mut self, cache: Arc<dyn JwksCache>) -> Self {
        self.jwks_cache = cache;
        self
    }

    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizers.push(Arc::new(authorizer));
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<Gateway, ConfigError> {
        let http = match self.http {
            Some(http) => http,
            None => http_client()?,
        };

        let config = self.config;
        let validator = config.id_token.as_ref().map(|policy| {
            IdTokenValidator::new(
                &policy.verification,
                config.client_id.as_str(),
                http.clone(),
                self.jwks_cache.clone(),
            )
        });
        let exchange = TokenExchangeClient::new(
            http,
            config.token.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.id_token.as_ref().is_some_and(|policy| policy.required),
        );

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                codec: CookieCodec::new(config.cookie.secret.as_deref()),
                config,
                exchange,
                validator,
                template: self.template,
                authorizers: self.authorizers,
            }),
        })
    }
}

fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    let builder = reqwest::Client::builder();
    #[cfg(not(target_arch = "wasm32"))]
    let builder = builder.timeout(UPSTREAM_TIMEOUT);
    builder.build()
}

/// A gateway built on first use and reused afterwards, e.g. for the life of a
/// Worker isolate. A failed build is not remembered.
#[derive(Debug, Default)]
pub struct SharedGateway {
    cell: OnceLock<Gateway>,
}

impl SharedGateway {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_try_build<F, E>(&self, build: F) -> Result<Gateway, E>
    where
        F: FnOnce() -> Result<Gateway, E>,
    {
        if let Some(gateway) = self.cell.get() {
            return Ok(gateway.clone());
        }

        let gateway = build()?;
        Ok(self.cell.get_or_init(|| gateway).clone())
    }
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    #[tracing::instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn handle(&self, request: &EdgeRequest) -> Outcome {
        let route = Route::resolve(&request.path, &self.inner.config);
        debug!(?route, "resolved route");

        match route {
            Route::LoginStart => Outcome::Respond(self.login_start(request)),
            Route::LoginCallback => Outcome::Respond(self.login_callback(request).await),
            Route::Logout => Outcome::Respond(self.logout()),
            Route::Protected => self.protected(request).await,
        }
    }

    fn base_url(&self, request: &EdgeRequest) -> Option<String> {
        self.inner
            .config
            .base_url
            .clone()
            .or_else(|| Utilities::self_base_url(request))
    }

    fn redirect_uri(&self, base_url: &str) -> Result<RedirectUrl, GatewayError> {
        let url = Utilities::concat_url(base_url, &self.inner.config.routes.login_callback);
        RedirectUrl::new(url).map_err(|err| GatewayError::Config(format!("invalid redirect uri: {err}")))
    }

    fn login_start(&self, request: &EdgeRequest) -> EdgeResponse {
        let config = &self.inner.config;

        let redirect_uri = match self
            .base_url(request)
            .ok_or_else(|| GatewayError::Config("no base url and no host header".to_string()))
            .and_then(|base_url| self.redirect_uri(&base_url))
        {
            Ok(redirect_uri) => redirect_uri,
            Err(err) => return self.error_page(&err, ResponseOptions::default()),
        };

        let query = Utilities::merge_query(
            vec![
                ("client_id".to_string(), config.client_id.as_str().to_string()),
                ("response_type".to_string(), "code".to_string()),
                ("redirect_uri".to_string(), redirect_uri.as_str().to_string()),
            ],
            &config.authorize.query,
        );

        info!("redirecting to authorize endpoint");
        redirect(config.authorize.url.as_str(), ResponseOptions::default().query(query))
    }

    async fn login_callback(&self, request: &EdgeRequest) -> EdgeResponse {
        match self.complete_login(request).await {
            Ok(response) => response,
            Err(err) => self.error_page(
                &err,
                ResponseOptions::default().cookie(ResponseCookie::clear(&self.inner.config.cookie)),
            ),
        }
    }

    async fn complete_login(&self, request: &EdgeRequest) -> Result<EdgeResponse, GatewayError> {
        let config = &self.inner.config;

        let code = request
            .query_param("code")
            .filter(|code| !code.is_empty())
            .ok_or(GatewayError::MissingCode)?;
        let base_url = self
            .base_url(request)
            .ok_or_else(|| GatewayError::Config("no base url and no host header".to_string()))?;
        let redirect_uri = self.redirect_uri(&base_url)?;

        let session = self
            .inner
            .exchange
            .exchange(&AuthorizationCode::new(code), &redirect_uri)
            .await?;

        if let (Some(validator), Some(id_token)) = (&self.inner.validator, &session.id_token) {
            let required = config.id_token.as_ref().is_some_and(|policy| policy.required);
            match validator.validate(id_token).await {
                Ok(claims) => debug!(claims = claims.len(), "validated id token from exchange"),
                Err(err) if required => return Err(err.into()),
                Err(err) => warn!(error = %err, "id token from exchange failed validation"),
            }
        }

        let value = self.inner.codec.encode(&session)?;
        let lifetime = config.cookie.expires.or_else(|| session.expires_in());

        info!(lifetime = ?lifetime, "login completed");
        Ok(redirect(
            &Utilities::concat_url(&base_url, &config.routes.post_login),
            ResponseOptions::default().cookie(ResponseCookie::set(&config.cookie, value, lifetime)),
        ))
    }

    fn logout(&self) -> EdgeResponse {
        let config = &self.inner.config;
        let options = ResponseOptions::default().cookie(ResponseCookie::clear(&config.cookie));

        info!(provider_logout = config.logout_url.is_some(), "logging out");
        match &config.logout_url {
            Some(logout_url) => redirect(
                logout_url.as_str(),
                options.query(config.authorize.query.clone()),
            ),
            None => page(StatusCode::OK, options, self.inner.template.logout_page()),
        }
    }

    async fn protected(&self, request: &EdgeRequest) -> Outcome {
        let config = &self.inner.config;

        let session = request
            .cookie(&config.cookie.name)
            .filter(|value| !value.is_empty())
            .and_then(|value| self.inner.codec.decode_session(&value));

        let Some(session) = session else {
            info!(authenticated = false, "no session");
            return Outcome::Respond(self.redirect_to_login(request));
        };

        let claims = match (&self.inner.validator, &session.id_token) {
            (Some(validator), Some(id_token)) => match validator.validate(id_token).await {
                Ok(claims) => Some(claims),
                Err(err) => {
                    // The cookie is left in place; the browser keeps sending it until it expires.
                    warn!(error = %err, authenticated = false, "session id token rejected");
                    return Outcome::Respond(self.redirect_to_login(request));
                }
            },
            _ => None,
        };

        let context = AuthContext { session, claims };
        for authorizer in &self.inner.authorizers {
            if let Err(err) = authorizer.authorize(&context) {
                return Outcome::Respond(self.error_page(&err, ResponseOptions::default()));
            }
        }

        info!(authenticated = true, claims = context.claims.is_some(), "passing through");
        Outcome::PassThrough(context)
    }

    fn redirect_to_login(&self, request: &EdgeRequest) -> EdgeResponse {
        let login_start = &self.inner.config.routes.login_start;
        let location = match self.base_url(request) {
            Some(base_url) => Utilities::concat_url(&base_url, login_start),
            None => login_start.clone(),
        };
        redirect(&location, ResponseOptions::default())
    }

    /// Renders `err` through the template.
    pub fn error_page(&self, err: &GatewayError, options: ResponseOptions) -> EdgeResponse {
        error!(status = %err.status(), code = %err.code(), error = %err, "responding with error page");
        page(
            err.status(),
            options,
            self.inner
                .template
                .error_page(err.description(), Some(err.code())),
        )
    }
}
