//! # oauth-cookie-edge Documentation
//!
//! This module is a guide to the crate: how a request is handled, how the
//! pieces fit together, and how to configure and deploy the gateway.
//!
//! ## Overview
//!
//! oauth-cookie-edge runs at a CDN edge in front of an origin. A request is
//! either answered at the edge (a redirect, an error page, the logout page) or
//! allowed through to the origin untouched. The session lives entirely in a
//! cookie, so there is no session store and no state shared between requests
//! apart from a cache of the provider's signing keys.
//!
//! ## Request handling
//!
//! The request path picks one of four routes, matched exactly and in this order:
//!
//! 1. **Login start**: redirect to the provider's authorize endpoint with
//!    `client_id`, `response_type=code`, `redirect_uri` and any configured
//!    extra query parameters.
//! 2. **Login callback**: exchange `code` at the token endpoint, optionally
//!    validate the returned ID token, write the session cookie and redirect
//!    to the post-login path. Failures render the error page and clear the
//!    cookie.
//! 3. **Logout**: clear the cookie, then redirect to the provider's logout
//!    endpoint if one is configured, or show the logout page.
//! 4. **Anything else**: decode the session cookie (and validate its ID token
//!    when configured). A missing or invalid session redirects to login start.
//!    A valid one runs the configured authorizers and passes through.
//!
//! ## Architecture
//!
//! - **config**: `GatewayConfig`, its builder, provider presets and env loading
//! - **edge**: runtime-neutral request and response types
//! - **gateway**: the per-request state machine
//! - **oidc**: token exchange, ID token validation and the JWKS key cache
//! - **policy**: authorizers run after authentication
//! - **response**: redirects, pages and `Set-Cookie` serialization
//! - **router**: axum middleware and router wiring
//! - **session**: the session payload and the cookie codec
//! - **template**: HTML for error and logout pages
//! - **utilities**: URL helpers
//!
//! ## Usage
//!
//! ### Configuration
//!
//! ```ignore
//! let config = GatewayConfig::builder()
//!     .client_id("my-client-id")
//!     .client_secret("my-client-secret")
//!     .authorize_url("https://idp.example/authorize")
//!     .authorize_query_param("scope", "openid email")
//!     .token_url("https://idp.example/oauth/token")
//!     .jwks_url("https://idp.example/.well-known/jwks.json")
//!     .require_id_token(true)
//!     .cookie_secret("a long random string")
//!     .cookie_expires("1day")
//!     .build()?;
//! ```
//!
//! For common providers the builder has presets:
//!
//! ```ignore
//! let config = GatewayConfigBuilder::auth0(client_id, client_secret, "tenant.auth0.com", &[])?
//!     .cookie_secret(secret)
//!     .build()?;
//! ```
//!
//! On Cloudflare Workers every setting is read from the environment, secrets
//! first, e.g. `OAUTH_CLIENT_ID`, `OAUTH_TOKEN_URL`, `COOKIE_SECRET`.
//!
//! ### axum
//!
//! ```ignore
//! let gateway = Gateway::builder(config)
//!     .with_authorizer(EmailDomainAllowList::new(["example.com"]))
//!     .build()?;
//!
//! let app = create_router(gateway, Router::new().route("/", get(index)));
//! ```
//!
//! Handlers behind the gateway can take [`AuthContext`](crate::gateway::AuthContext)
//! as an extractor to read the session and ID token claims.
//!
//! ## Session cookie
//!
//! Without a cookie secret the session is URL-safe base64 of its JSON, which
//! the browser can read. With a secret it is sealed with AES-256-GCM under a
//! key derived from the secret, and prefixed with `v1.`. A cookie that cannot
//! be decoded counts as no session.
//!
//! ## Deployment
//!
//! Built for `wasm32-unknown-unknown`, the crate is a Cloudflare Worker.
//! Authenticated requests are forwarded to the service binding named
//! `PROXY_TARGET`.
