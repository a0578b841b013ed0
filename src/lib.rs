//! # oauth-cookie-edge
//!
//! A stateless OAuth2 session gateway for CDN edges. It sits in front of an
//! origin, runs the authorization code flow against an identity provider and
//! keeps the resulting session in a cookie, so no server-side storage is
//! needed. On Cloudflare Workers (`wasm32-unknown-unknown`) authenticated
//! traffic is forwarded to the service bound as `PROXY_TARGET`.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with a configurable provider
//! - Session cookie, optionally encrypted with AES-256-GCM
//! - ID token validation via JWKS, a shared secret, or decode-only
//! - Pluggable page templates and post-authentication authorizers
//! - axum middleware and a Cloudflare Workers entry point
//!
//! See the [docs](crate::docs) module for comprehensive documentation.

pub mod config;
pub mod docs;
pub mod edge;
pub mod error;
pub mod gateway;
pub mod oidc;
pub mod policy;
pub mod response;
pub mod router;
pub mod session;
pub mod template;
pub mod utilities;

#[cfg(target_arch = "wasm32")]
mod cloudflare;

pub use config::{ConfigError, GatewayConfig, GatewayConfigBuilder};
pub use edge::{EdgeRequest, EdgeResponse};
pub use error::GatewayError;
pub use gateway::{AuthContext, Gateway, GatewayBuilder, Outcome};
pub use router::create_router;
pub use session::{CookieCodec, CookiePolicy, Session};
