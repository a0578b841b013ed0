//! Routing configuration for hosting the gateway in front of an axum application.
//!
//! [`create_router`] wraps any router so that every request first passes the
//! gateway. Authenticated requests reach the inner application with an
//! [`AuthContext`] in their extensions, which handlers take as an extractor.

use crate::edge::{EdgeRequest, EdgeResponse};
use crate::gateway::{AuthContext, Gateway, Outcome};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use custom_error::custom_error;
use http::{HeaderName, StatusCode};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tracing::debug;

custom_error! {
    pub AuthContextRejection
        Unauthenticated = "request did not pass the gateway",
}

impl IntoResponse for AuthContextRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "unauthorized",
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthContextRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthContextRejection::Unauthenticated)
    }
}

//
// On wasm32, define a newtype that wraps a future and unsafely marks it as Send.
// This is safe on single-threaded targets.
//
#[cfg(target_arch = "wasm32")]
struct NonSendFuture<F>(F);

#[cfg(target_arch = "wasm32")]
impl<F: Future> Future for NonSendFuture<F> {
    type Output = F::Output;
    fn poll(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        // SAFETY: Delegate polling to the inner future.
        unsafe { self.map_unchecked_mut(|s| &mut s.0) }.poll(cx)
    }
}

#[cfg(target_arch = "wasm32")]
unsafe impl<F> Send for NonSendFuture<F> {}

#[cfg(target_arch = "wasm32")]
fn wrap_future<F>(f: F) -> Pin<Box<dyn Future<Output = F::Output> + Send>>
where
    F: Future + 'static,
{
    Box::pin(NonSendFuture(f))
}

#[cfg(not(target_arch = "wasm32"))]
fn wrap_future<F>(f: F) -> Pin<Box<dyn Future<Output = F::Output> + Send>>
where
    F: Future + Send + 'static,
{
    Box::pin(f)
}

/// Runs the gateway for one request. Pass-through continues to `next` with
/// the [`AuthContext`] attached; anything else is answered here.
pub async fn gateway_middleware(
    State(gateway): State<Gateway>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let edge_request = EdgeRequest::from_parts(&parts);

    let outcome = wrap_future(async move { gateway.handle(&edge_request).await }).await;

    match outcome {
        Outcome::Respond(response) => response.into_response(),
        Outcome::PassThrough(context) => {
            let mut request = Request::from_parts(parts, body);
            request.extensions_mut().insert(context);
            next.run(request).await
        }
    }
}

/// Puts `app` behind the gateway.
///
/// Adds `GET /api/whoami`, which reports the caller's session and claims.
pub fn create_router(gateway: Gateway, app: Router) -> Router {
    app.route("/api/whoami", get(whoami))
        .layer(from_fn_with_state(gateway, gateway_middleware))
        .layer(PropagateHeaderLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetSensitiveRequestHeadersLayer::new([
            http::header::AUTHORIZATION,
            http::header::COOKIE,
        ]))
}

/// Handler for the whoami endpoint
///
/// # Arguments
///
/// * `context` - The authenticated caller
///
/// # Returns
///
/// Session metadata and ID token claims as JSON. Token values are never included.
pub async fn whoami(context: AuthContext) -> impl IntoResponse {
    debug!("calling whoami");
    Json(json!({
        "token_type": context.session.token_type,
        "scope": context.session.scope,
        "expires_in": context.session.expires_in,
        "claims": context.claims,
    }))
}
