//! Cloudflare Workers entry point.
//!
//! Every fetch event runs through the gateway. Requests that pass are
//! forwarded unchanged to the service bound as `PROXY_TARGET`.

use crate::config::{GatewayConfig, PROXY_TARGET_BINDING};
use crate::error::GatewayError;
use crate::gateway::{Gateway, SharedGateway};
use crate::response::{page, ResponseOptions};
use crate::router::create_router;
use crate::template::{DefaultTemplate, TemplateRenderer};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;
use tower::ServiceExt;
use tracing::error;
use tracing_subscriber::fmt::format::Pretty;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_web::{performance_layer, MakeConsoleWriter};
use worker::*;

// Built on the first fetch event and kept for the life of the isolate, along
// with its HTTP client and signing key cache.
static GATEWAY: SharedGateway = SharedGateway::new();

#[event(start)]
fn start() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_ansi(false) // Only partially supported across JavaScript runtimes
        .with_timer(UtcTime::rfc_3339()) // std::time is not available in browsers
        .with_writer(MakeConsoleWriter);
    let perf_layer = performance_layer().with_details_from_fields(Pretty::default());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(perf_layer)
        .init();
}

#[event(fetch)]
async fn fetch(req: HttpRequest, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    Ok(route(req, env).await)
}

async fn route(req: HttpRequest, env: Env) -> Response {
    let gateway = match build_gateway(&env) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(error = %err, "gateway is misconfigured");
            return page(
                err.status(),
                ResponseOptions::default(),
                DefaultTemplate.error_page(err.description(), Some(err.code())),
            )
            .into_response();
        }
    };

    let router = create_router(gateway, Router::new().fallback(proxy).with_state(env));

    match router.oneshot(req.map(Body::new)).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    }
}

fn build_gateway(env: &Env) -> std::result::Result<Gateway, GatewayError> {
    GATEWAY.get_or_try_build(|| {
        let config = GatewayConfig::from_env(env)?;
        Ok(Gateway::builder(config).build()?)
    })
}

#[worker::send]
async fn proxy(State(env): State<Env>, request: Request) -> Response {
    match forward(&env, request).await {
        Ok(response) => response.map(Body::new),
        Err(err) => {
            error!(error = %err, "could not reach proxy target");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn forward(env: &Env, request: Request) -> Result<HttpResponse> {
    let worker_request = worker::Request::try_from(request)?;
    let http_request = HttpRequest::try_from(worker_request)?;

    env.service(PROXY_TARGET_BINDING)?
        .fetch_request(http_request)
        .await
}
