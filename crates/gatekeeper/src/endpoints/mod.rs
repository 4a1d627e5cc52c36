use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use gatekeeper_service::metric;
use gatekeeper_service::services::Governance;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;

mod admin;
mod content;
mod error;
mod governance;
mod metrics;


pub use error::ResponseError;
use governance::{RateLimitScope, rate_limit};
use metrics::MetricsLayer;

pub async fn healthcheck() -> &'static str {
    metric!(counter("healthcheck") += 1);
    "ok"
}

pub fn create_app(governance: Arc<Governance>) -> Router {
    // The layers here go "top to bottom" according to the reading order here.
    let layer = ServiceBuilder::new()
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(MetricsLayer);

    let public = Router::new()
        .route("/content/:collection", get(content::get_collection))
        .route_layer(middleware::from_fn_with_state(
            RateLimitScope::new(Arc::clone(&governance), "public"),
            rate_limit,
        ));

    let admin = Router::new()
        .route("/admin/session", get(admin::session))
        .route("/admin/content/:collection", get(admin::get_collection))
        .route(
            "/admin/content/:collection/invalidate",
            post(admin::invalidate_collection),
        )
        .route("/admin/cache/invalidate", post(admin::invalidate_cache))
        .route_layer(middleware::from_fn_with_state(
            RateLimitScope::new(Arc::clone(&governance), "admin"),
            rate_limit,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(governance)
        .layer(layer)
        // the healthcheck is last, as it will bypass all the middlewares
        .route("/healthcheck", get(healthcheck))
}
