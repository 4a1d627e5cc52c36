//! Rate limiting and session extraction for route groups.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gatekeeper_service::auth::Principal;
use gatekeeper_service::metric;
use gatekeeper_service::ratelimit::RateLimitOutcome;
use gatekeeper_service::services::Governance;

use super::ResponseError;

static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// The state of the rate limiting middleware of one route group.
#[derive(Clone, Debug)]
pub struct RateLimitScope {
    governance: Arc<Governance>,
    scope: &'static str,
}

impl RateLimitScope {
    pub fn new(governance: Arc<Governance>, scope: &'static str) -> Self {
        Self { governance, scope }
    }
}

/// Counts the request against its client's limit and rejects it when the limit is exceeded.
///
/// This runs before anything else touches the request.
pub async fn rate_limit(
    State(limiter): State<RateLimitScope>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = limiter
        .governance
        .check_rate_limit(limiter.scope, request.headers());

    let mut response = match outcome.into_result() {
        Ok(_) => next.run(request).await,
        Err(err) => {
            metric!(counter("ratelimit.rejected") += 1, "scope" => limiter.scope);
            ResponseError::from(err).into_response()
        }
    };

    add_rate_limit_headers(response.headers_mut(), &outcome);
    response
}

fn add_rate_limit_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers.insert(RATELIMIT_LIMIT.clone(), HeaderValue::from(outcome.limit));
    headers.insert(
        RATELIMIT_REMAINING.clone(),
        HeaderValue::from(outcome.remaining),
    );
    headers.insert(
        RATELIMIT_RESET.clone(),
        HeaderValue::from(outcome.reset_after_secs()),
    );
}

/// The verified principal of a request.
///
/// Rejects the request if its session does not check out.
#[derive(Debug)]
pub struct Authenticated(pub Principal);

#[axum::async_trait]
impl FromRequestParts<Arc<Governance>> for Authenticated {
    type Rejection = ResponseError;

    async fn from_request_parts(
        parts: &mut Parts,
        governance: &Arc<Governance>,
    ) -> Result<Self, Self::Rejection> {
        let principal = governance.sessions.verify(&parts.headers).await?;
        Ok(Self(principal))
    }
}
