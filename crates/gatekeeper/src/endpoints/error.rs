use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gatekeeper_service::auth::AuthError;
use gatekeeper_service::caching::CacheError;
use gatekeeper_service::error::ErrorKind;
use gatekeeper_service::ratelimit::RateLimitExceeded;
use sentry::integrations::anyhow::capture_anyhow;
use serde::{Deserialize, Serialize};

/// The detail shown to clients for every server error.
const OPAQUE_DETAIL: &str = "internal server error";

#[derive(Debug)]
pub struct ResponseError {
    status: StatusCode,
    kind: Option<ErrorKind>,
    retry_after: Option<u64>,
    err: anyhow::Error,
}

impl ResponseError {
    fn new(status: StatusCode, kind: ErrorKind, err: anyhow::Error) -> Self {
        Self {
            status,
            kind: Some(kind),
            retry_after: None,
            err,
        }
    }

    pub fn not_found(what: &'static str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: None,
            retry_after: None,
            err: anyhow::anyhow!("{what} not found"),
        }
    }
}

impl From<AuthError> for ResponseError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::NotAuthenticated | AuthError::InvalidSession(_) => StatusCode::UNAUTHORIZED,
            AuthError::ProfileMissing
            | AuthError::Deactivated
            | AuthError::InsufficientPermission { .. } => StatusCode::FORBIDDEN,
            AuthError::Configuration(_) | AuthError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.kind(), err.into())
    }
}

impl From<CacheError> for ResponseError {
    fn from(err: CacheError) -> Self {
        let status = match err {
            CacheError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            CacheError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.into())
    }
}

impl From<RateLimitExceeded> for ResponseError {
    fn from(err: RateLimitExceeded) -> Self {
        Self {
            retry_after: Some(err.retry_after_secs),
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, err.kind(), err.into())
        }
    }
}

impl From<anyhow::Error> for ResponseError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, err)
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let body = if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "Request failed: {:?}", self.err);
            capture_anyhow(&self.err);
            ApiErrorResponse {
                detail: Some(OPAQUE_DETAIL.to_owned()),
                kind: self.kind,
                ..Default::default()
            }
        } else {
            ApiErrorResponse {
                kind: self.kind,
                retry_after: self.retry_after,
                ..ApiErrorResponse::from(self.err)
            }
        };

        let mut response = Json(body).into_response();
        *response.status_mut() = self.status;
        if let Some(retry_after) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

/// An error response from an api.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct ApiErrorResponse {
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Seconds until the client may retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<String>>,
}

impl From<anyhow::Error> for ApiErrorResponse {
    fn from(err: anyhow::Error) -> Self {
        let mut chain = err.chain().map(|err| err.to_string());
        let detail = chain.next();
        let causes: Vec<_> = chain.collect();
        let causes = if causes.is_empty() {
            None
        } else {
            Some(causes)
        };

        ApiErrorResponse {
            detail,
            causes,
            ..Default::default()
        }
    }
}
