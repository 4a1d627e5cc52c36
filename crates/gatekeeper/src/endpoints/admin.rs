//! Endpoints of the admin CMS.
//!
//! Every handler takes [`Authenticated`] first, so the session is verified before the role gate
//! and before any content is touched.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use gatekeeper_service::auth::{Principal, Role, require_role};
use gatekeeper_service::content::CollectionName;
use gatekeeper_service::services::Governance;
use serde::Serialize;
use serde_json::Value;

use super::ResponseError;
use super::governance::Authenticated;

#[derive(Debug, Serialize)]
pub struct Invalidated {
    /// The invalidated collection, or `None` if the entire cache was dropped.
    collection: Option<String>,
}

/// Returns the principal of the current session.
pub async fn session(
    Authenticated(principal): Authenticated,
) -> Result<Json<Principal>, ResponseError> {
    require_role(principal.role, Role::Member)?;
    Ok(Json(principal))
}

/// Reads a collection straight from the store, so editors always see the latest state.
pub async fn get_collection(
    State(governance): State<Arc<Governance>>,
    Authenticated(principal): Authenticated,
    Path(collection): Path<String>,
) -> Result<Json<Value>, ResponseError> {
    require_role(principal.role, Role::Editor)?;
    let collection =
        CollectionName::new(&collection).ok_or_else(|| ResponseError::not_found("collection"))?;

    match governance.fresh_collection(&collection).await? {
        Some(documents) => Ok(Json(documents)),
        None => Err(ResponseError::not_found("collection")),
    }
}

/// Drops the cached copy of a collection after it was edited.
pub async fn invalidate_collection(
    State(governance): State<Arc<Governance>>,
    Authenticated(principal): Authenticated,
    Path(collection): Path<String>,
) -> Result<Json<Invalidated>, ResponseError> {
    require_role(principal.role, Role::Editor)?;
    let collection =
        CollectionName::new(&collection).ok_or_else(|| ResponseError::not_found("collection"))?;

    governance.invalidate_collection(&collection);
    tracing::info!(uid = %principal.uid, %collection, "Invalidated cached collection");

    Ok(Json(Invalidated {
        collection: Some(collection.to_string()),
    }))
}

/// Drops all cached content.
pub async fn invalidate_cache(
    State(governance): State<Arc<Governance>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Invalidated>, ResponseError> {
    require_role(principal.role, Role::Admin)?;

    governance.invalidate_all_content();
    tracing::info!(uid = %principal.uid, "Invalidated all cached content");

    Ok(Json(Invalidated { collection: None }))
}
