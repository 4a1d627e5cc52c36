use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use gatekeeper_service::content::CollectionName;
use gatekeeper_service::services::Governance;
use serde_json::Value;

use super::ResponseError;

/// Serves a collection from the content cache.
pub async fn get_collection(
    State(governance): State<Arc<Governance>>,
    Path(collection): Path<String>,
) -> Result<Json<Arc<Value>>, ResponseError> {
    let collection =
        CollectionName::new(&collection).ok_or_else(|| ResponseError::not_found("collection"))?;

    match governance.cached_collection(&collection).await? {
        Some(documents) => Ok(Json(documents)),
        None => Err(ResponseError::not_found("collection")),
    }
}
