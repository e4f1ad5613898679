use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    error::AppError,
    state::SharedState,
    storage::{BlobListing, TableEntityView},
};

pub async fn list_blobs_handler(
    State(state): State<SharedState>,
    Path(container_name): Path<String>,
) -> Result<Json<BlobListing>, AppError> {
    Ok(Json(state.storage.list_blobs(&container_name).await?))
}

pub async fn get_entity_handler(
    State(state): State<SharedState>,
    Path((table_name, partition_key, row_key)): Path<(String, String, String)>,
) -> Result<Json<TableEntityView>, AppError> {
    let view = state
        .storage
        .get_entity(&table_name, &partition_key, &row_key)
        .await?;
    Ok(Json(view))
}
