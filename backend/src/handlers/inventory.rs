//! HTTP handlers for the item registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Item;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::{CreateItemInput, InventoryService, TransferInput};
use crate::AppState;

/// Register an item with its opening stock
pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let service = InventoryService::new(state.db);
    let item = service.create_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// List all items
pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    let service = InventoryService::new(state.db);
    let items = service.list_items().await?;
    Ok(Json(items))
}

/// Get an item with its shop and cold stock
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let service = InventoryService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Move stock between the shop and cold buckets
pub async fn transfer_stock(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<TransferInput>,
) -> AppResult<Json<Item>> {
    let service = InventoryService::new(state.db);
    let item = service.transfer(item_id, input).await?;
    Ok(Json(item))
}
