//! Inventory stock handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        AdjustStockRequest, CreateInventoryItemRequest, InventoryItemResponse, ListInventoryQuery,
        UpdateInventoryItemRequest,
    },
    models::{CreateInventoryItem, ListInventoryFilter, UpdateInventoryItem},
    services::metrics::STOCK_ADJUSTMENTS_TOTAL,
    AppState,
};

/// Create a new inventory item.
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<InventoryItemResponse>), AppError> {
    payload.validate()?;

    let input = CreateInventoryItem {
        drug_name: payload.drug_name,
        category: payload.category,
        description: payload.description,
        manufacturer: payload.manufacturer,
        quantity: payload.quantity,
        unit: payload.unit,
        reorder_level: payload.reorder_level,
        unit_price: payload.unit_price,
        expiry_date: payload.expiry_date,
        batch_number: payload.batch_number,
    };

    tracing::info!(drug_name = %input.drug_name, quantity = input.quantity, "Creating inventory item");

    let item = state.db.create_item(&input).await?;

    Ok((StatusCode::CREATED, Json(InventoryItemResponse::from(item))))
}

/// Get an inventory item with its derived low-stock flag.
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItemResponse>, AppError> {
    let item = state
        .db
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Inventory item not found")))?;

    Ok(Json(InventoryItemResponse::from(item)))
}

/// List inventory with optional category and low-stock filters.
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListInventoryQuery>,
) -> Result<Json<Vec<InventoryItemResponse>>, AppError> {
    let filter = ListInventoryFilter {
        category: query.category,
        low_stock_only: query.low_stock_only,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let items = state.db.list_items(&filter).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// Update an inventory item's descriptive fields.
pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateInventoryItemRequest>,
) -> Result<Json<InventoryItemResponse>, AppError> {
    payload.validate()?;

    let input = UpdateInventoryItem {
        drug_name: payload.drug_name,
        category: payload.category,
        description: payload.description,
        manufacturer: payload.manufacturer,
        unit: payload.unit,
        reorder_level: payload.reorder_level,
        unit_price: payload.unit_price,
        expiry_date: payload.expiry_date,
        batch_number: payload.batch_number,
    };

    let item = state
        .db
        .update_item(item_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Inventory item not found")))?;

    Ok(Json(InventoryItemResponse::from(item)))
}

/// Adjust on-hand stock: positive delta restocks, negative corrects.
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<Json<InventoryItemResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        item_id = %item_id,
        delta = payload.delta,
        adjusted_by = %payload.adjusted_by,
        "Adjusting stock"
    );

    let item = state.db.adjust_stock(item_id, payload.delta).await?;

    let direction = if payload.delta > 0 { "restock" } else { "decrement" };
    STOCK_ADJUSTMENTS_TOTAL.with_label_values(&[direction]).inc();

    Ok(Json(InventoryItemResponse::from(item)))
}
