//! Dispensing transaction handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{DispensedRecordResponse, DispenseRequest, ListDispensedQuery},
    models::{CreateDispense, ListDispensedFilter},
    services::metrics::DISPENSE_TOTAL,
    AppState,
};

/// Dispense stock to a patient.
///
/// The decrement and the record commit together or not at all; a shortfall
/// at commit time surfaces as a 409 naming the available quantity.
pub async fn dispense(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<DispenseRequest>,
) -> Result<(StatusCode, Json<DispensedRecordResponse>), AppError> {
    payload.validate()?;

    let input = CreateDispense {
        inventory_item_id: item_id,
        patient_id: payload.patient_id,
        medical_record_id: payload.medical_record_id,
        quantity: payload.quantity,
        dispensed_by: payload.dispensed_by,
        notes: payload.notes,
    };

    tracing::info!(
        item_id = %item_id,
        patient_id = %input.patient_id,
        quantity = input.quantity,
        "Dispensing stock"
    );

    let record = match state.db.dispense(&input).await {
        Ok(record) => record,
        Err(err) => {
            if matches!(err, AppError::InsufficientStock(_)) {
                DISPENSE_TOTAL
                    .with_label_values(&["insufficient_stock"])
                    .inc();
            }
            return Err(err);
        }
    };

    DISPENSE_TOTAL.with_label_values(&["committed"]).inc();

    Ok((
        StatusCode::CREATED,
        Json(DispensedRecordResponse::from(record)),
    ))
}

/// Dispensing history, filterable by item and patient.
pub async fn list_dispensed(
    State(state): State<AppState>,
    Query(query): Query<ListDispensedQuery>,
) -> Result<Json<Vec<DispensedRecordResponse>>, AppError> {
    let filter = ListDispensedFilter {
        inventory_item_id: query.inventory_item_id,
        patient_id: query.patient_id,
        page_size: query.page_size,
    };

    let records = state.db.list_dispensed(&filter).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
