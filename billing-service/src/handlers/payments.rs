//! Payment reconciliation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{PaymentListResponse, PaymentResponse, RecordPaymentRequest},
    models::CreatePayment,
    services::metrics::PAYMENTS_TOTAL,
    AppState,
};

/// Record a payment against an invoice.
pub async fn record_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    payload.validate()?;

    let input = CreatePayment {
        invoice_id,
        amount: payload.amount,
        payment_method: payload.payment_method,
        payment_date: payload
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        reference_number: payload.reference_number,
        recorded_by: payload.recorded_by,
        notes: payload.notes,
    };

    tracing::info!(
        invoice_id = %invoice_id,
        amount = %input.amount,
        payment_method = %input.payment_method,
        "Recording payment"
    );

    let payment = state.db.record_payment(&input).await?;

    PAYMENTS_TOTAL
        .with_label_values(&[&payment.payment_method])
        .inc();

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// List payments for an invoice with the reconciled balance.
pub async fn list_payments(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<PaymentListResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let payments = state.db.list_payments(invoice_id).await?;
    let amount_paid: Decimal = payments.iter().map(|p| p.amount).sum();
    let balance_due = invoice.balance_due(amount_paid);

    Ok(Json(PaymentListResponse {
        payments: payments.into_iter().map(Into::into).collect(),
        amount_paid,
        balance_due,
    }))
}
