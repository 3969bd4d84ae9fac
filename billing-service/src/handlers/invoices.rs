//! Invoice ledger handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::{retry_on_conflict, RetryConfig};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CreateInvoiceRequest, InvoiceDetailResponse, InvoiceResponse, ListInvoicesQuery,
    },
    models::{CreateInvoice, CreateInvoiceItem, InvoiceStatus, ListInvoicesFilter},
    services::metrics::INVOICES_TOTAL,
    AppState,
};

/// Create an invoice with its line items.
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    let input = CreateInvoice {
        patient_id: payload.patient_id,
        created_by: payload.created_by,
        due_in_days: payload.due_in_days,
        tax_amount: payload.tax_amount.unwrap_or(Decimal::ZERO),
        discount_amount: payload.discount_amount.unwrap_or(Decimal::ZERO),
        notes: payload.notes,
        items: payload
            .items
            .into_iter()
            .map(|item| CreateInvoiceItem {
                billing_item_id: item.billing_item_id,
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    };

    tracing::info!(
        patient_id = %input.patient_id,
        item_count = input.items.len(),
        "Creating invoice"
    );

    let invoice = retry_on_conflict(&RetryConfig::default(), "create_invoice", || {
        state.db.create_invoice(&input)
    })
    .await?;

    INVOICES_TOTAL
        .with_label_values(&[invoice.status.as_str()])
        .inc();

    let today = Utc::now().date_naive();
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::from_parts(invoice, Decimal::ZERO, today)),
    ))
}

/// List invoices with optional status and patient filters.
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("all") => None,
        Some(s) => {
            let parsed = InvoiceStatus::from_string(s);
            if parsed.as_str() != s {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Unknown invoice status filter: {}",
                    s
                )));
            }
            Some(parsed)
        }
    };

    let filter = ListInvoicesFilter {
        status,
        patient_id: query.patient_id,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let invoices = state.db.list_invoices(&filter).await?;
    let today = Utc::now().date_naive();

    let mut responses = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let amount_paid = state.db.amount_paid(invoice.invoice_id).await?;
        responses.push(InvoiceResponse::from_parts(invoice, amount_paid, today));
    }

    Ok(Json(responses))
}

/// Get an invoice with its items and payments.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let items = state.db.get_invoice_items(invoice_id).await?;
    let payments = state.db.list_payments(invoice_id).await?;
    let amount_paid: Decimal = payments.iter().map(|p| p.amount).sum();
    let today = Utc::now().date_naive();

    Ok(Json(InvoiceDetailResponse {
        invoice: InvoiceResponse::from_parts(invoice, amount_paid, today),
        items: items.into_iter().map(Into::into).collect(),
        payments: payments.into_iter().map(Into::into).collect(),
    }))
}

/// Cancel an invoice (terminal).
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    tracing::info!(invoice_id = %invoice_id, "Cancelling invoice");

    let invoice = state
        .db
        .cancel_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    INVOICES_TOTAL.with_label_values(&["cancelled"]).inc();

    let amount_paid = state.db.amount_paid(invoice_id).await?;
    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::from_parts(invoice, amount_paid, today)))
}

/// Re-sum an invoice's totals from its stored line items.
pub async fn recompute_totals(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .recompute_totals(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let amount_paid = state.db.amount_paid(invoice_id).await?;
    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::from_parts(invoice, amount_paid, today)))
}
