//! Request and response types for the billing HTTP API.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{Invoice, InvoiceItem, InvoiceStatus, Payment};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must be non-negative"));
    }
    Ok(())
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must be positive"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    pub billing_item_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom(function = non_negative))]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub patient_id: Uuid,
    #[validate(range(min = 1, max = 365))]
    pub due_in_days: i64,
    #[validate(custom(function = non_negative))]
    pub tax_amount: Option<Decimal>,
    #[validate(custom(function = non_negative))]
    pub discount_amount: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub patient_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

fn default_page_size() -> i32 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(custom(function = positive))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub payment_method: String,
    pub payment_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    #[validate(length(min = 1))]
    pub recorded_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub created_by: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl InvoiceResponse {
    /// Build the read-model with the status derived from payments and the
    /// clock, so renderers always see reconciled totals.
    pub fn from_parts(invoice: Invoice, amount_paid: Decimal, today: NaiveDate) -> Self {
        let status = invoice.derive_status(amount_paid, true, today);
        let balance_due = invoice.balance_due(amount_paid);
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number,
            patient_id: invoice.patient_id,
            created_by: invoice.created_by,
            status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            subtotal: invoice.subtotal,
            tax_amount: invoice.tax_amount,
            discount_amount: invoice.discount_amount,
            total_amount: invoice.total_amount,
            amount_paid,
            balance_due,
            notes: invoice.notes,
            created_utc: invoice.created_utc,
            updated_utc: invoice.updated_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    pub item_id: Uuid,
    pub billing_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<InvoiceItem> for InvoiceItemResponse {
    fn from(item: InvoiceItem) -> Self {
        Self {
            item_id: item.item_id,
            billing_item_id: item.billing_item_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub recorded_by: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            invoice_id: payment.invoice_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            payment_date: payment.payment_date,
            reference_number: payment.reference_number,
            recorded_by: payment.recorded_by,
            notes: payment.notes,
            created_utc: payment.created_utc,
        }
    }
}

/// Full invoice read-model: invoice, items, and payments in audit order.
#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    pub invoice: InvoiceResponse,
    pub items: Vec<InvoiceItemResponse>,
    pub payments: Vec<PaymentResponse>,
}

/// Payment listing with the reconciled running balance.
#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
}
