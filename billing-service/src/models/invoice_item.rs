//! Invoice line item model for billing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::money;
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice. Immutable once the invoice leaves draft.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub billing_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a line item.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub billing_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl CreateInvoiceItem {
    /// Line total: quantity x unit price, at currency precision.
    pub fn total_price(&self) -> Decimal {
        money::line_total(self.quantity, self.unit_price)
    }
}

/// Reject malformed line items before anything touches the store.
pub fn validate_items(items: &[CreateInvoiceItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "An invoice requires at least one line item"
        )));
    }
    for item in items {
        if item.description.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item description must not be empty"
            )));
        }
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item quantity must be positive, got {}",
                item.quantity
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Line item unit price must be non-negative, got {}",
                item.unit_price
            )));
        }
    }
    Ok(())
}

/// Subtotal over the line totals of already-validated items.
pub fn subtotal_of(items: &[CreateInvoiceItem]) -> Decimal {
    items.iter().map(CreateInvoiceItem::total_price).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(quantity: i32, unit_price: &str) -> CreateInvoiceItem {
        CreateInvoiceItem {
            billing_item_id: None,
            description: "Consultation".to_string(),
            quantity,
            unit_price: dec(unit_price),
        }
    }

    #[test]
    fn empty_items_rejected() {
        assert!(validate_items(&[]).is_err());
    }

    #[test]
    fn zero_quantity_rejected() {
        assert!(validate_items(&[item(0, "10.00")]).is_err());
    }

    #[test]
    fn negative_unit_price_rejected() {
        assert!(validate_items(&[item(1, "-0.01")]).is_err());
    }

    #[test]
    fn valid_items_pass() {
        assert!(validate_items(&[item(1, "0.00"), item(3, "12.50")]).is_ok());
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let items = vec![item(2, "25.00"), item(1, "50.00")];
        assert_eq!(subtotal_of(&items), dec("100.00"));
    }

    #[test]
    fn subtotal_is_stable_on_resumming() {
        let items = vec![item(3, "33.33"), item(7, "0.07")];
        let first = subtotal_of(&items);
        let second = subtotal_of(&items);
        assert_eq!(first, second);
    }
}
