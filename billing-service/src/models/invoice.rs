//! Invoice model for billing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::money;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::CreateInvoiceItem;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "pending" => InvoiceStatus::Pending,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Invoice record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub created_by: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    /// Derive the status from payments and the clock.
    ///
    /// `cancelled` is sticky. Exact payment of the total counts as paid;
    /// `overdue` applies only while unpaid and past due.
    pub fn derive_status(
        &self,
        amount_paid: Decimal,
        has_items: bool,
        today: NaiveDate,
    ) -> InvoiceStatus {
        if InvoiceStatus::from_string(&self.status) == InvoiceStatus::Cancelled {
            return InvoiceStatus::Cancelled;
        }
        if amount_paid >= self.total_amount {
            return InvoiceStatus::Paid;
        }
        if today > self.due_date {
            return InvoiceStatus::Overdue;
        }
        if has_items {
            InvoiceStatus::Pending
        } else {
            InvoiceStatus::Draft
        }
    }

    /// Status for display when only the stored status and the clock are at
    /// hand. `pending`/`overdue` flip on the due date; paid, cancelled and
    /// draft pass through unchanged.
    pub fn display_status(&self, today: NaiveDate) -> InvoiceStatus {
        match InvoiceStatus::from_string(&self.status) {
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {
                if today > self.due_date {
                    InvoiceStatus::Overdue
                } else {
                    InvoiceStatus::Pending
                }
            }
            other => other,
        }
    }

    /// Unpaid remainder, never negative.
    pub fn balance_due(&self, amount_paid: Decimal) -> Decimal {
        money::balance_due(self.total_amount, amount_paid)
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub patient_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub patient_id: Uuid,
    pub created_by: String,
    pub due_in_days: i64,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub notes: Option<String>,
    pub items: Vec<CreateInvoiceItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn invoice(status: &str, total: &str, due: NaiveDate) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            invoice_number: "INV-00001".to_string(),
            patient_id: Uuid::new_v4(),
            created_by: "staff-1".to_string(),
            status: status.to_string(),
            issue_date: due - chrono::Duration::days(30),
            due_date: due,
            subtotal: dec(total),
            tax_amount: dec("0.00"),
            discount_amount: dec("0.00"),
            total_amount: dec(total),
            notes: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn exact_payment_is_paid_not_pending() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        let status = inv.derive_status(dec("105.00"), true, day("2026-02-01"));
        assert_eq!(status, InvoiceStatus::Paid);
    }

    #[test]
    fn paid_wins_over_overdue() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        let status = inv.derive_status(dec("105.00"), true, day("2026-04-01"));
        assert_eq!(status, InvoiceStatus::Paid);
    }

    #[test]
    fn unpaid_past_due_is_overdue() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        let status = inv.derive_status(dec("50.00"), true, day("2026-03-02"));
        assert_eq!(status, InvoiceStatus::Overdue);
    }

    #[test]
    fn unpaid_before_due_is_pending() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        let status = inv.derive_status(dec("50.00"), true, day("2026-03-01"));
        assert_eq!(status, InvoiceStatus::Pending);
    }

    #[test]
    fn no_items_is_draft() {
        let inv = invoice("draft", "0.00", day("2026-03-01"));
        // total 0 with 0 paid counts as paid; use a nonzero total to see draft
        let inv = Invoice {
            total_amount: dec("10.00"),
            ..inv
        };
        let status = inv.derive_status(dec("0.00"), false, day("2026-02-01"));
        assert_eq!(status, InvoiceStatus::Draft);
    }

    #[test]
    fn cancelled_is_sticky() {
        let inv = invoice("cancelled", "105.00", day("2026-03-01"));
        // neither full payment nor the clock moves a cancelled invoice
        assert_eq!(
            inv.derive_status(dec("105.00"), true, day("2026-02-01")),
            InvoiceStatus::Cancelled
        );
        assert_eq!(
            inv.derive_status(dec("0.00"), true, day("2026-04-01")),
            InvoiceStatus::Cancelled
        );
    }

    #[test]
    fn derive_status_is_idempotent() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        let first = inv.derive_status(dec("50.00"), true, day("2026-03-10"));
        let second = inv.derive_status(dec("50.00"), true, day("2026-03-10"));
        assert_eq!(first, second);
    }

    #[test]
    fn overdue_is_a_view_not_a_transition() {
        // stored overdue flips back to pending when the due date moves out
        let inv = invoice("overdue", "105.00", day("2026-03-01"));
        assert_eq!(inv.display_status(day("2026-02-15")), InvoiceStatus::Pending);
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        assert_eq!(inv.display_status(day("2026-03-02")), InvoiceStatus::Overdue);
    }

    #[test]
    fn display_status_passes_terminal_states_through() {
        let inv = invoice("cancelled", "105.00", day("2026-03-01"));
        assert_eq!(inv.display_status(day("2026-04-01")), InvoiceStatus::Cancelled);
        let inv = invoice("paid", "105.00", day("2026-03-01"));
        assert_eq!(inv.display_status(day("2026-04-01")), InvoiceStatus::Paid);
    }

    #[test]
    fn balance_due_scenarios() {
        let inv = invoice("pending", "105.00", day("2026-03-01"));
        assert_eq!(inv.balance_due(dec("105.00")), dec("0.00"));
        assert_eq!(inv.balance_due(dec("50.00")), dec("55.00"));
    }
}
