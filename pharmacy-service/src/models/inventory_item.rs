//! Inventory item model for pharmacy-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Drug batch held in pharmacy stock.
///
/// `quantity` is mutated only through dispensing and explicit stock
/// adjustments; it never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub item_id: Uuid,
    pub drug_name: String,
    pub category: String,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub quantity: i32,
    pub unit: String,
    pub reorder_level: i32,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl InventoryItem {
    /// Low stock is a derived view, computed at read time: at or below the
    /// reorder level counts as low.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    /// Whether `qty` units could be dispensed from the current on-hand
    /// quantity. Advisory only: the decrement re-checks at commit.
    pub fn can_dispense(&self, qty: i32) -> bool {
        qty > 0 && qty <= self.quantity
    }
}

/// Filter parameters for listing inventory.
#[derive(Debug, Clone, Default)]
pub struct ListInventoryFilter {
    pub category: Option<String>,
    pub low_stock_only: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating an inventory item.
#[derive(Debug, Clone)]
pub struct CreateInventoryItem {
    pub drug_name: String,
    pub category: String,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub quantity: i32,
    pub unit: String,
    pub reorder_level: i32,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
}

/// Input for updating an inventory item's descriptive fields.
///
/// The on-hand quantity is deliberately absent: it changes only through
/// dispensing and stock adjustments.
#[derive(Debug, Clone, Default)]
pub struct UpdateInventoryItem {
    pub drug_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub unit: Option<String>,
    pub reorder_level: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
}
