//! Request and response types for the pharmacy HTTP API.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{DispensedRecord, InventoryItem};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must be non-negative"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1))]
    pub drug_name: String,
    #[validate(length(min = 1))]
    pub category: String,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(min = 1))]
    pub unit: String,
    #[validate(range(min = 0))]
    pub reorder_level: i32,
    #[validate(custom(function = non_negative))]
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInventoryItemRequest {
    pub drug_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    #[validate(custom(function = non_negative))]
    pub unit_price: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListInventoryQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

fn default_page_size() -> i32 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub delta: i32,
    #[validate(length(min = 1))]
    pub adjusted_by: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DispenseRequest {
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1))]
    pub dispensed_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDispensedQuery {
    pub inventory_item_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

#[derive(Debug, Serialize)]
pub struct InventoryItemResponse {
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
    pub low_stock: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<InventoryItem> for InventoryItemResponse {
    fn from(item: InventoryItem) -> Self {
        let low_stock = item.is_low_stock();
        Self {
            item_id: item.item_id,
            drug_name: item.drug_name,
            category: item.category,
            description: item.description,
            manufacturer: item.manufacturer,
            quantity: item.quantity,
            unit: item.unit,
            reorder_level: item.reorder_level,
            unit_price: item.unit_price,
            expiry_date: item.expiry_date,
            batch_number: item.batch_number,
            low_stock,
            created_utc: item.created_utc,
            updated_utc: item.updated_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DispensedRecordResponse {
    pub record_id: Uuid,
    pub inventory_item_id: Uuid,
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    pub quantity_dispensed: i32,
    pub dispensed_by: String,
    pub dispensed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl From<DispensedRecord> for DispensedRecordResponse {
    fn from(record: DispensedRecord) -> Self {
        Self {
            record_id: record.record_id,
            inventory_item_id: record.inventory_item_id,
            patient_id: record.patient_id,
            medical_record_id: record.medical_record_id,
            quantity_dispensed: record.quantity_dispensed,
            dispensed_by: record.dispensed_by,
            dispensed_at: record.dispensed_at,
            notes: record.notes,
        }
    }
}
