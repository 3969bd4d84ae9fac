//! Dispensing record model for pharmacy-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of a quantity of a drug given to a patient.
///
/// Created only together with the matching stock decrement; the two commit
/// in one transaction or not at all.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DispensedRecord {
    pub record_id: Uuid,
    pub inventory_item_id: Uuid,
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    pub quantity_dispensed: i32,
    pub dispensed_by: String,
    pub dispensed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Input for a dispensing transaction.
#[derive(Debug, Clone)]
pub struct CreateDispense {
    pub inventory_item_id: Uuid,
    pub patient_id: Uuid,
    pub medical_record_id: Option<Uuid>,
    pub quantity: i32,
    pub dispensed_by: String,
    pub notes: Option<String>,
}

/// Filter parameters for listing dispensing history.
#[derive(Debug, Clone, Default)]
pub struct ListDispensedFilter {
    pub inventory_item_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub page_size: i32,
}
