//! Domain models for pharmacy-service.

mod dispensed_record;
mod inventory_item;

pub use dispensed_record::{CreateDispense, DispensedRecord, ListDispensedFilter};
pub use inventory_item::{
    CreateInventoryItem, InventoryItem, ListInventoryFilter, UpdateInventoryItem,
};
