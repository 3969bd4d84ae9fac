//! Database service for pharmacy-service.

use crate::models::{
    CreateDispense, CreateInventoryItem, DispensedRecord, InventoryItem, ListDispensedFilter,
    ListInventoryFilter, UpdateInventoryItem,
};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "pharmacy-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Inventory Operations
    // -------------------------------------------------------------------------

    /// Create a new inventory item.
    #[instrument(skip(self, input), fields(drug_name = %input.drug_name))]
    pub async fn create_item(&self, input: &CreateInventoryItem) -> Result<InventoryItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_item"])
            .start_timer();

        if input.quantity < 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Initial quantity must be non-negative, got {}",
                input.quantity
            )));
        }
        if input.reorder_level < 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Reorder level must be non-negative, got {}",
                input.reorder_level
            )));
        }

        let item_id = Uuid::new_v4();
        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO pharmacy_inventory (
                item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
            "#,
        )
        .bind(item_id)
        .bind(&input.drug_name)
        .bind(&input.category)
        .bind(&input.description)
        .bind(&input.manufacturer)
        .bind(input.quantity)
        .bind(&input.unit)
        .bind(input.reorder_level)
        .bind(input.unit_price)
        .bind(input.expiry_date)
        .bind(&input.batch_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create inventory item: {}", e))
        })?;

        timer.observe_duration();

        info!(item_id = %item.item_id, drug_name = %item.drug_name, "Inventory item created");

        Ok(item)
    }

    /// Get an inventory item by ID.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<Option<InventoryItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_item"])
            .start_timer();

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
            FROM pharmacy_inventory
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get inventory item: {}", e))
        })?;

        timer.observe_duration();

        Ok(item)
    }

    /// List inventory items with optional category and low-stock filters.
    #[instrument(skip(self, filter))]
    pub async fn list_items(
        &self,
        filter: &ListInventoryFilter,
    ) -> Result<Vec<InventoryItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let items = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, InventoryItem>(
                r#"
                SELECT item_id, drug_name, category, description, manufacturer, quantity, unit,
                    reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
                FROM pharmacy_inventory
                WHERE ($1::varchar IS NULL OR category = $1)
                  AND ($2::bool = FALSE OR quantity <= reorder_level)
                  AND item_id > $3
                ORDER BY item_id
                LIMIT $4
                "#,
            )
            .bind(&filter.category)
            .bind(filter.low_stock_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, InventoryItem>(
                r#"
                SELECT item_id, drug_name, category, description, manufacturer, quantity, unit,
                    reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
                FROM pharmacy_inventory
                WHERE ($1::varchar IS NULL OR category = $1)
                  AND ($2::bool = FALSE OR quantity <= reorder_level)
                ORDER BY item_id
                LIMIT $3
                "#,
            )
            .bind(&filter.category)
            .bind(filter.low_stock_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list inventory: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Update an inventory item's descriptive fields.
    ///
    /// The on-hand quantity is untouchable here; it moves only through
    /// `adjust_stock` and `dispense`.
    #[instrument(skip(self, input), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: &UpdateInventoryItem,
    ) -> Result<Option<InventoryItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_item"])
            .start_timer();

        if let Some(level) = input.reorder_level {
            if level < 0 {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Reorder level must be non-negative, got {}",
                    level
                )));
            }
        }

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE pharmacy_inventory
            SET drug_name = COALESCE($2, drug_name),
                category = COALESCE($3, category),
                description = COALESCE($4, description),
                manufacturer = COALESCE($5, manufacturer),
                unit = COALESCE($6, unit),
                reorder_level = COALESCE($7, reorder_level),
                unit_price = COALESCE($8, unit_price),
                expiry_date = COALESCE($9, expiry_date),
                batch_number = COALESCE($10, batch_number),
                updated_utc = NOW()
            WHERE item_id = $1
            RETURNING item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
            "#,
        )
        .bind(item_id)
        .bind(&input.drug_name)
        .bind(&input.category)
        .bind(&input.description)
        .bind(&input.manufacturer)
        .bind(&input.unit)
        .bind(input.reorder_level)
        .bind(input.unit_price)
        .bind(input.expiry_date)
        .bind(&input.batch_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update inventory item: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref i) = item {
            info!(item_id = %i.item_id, "Inventory item updated");
        }

        Ok(item)
    }

    /// Adjust on-hand stock by a delta (positive restock, negative correction).
    ///
    /// The update is conditional on the result staying non-negative, so a
    /// concurrent decrement can never drive the quantity below zero.
    #[instrument(skip(self), fields(item_id = %item_id, delta = delta))]
    pub async fn adjust_stock(
        &self,
        item_id: Uuid,
        delta: i32,
    ) -> Result<InventoryItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_stock"])
            .start_timer();

        if delta == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Stock adjustment delta must be non-zero"
            )));
        }

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE pharmacy_inventory
            SET quantity = quantity + $2,
                updated_utc = NOW()
            WHERE item_id = $1 AND quantity + $2 >= 0
            RETURNING item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
            "#,
        )
        .bind(item_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to adjust stock: {}", e)))?;

        timer.observe_duration();

        match item {
            Some(item) => {
                info!(
                    item_id = %item.item_id,
                    delta = delta,
                    quantity = item.quantity,
                    "Stock adjusted"
                );
                Ok(item)
            }
            None => {
                // Zero rows: the item is missing or the delta would go negative.
                let current = self
                    .get_item(item_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Inventory item not found")))?;
                Err(AppError::NegativeStock(anyhow::anyhow!(
                    "Adjustment of {} would drive stock below zero, only {} {} on hand",
                    delta,
                    current.quantity,
                    current.unit
                )))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Dispensing Operations
    // -------------------------------------------------------------------------

    /// Dispense stock to a patient: decrement and record in one transaction.
    ///
    /// Availability is re-checked at commit with a conditional update
    /// (`quantity >= qty` plus an affected-row check), so two racing
    /// dispenses cannot jointly exceed the on-hand quantity. If the
    /// decrement misses, nothing is written.
    #[instrument(skip(self, input), fields(item_id = %input.inventory_item_id, patient_id = %input.patient_id))]
    pub async fn dispense(&self, input: &CreateDispense) -> Result<DispensedRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dispense"])
            .start_timer();

        if input.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Dispense quantity must be positive, got {}",
                input.quantity
            )));
        }

        // Advisory availability check for a specific early rejection. The
        // decrement below re-checks at commit; this read alone cannot close
        // the race between two dispensers.
        let current = self
            .get_item(input.inventory_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Inventory item not found")))?;
        if !current.can_dispense(input.quantity) {
            return Err(AppError::InsufficientStock(anyhow::anyhow!(
                "Cannot dispense {} {} of {}: only {} available",
                input.quantity,
                current.unit,
                current.drug_name,
                current.quantity
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let decremented = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE pharmacy_inventory
            SET quantity = quantity - $2,
                updated_utc = NOW()
            WHERE item_id = $1 AND quantity >= $2
            RETURNING item_id, drug_name, category, description, manufacturer, quantity, unit,
                reorder_level, unit_price, expiry_date, batch_number, created_utc, updated_utc
            "#,
        )
        .bind(input.inventory_item_id)
        .bind(input.quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to decrement stock: {}", e)))?;

        let item = match decremented {
            Some(item) => item,
            None => {
                // Zero rows: missing item or not enough stock. Nothing was
                // written; report the current quantity for the caller.
                tx.rollback().await.ok();
                let current = self
                    .get_item(input.inventory_item_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Inventory item not found")))?;
                return Err(AppError::InsufficientStock(anyhow::anyhow!(
                    "Cannot dispense {} {} of {}: only {} available",
                    input.quantity,
                    current.unit,
                    current.drug_name,
                    current.quantity
                )));
            }
        };

        let record_id = Uuid::new_v4();
        let record = sqlx::query_as::<_, DispensedRecord>(
            r#"
            INSERT INTO dispensed_medicines (
                record_id, inventory_item_id, patient_id, medical_record_id,
                quantity_dispensed, dispensed_by, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING record_id, inventory_item_id, patient_id, medical_record_id,
                quantity_dispensed, dispensed_by, dispensed_at, notes
            "#,
        )
        .bind(record_id)
        .bind(input.inventory_item_id)
        .bind(input.patient_id)
        .bind(input.medical_record_id)
        .bind(input.quantity)
        .bind(&input.dispensed_by)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert dispensing record: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            record_id = %record.record_id,
            item_id = %item.item_id,
            quantity_dispensed = record.quantity_dispensed,
            remaining = item.quantity,
            low_stock = item.is_low_stock(),
            "Stock dispensed"
        );

        Ok(record)
    }

    /// Dispensing history, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_dispensed(
        &self,
        filter: &ListDispensedFilter,
    ) -> Result<Vec<DispensedRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_dispensed"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let records = sqlx::query_as::<_, DispensedRecord>(
            r#"
            SELECT record_id, inventory_item_id, patient_id, medical_record_id,
                quantity_dispensed, dispensed_by, dispensed_at, notes
            FROM dispensed_medicines
            WHERE ($1::uuid IS NULL OR inventory_item_id = $1)
              AND ($2::uuid IS NULL OR patient_id = $2)
            ORDER BY dispensed_at DESC, record_id
            LIMIT $3
            "#,
        )
        .bind(filter.inventory_item_id)
        .bind(filter.patient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list dispensing history: {}", e))
        })?;

        timer.observe_duration();

        Ok(records)
    }
}
