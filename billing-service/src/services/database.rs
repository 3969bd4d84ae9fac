//! Database service for billing-service.

use crate::models::{
    subtotal_of, validate_items, CreateInvoice, CreatePayment, Invoice, InvoiceItem,
    ListInvoicesFilter, Payment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::money;
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
    #[instrument(skip(database_url), fields(service = "billing-service"))]
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
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its line items in one transaction.
    ///
    /// The invoice number comes from `next_invoice_number()`; a unique-key
    /// collision surfaces as `Conflict` so the caller can retry with backoff.
    #[instrument(skip(self, input), fields(patient_id = %input.patient_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        validate_items(&input.items)?;
        if input.due_in_days <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "due_in_days must be positive, got {}",
                input.due_in_days
            )));
        }
        if input.tax_amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Tax amount must be non-negative, got {}",
                input.tax_amount
            )));
        }
        if input.discount_amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount amount must be non-negative, got {}",
                input.discount_amount
            )));
        }

        let subtotal = subtotal_of(&input.items);
        let total_amount = money::invoice_total(subtotal, input.tax_amount, input.discount_amount);
        if total_amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount {} exceeds subtotal plus tax {}",
                input.discount_amount,
                subtotal + input.tax_amount
            )));
        }

        let issue_date = Utc::now().date_naive();
        let due_date = issue_date + chrono::Duration::days(input.due_in_days);

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let insert = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes
            )
            VALUES ($1, next_invoice_number(), $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10)
            RETURNING invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .bind(input.patient_id)
        .bind(&input.created_by)
        .bind(issue_date)
        .bind(due_date)
        .bind(subtotal)
        .bind(input.tax_amount)
        .bind(input.discount_amount)
        .bind(total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await;

        let invoice = match insert {
            Ok(invoice) => invoice,
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Invoice number collision, retrying may succeed"
                )));
            }
            Err(e) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to create invoice: {}",
                    e
                )));
            }
        };

        for (i, item) in input.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (item_id, invoice_id, billing_item_id, description, quantity, unit_price, total_price, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(item.billing_item_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price())
            .bind(i as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List invoices with optional status and patient filters.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                    subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
                FROM invoices
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR patient_id = $2)
                  AND invoice_id > $3
                ORDER BY invoice_id
                LIMIT $4
                "#,
            )
            .bind(&status_str)
            .bind(filter.patient_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                    subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
                FROM invoices
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR patient_id = $2)
                ORDER BY invoice_id
                LIMIT $3
                "#,
            )
            .bind(&status_str)
            .bind(filter.patient_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Get line items for an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, billing_item_id, description, quantity, unit_price, total_price, sort_order, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Re-sum an invoice's totals from its stored line items.
    ///
    /// Idempotent: unchanged items always produce the same subtotal and total.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn recompute_totals(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recompute_totals"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET subtotal = COALESCE(
                    (SELECT SUM(total_price) FROM invoice_items WHERE invoice_id = $1), 0),
                total_amount = COALESCE(
                    (SELECT SUM(total_price) FROM invoice_items WHERE invoice_id = $1), 0)
                    + tax_amount - discount_amount,
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to recompute totals: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(
                invoice_id = %inv.invoice_id,
                subtotal = %inv.subtotal,
                total_amount = %inv.total_amount,
                "Invoice totals recomputed"
            );
        }

        Ok(invoice)
    }

    /// Cancel an invoice. Terminal: payments and items are retained, the
    /// status never leaves `cancelled` afterwards.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_invoice"])
            .start_timer();

        let existing = self.get_invoice(invoice_id).await?;
        match existing {
            Some(inv) if inv.status == "cancelled" => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoice is already cancelled"
                )))
            }
            Some(_) => {}
            None => return Ok(None),
        };

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = 'cancelled',
                updated_utc = NOW()
            WHERE invoice_id = $1 AND status != 'cancelled'
            RETURNING invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice cancelled");
        }

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Sum of payments recorded against an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn amount_paid(&self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let paid: Option<Decimal> = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        Ok(paid.unwrap_or(Decimal::ZERO))
    }

    /// Record a payment against an invoice.
    ///
    /// The invoice row stays locked for the check-and-insert so two
    /// concurrent payments cannot jointly exceed the total. The stored status
    /// is refreshed from the new payment sum before commit.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub async fn record_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive, got {}",
                input.amount
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, patient_id, created_by, status, issue_date, due_date,
                subtotal, tax_amount, discount_amount, total_amount, notes, created_utc, updated_utc
            FROM invoices
            WHERE invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        if invoice.status == "cancelled" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot record payments against a cancelled invoice"
            )));
        }
        if invoice.status == "draft" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot record payments against a draft invoice"
            )));
        }

        let already_paid: Option<Decimal> = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(input.invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;
        let already_paid = already_paid.unwrap_or(Decimal::ZERO);

        if already_paid + input.amount > invoice.total_amount {
            return Err(AppError::Overpayment(anyhow::anyhow!(
                "Payment of {} exceeds balance due {} on invoice {}",
                input.amount,
                invoice.balance_due(already_paid),
                invoice.invoice_number
            )));
        }

        let payment_id = Uuid::new_v4();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, amount, payment_method, payment_date,
                reference_number, recorded_by, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING payment_id, invoice_id, amount, payment_method, payment_date,
                reference_number, recorded_by, notes, created_utc
            "#,
        )
        .bind(payment_id)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(&input.payment_method)
        .bind(input.payment_date)
        .bind(&input.reference_number)
        .bind(&input.recorded_by)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        let new_status =
            invoice.derive_status(already_paid + input.amount, true, Utc::now().date_naive());
        sqlx::query("UPDATE invoices SET status = $2, updated_utc = NOW() WHERE invoice_id = $1")
            .bind(input.invoice_id)
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to refresh status: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            invoice_id = %payment.invoice_id,
            amount = %payment.amount,
            status = new_status.as_str(),
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Payments for an invoice in insertion order, for audit display.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, payment_method, payment_date,
                reference_number, recorded_by, notes, created_utc
            FROM payments
            WHERE invoice_id = $1
            ORDER BY created_utc, payment_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }
}
