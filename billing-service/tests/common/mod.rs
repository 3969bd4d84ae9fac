//! Common test utilities for billing-service integration tests.

use billing_service::config::BillingConfig;
use billing_service::startup::Application;
use serde_json::{json, Value};
use service_core::config::{Config as CommonConfig, DatabaseConfig};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,billing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub db_url: String,
}

/// Spawn a test application against TEST_DATABASE_URL.
///
/// Returns `None` when the variable is unset so the suite stays green on
/// machines without a PostgreSQL instance. The suite runs in its own
/// `billing_test` database so other services' migration histories never
/// collide with ours.
pub async fn spawn_app() -> Option<TestApp> {
    init_tracing();

    let admin_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };
    let database_url = isolated_database(&admin_url, "billing_test").await;

    let config = BillingConfig {
        common: CommonConfig { port: 0 },
        service_name: "billing-service-test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: database_url.clone(),
            max_connections: 2,
            min_connections: 1,
        },
    };

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    Some(TestApp {
        address,
        client: reqwest::Client::new(),
        db_url: database_url,
    })
}

/// Create (if needed) a service-scoped database and return its URL.
async fn isolated_database(admin_url: &str, db_name: &str) -> String {
    use sqlx::Connection;

    let mut conn = sqlx::postgres::PgConnection::connect(admin_url)
        .await
        .expect("Failed to connect to TEST_DATABASE_URL");
    // Ignore the error when the database already exists.
    sqlx::query(&format!(r#"CREATE DATABASE "{db_name}""#))
        .execute(&mut conn)
        .await
        .ok();

    let (base, _) = admin_url
        .rsplit_once('/')
        .expect("TEST_DATABASE_URL has no database path");
    format!("{base}/{db_name}")
}

impl TestApp {
    /// POST /api/v1/invoices
    pub async fn create_invoice(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/v1/invoices", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to send create invoice request")
    }

    /// GET /api/v1/invoices/{id}
    pub async fn get_invoice(&self, invoice_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/v1/invoices/{}", self.address, invoice_id))
            .send()
            .await
            .expect("Failed to send get invoice request")
    }

    /// POST /api/v1/invoices/{id}/cancel
    pub async fn cancel_invoice(&self, invoice_id: &str) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/v1/invoices/{}/cancel",
                self.address, invoice_id
            ))
            .send()
            .await
            .expect("Failed to send cancel invoice request")
    }

    /// POST /api/v1/invoices/{id}/recompute
    pub async fn recompute_totals(&self, invoice_id: &str) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/v1/invoices/{}/recompute",
                self.address, invoice_id
            ))
            .send()
            .await
            .expect("Failed to send recompute request")
    }

    /// POST /api/v1/invoices/{id}/payments
    pub async fn record_payment(&self, invoice_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/v1/invoices/{}/payments",
                self.address, invoice_id
            ))
            .json(body)
            .send()
            .await
            .expect("Failed to send record payment request")
    }

    /// GET /api/v1/invoices/{id}/payments
    pub async fn list_payments(&self, invoice_id: &str) -> reqwest::Response {
        self.client
            .get(format!(
                "{}/api/v1/invoices/{}/payments",
                self.address, invoice_id
            ))
            .send()
            .await
            .expect("Failed to send list payments request")
    }

    /// Push an invoice's dates into the past so it reads as overdue.
    pub async fn backdate_invoice(&self, invoice_id: &str) {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.db_url)
            .await
            .expect("Failed to connect for backdating");
        sqlx::query(
            "UPDATE invoices SET issue_date = '2020-01-01', due_date = '2020-01-31' WHERE invoice_id = $1::uuid",
        )
        .bind(invoice_id.parse::<Uuid>().expect("invalid invoice id"))
        .execute(&pool)
        .await
        .expect("Failed to backdate invoice");
    }
}

/// A create-invoice body with the standard test scenario: subtotal 100.00,
/// tax 10.00, discount 5.00 => total 105.00.
pub fn standard_invoice_body() -> Value {
    json!({
        "patient_id": Uuid::new_v4(),
        "due_in_days": 30,
        "tax_amount": "10.00",
        "discount_amount": "5.00",
        "created_by": "staff-test",
        "items": [
            { "description": "Consultation", "quantity": 2, "unit_price": "25.00" },
            { "description": "Blood panel", "quantity": 1, "unit_price": "50.00" }
        ]
    })
}

/// A payment body for the given amount.
pub fn payment_body(amount: &str) -> Value {
    json!({
        "amount": amount,
        "payment_method": "cash",
        "recorded_by": "staff-test"
    })
}
