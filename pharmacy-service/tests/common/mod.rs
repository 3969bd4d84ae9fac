//! Common test utilities for pharmacy-service integration tests.

use pharmacy_service::config::PharmacyConfig;
use pharmacy_service::startup::Application;
use serde_json::{json, Value};
use service_core::config::{Config as CommonConfig, DatabaseConfig};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,pharmacy_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawn a test application against TEST_DATABASE_URL.
///
/// Returns `None` when the variable is unset so the suite stays green on
/// machines without a PostgreSQL instance. The suite runs in its own
/// `pharmacy_test` database so other services' migration histories never
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
    let database_url = isolated_database(&admin_url, "pharmacy_test").await;

    let config = PharmacyConfig {
        common: CommonConfig { port: 0 },
        service_name: "pharmacy-service-test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: database_url,
            max_connections: 4,
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
    /// POST /api/v1/inventory
    pub async fn create_item(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/v1/inventory", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to send create item request")
    }

    /// GET /api/v1/inventory/{id}
    pub async fn get_item(&self, item_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/v1/inventory/{}", self.address, item_id))
            .send()
            .await
            .expect("Failed to send get item request")
    }

    /// PUT /api/v1/inventory/{id}
    pub async fn update_item(&self, item_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(format!("{}/api/v1/inventory/{}", self.address, item_id))
            .json(body)
            .send()
            .await
            .expect("Failed to send update item request")
    }

    /// POST /api/v1/inventory/{id}/adjust
    pub async fn adjust_stock(&self, item_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/v1/inventory/{}/adjust",
                self.address, item_id
            ))
            .json(body)
            .send()
            .await
            .expect("Failed to send adjust stock request")
    }

    /// POST /api/v1/inventory/{id}/dispense
    pub async fn dispense(&self, item_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/v1/inventory/{}/dispense",
                self.address, item_id
            ))
            .json(body)
            .send()
            .await
            .expect("Failed to send dispense request")
    }

    /// GET /api/v1/dispensed
    pub async fn list_dispensed(&self, query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/v1/dispensed?{}", self.address, query))
            .send()
            .await
            .expect("Failed to send list dispensed request")
    }

    /// Create an item and return its id.
    pub async fn create_item_with_stock(&self, quantity: i32, reorder_level: i32) -> String {
        let response = self
            .create_item(&inventory_body(quantity, reorder_level))
            .await;
        assert_eq!(response.status(), 201);
        let item: Value = response.json().await.expect("invalid JSON");
        item["item_id"]
            .as_str()
            .expect("missing item_id")
            .to_string()
    }
}

/// An inventory body with the given stock levels.
pub fn inventory_body(quantity: i32, reorder_level: i32) -> Value {
    json!({
        "drug_name": format!("Amoxicillin {}", Uuid::new_v4()),
        "category": "Antibiotic",
        "quantity": quantity,
        "unit": "tablets",
        "reorder_level": reorder_level,
        "unit_price": "0.50",
        "batch_number": "B-1024"
    })
}

/// A dispense body for the given quantity.
pub fn dispense_body(quantity: i32) -> Value {
    json!({
        "patient_id": Uuid::new_v4(),
        "quantity": quantity,
        "dispensed_by": "staff-test"
    })
}
