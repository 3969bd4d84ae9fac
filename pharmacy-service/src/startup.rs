//! Application startup and lifecycle management.
//!
//! Builds the HTTP server for the pharmacy service: health and metrics
//! endpoints plus the inventory and dispensing API.

use crate::config::PharmacyConfig;
use crate::handlers::{dispensing, inventory};
use crate::services::metrics::track_http;
use crate::services::{get_metrics, init_metrics, Database};
use axum::{http::StatusCode, response::IntoResponse, routing::get, routing::post, Json, Router};
use serde_json::json;
use service_core::error::AppError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: PharmacyConfig,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "pharmacy-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: PharmacyConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        init_metrics();

        let state = AppState {
            db,
            config: config.clone(),
        };

        // Bind listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Pharmacy service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .route(
                "/api/v1/inventory",
                post(inventory::create_item).get(inventory::list_items),
            )
            .route(
                "/api/v1/inventory/:item_id",
                get(inventory::get_item).put(inventory::update_item),
            )
            .route(
                "/api/v1/inventory/:item_id/adjust",
                post(inventory::adjust_stock),
            )
            .route(
                "/api/v1/inventory/:item_id/dispense",
                post(dispensing::dispense),
            )
            .route("/api/v1/dispensed", get(dispensing::list_dispensed))
            .layer(axum::middleware::from_fn(track_http))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}
