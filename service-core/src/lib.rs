//! service-core: Shared infrastructure for the hospital billing and pharmacy services.
pub mod config;
pub mod error;
pub mod money;
pub mod observability;
pub mod retry;

pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use validator;
