use config::{Config as Cfg, File};
use serde::Deserialize;
use service_core::config::{Config as CommonConfig, DatabaseConfig};
use service_core::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    #[serde(default = "default_common")]
    pub common: CommonConfig,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub database: DatabaseConfig,
}

fn default_common() -> CommonConfig {
    CommonConfig { port: 8080 }
}

fn default_service_name() -> String {
    "billing-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BillingConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("BILLING").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
