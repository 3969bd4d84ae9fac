use billing_service::{config::BillingConfig, Application};
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BillingConfig::load().expect("Failed to load configuration");
    init_tracing(&config.log_level);

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
