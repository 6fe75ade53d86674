use anyhow::Context;

use replenish_infra::ProcessorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    replenish_observability::init();

    let config = ProcessorConfig::from_env().context("invalid processor configuration")?;
    let services = replenish_processor::app::services::build_services(&config)?;
    let app = replenish_processor::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
