use anyhow::Result;
use rollup_service::{
    config::AppConfig, metrics_server, observability, store::PgStore, RollupPipeline,
    RollupScheduler,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let location = cfg.location.build()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let pipeline = RollupPipeline::new(PgStore::new(pool), location, cfg.rollup.settings());
    let scheduler = RollupScheduler::new(pipeline, cfg.rollup.schedule());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, finishing current sweep");
            shutdown.cancel();
        }
    });

    tracing::info!(
        readings_per_label = cfg.rollup.readings_per_label,
        poll_interval_secs = cfg.rollup.poll_interval_secs,
        "rollup scheduler starting"
    );
    scheduler.run(cancel).await?;

    Ok(())
}
