use anyhow::{Context, Result};
use rollup_service::{
    config::AppConfig, observability, store::PgStore, RollupPipeline, RollupScheduler,
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

/// Drains the whole rollup chain once and exits.
///
/// usage: rollup_once [<rfc3339 cutoff>]
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cutoff = env::args()
        .nth(1)
        .map(|arg| {
            OffsetDateTime::parse(arg.trim(), &Rfc3339)
                .map(|ts| ts.to_offset(UtcOffset::UTC))
                .with_context(|| format!("invalid cutoff '{arg}', expected RFC 3339"))
        })
        .transpose()?;

    let cfg = AppConfig::load()?;
    let location = cfg.location.build()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let pipeline = RollupPipeline::new(PgStore::new(pool), location, cfg.rollup.settings());
    let scheduler = RollupScheduler::new(pipeline, cfg.rollup.schedule());

    let reports = match cutoff {
        Some(cutoff) => scheduler.sweep_until(cutoff).await?,
        None => scheduler.sweep(OffsetDateTime::now_utc()).await?,
    };

    for report in &reports {
        tracing::info!(
            transition = %report.transition,
            passes = report.productive_passes,
            drained = report.drained,
            "stage finished"
        );
    }

    Ok(())
}
