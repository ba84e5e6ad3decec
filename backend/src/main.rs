use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use trend_backend::{
    config::AppConfig,
    db::Db,
    error::AppError,
    logger::init_tracing,
    metrics::counters::Counters,
    quote::{EuronextClient, Instrument, RetryPolicy},
    scheduler::CycleScheduler,
    snapshot::{SnapshotRepository, SqlxSnapshotRepository},
};

/// Connects the DB, runs migrations and returns the repository.
async fn init_repository(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SnapshotRepository>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    Ok(Arc::new(SqlxSnapshotRepository::new(db.pool.clone())))
}

/// Instruments come from the instruments table. An empty table is seeded from
/// `INSTRUMENTS_FILE` when one is configured.
async fn load_instruments(
    repo: &dyn SnapshotRepository,
    cfg: &AppConfig,
) -> anyhow::Result<Vec<Instrument>> {
    let existing = repo.load_instruments().await?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    let Some(path) = &cfg.instruments_file else {
        return Err(AppError::NoInstruments.into());
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read instruments file {path}"))?;
    let seed: Vec<Instrument> =
        serde_json::from_str(&raw).with_context(|| format!("invalid instruments file {path}"))?;
    if seed.is_empty() {
        return Err(AppError::Config(format!("instruments file {path} lists no instruments")).into());
    }

    repo.seed_instruments(&seed).await?;
    tracing::info!(count = seed.len(), file = %path, "instruments seeded");

    repo.load_instruments().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting trend engine...");

    let cfg = AppConfig::from_env();

    let repo = init_repository(&cfg).await?;
    let instruments = load_instruments(repo.as_ref(), &cfg).await?;

    let client = EuronextClient::new(
        cfg.quote_endpoint.clone(),
        cfg.quote_timeout,
        RetryPolicy {
            max_attempts: cfg.quote_max_attempts,
            backoff: cfg.quote_retry_backoff,
        },
    )?;

    let scheduler = CycleScheduler::bootstrap(
        Arc::new(client),
        repo,
        instruments,
        cfg.scheduler.clone(),
        Counters::default(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received; stopping after the current step");

    let _ = shutdown_tx.send(true);
    engine.await?;

    Ok(())
}
