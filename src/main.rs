//! Crisis ingest service: binary entrypoint.
//! Loads config, starts the ingest scheduler and serves the HTTP API.

use crisis_ingest::ingest::config::IngestConfig;
use crisis_ingest::metrics::Metrics;
use crisis_ingest::{build_state, router};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - INGEST_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("INGEST_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crisis_ingest=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = IngestConfig::load_default()?;
    let metrics = Metrics::init(cfg.interval_secs)?;
    let state = build_state(&cfg)?;

    if state.scheduler.adapter_names().is_empty() {
        tracing::warn!("no ingest sources configured; only injected events will flow");
    }
    state.scheduler.start();

    let app = router(state).merge(metrics.router());
    Ok(app.into())
}
