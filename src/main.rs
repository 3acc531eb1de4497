//! Story Tracker: binary entrypoint
//! Wires the sources, the ingestion consumer, the reconciler schedule and the
//! change logger, then waits for a shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use story_tracker::events::spawn_change_logger;
use story_tracker::ingest::providers::{HnProvider, JsonFileProvider};
use story_tracker::ingest::scheduler::{Pipeline, SchedulerCfg};
use story_tracker::ingest::spawn_consumer;
use story_tracker::{persist, ChangeBus, StoryStore, TrackerConfig};

/// Compact console logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().compact()))
        .init();
}

fn install_metrics(addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("METRICS_ADDR={addr} is not a socket address"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install exporter")?;
    info!(%addr, "metrics exporter listening");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = TrackerConfig::load_default().context("loading tracker config")?;
    if let Some(addr) = cfg.metrics_addr.as_deref() {
        if let Err(e) = install_metrics(addr) {
            warn!(error = ?e, "metrics disabled");
        }
    }
    info!(
        capacity = cfg.capacity,
        feed = ?cfg.feed,
        input = %cfg.input_path.display(),
        "starting the app"
    );

    let changes = ChangeBus::new(cfg.change_buffer);
    let change_logger = spawn_change_logger(changes.subscribe());
    let store = StoryStore::new(cfg.capacity, changes);

    let (tx, rx) = mpsc::channel(cfg.ingest_buffer);
    let consumer = spawn_consumer(rx, store.clone());

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(HnProvider::new(cfg.hn_base_url.clone(), cfg.feed)),
        Arc::new(JsonFileProvider::new(cfg.input_path.clone())),
        tx,
        SchedulerCfg::from(&cfg),
    );

    let cancel = CancellationToken::new();
    let startup = pipeline.spawn_startup_fetches(&cancel);
    let scheduler = Arc::clone(&pipeline).spawn(cancel.clone());

    shutdown_signal().await;
    info!("shutdown signal received, cleaning up");

    // Producers stop first; the ingestion channel closes once the last
    // pipeline handle (and with it the last sender) is gone.
    cancel.cancel();
    if let Err(e) = scheduler.await {
        warn!(error = %e, "scheduler task ended abnormally");
    }
    for h in startup {
        if let Err(e) = h.await {
            warn!(error = %e, "startup fetch ended abnormally");
        }
    }
    drop(pipeline);

    // A crashed consumer still leaves whatever it applied in the store.
    match consumer.await {
        Ok(applied) => info!(applied, "ingest consumer drained"),
        Err(e) => warn!(error = %e, "ingest consumer ended abnormally"),
    }

    match persist::dump_snapshot(&store, &cfg.output_path).await {
        Ok(bytes) => info!(bytes, path = %cfg.output_path.display(), "stories dumped"),
        Err(e) => warn!(error = ?e, "dumping stories failed"),
    }

    // Last bus handle: closes the change stream.
    drop(store);
    if let Ok(logged) = change_logger.await {
        info!(logged, "change logger drained");
    }

    info!("clean up done");
    Ok(())
}
