//! Daemon lifecycle: key loading, store setup, reaper, HTTP servers

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use hush_core::config::HushConfig;
use hush_core::KeyMode;
use hush_crypto::{parse_server_key, SecretKey};
use hush_store::{AtomicRecordStore, FsRecordStore, SweepPolicy, SweepReport};
use hush_vault::{Vault, VaultSettings};

use crate::http::AppState;
use crate::metrics::{HealthState, HushMetrics};

/// Environment variable holding a base64 server key; wins over the key file
pub const SERVER_KEY_ENV: &str = "HUSH_SERVER_KEY";

pub async fn run(config: HushConfig) -> Result<()> {
    info!("daemon starting");

    let server_key = load_server_key(&config)?;
    let settings = VaultSettings::from_config(&config, server_key)?;
    let store = Arc::new(open_store(&config)?);

    match store.check_health() {
        Ok(()) => info!(data_dir = %store.root().display(), "store: ready"),
        Err(e) => warn!(data_dir = %store.root().display(), "store: {e}"),
    }

    let mut registry = Registry::default();
    let metrics = HushMetrics::register(&mut registry);

    // Start Prometheus metrics endpoint
    if let Some(addr) = config.daemon.metrics_addr.clone() {
        let state = HealthState {
            registry: Arc::new(registry),
            store: store.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, state).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    spawn_reaper(store.clone(), &config, metrics.clone());

    let vault = Arc::new(Vault::new(store, settings)?);
    let app = crate::http::router(AppState {
        vault,
        metrics,
        public_url: config.daemon.public_url.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.daemon.listen)
        .await
        .with_context(|| format!("binding {}", config.daemon.listen))?;

    info!(
        listen = %config.daemon.listen,
        mode = ?config.crypto.mode,
        sid_len = config.sid_len(),
        "http: listening"
    );

    // Shutdown signal
    let sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
    let sigint = signal(SignalKind::interrupt()).context("registering SIGINT handler")?;

    notify_ready();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sigterm, sigint))
        .await
        .context("http server")?;

    info!("daemon stopped");
    Ok(())
}

/// One reaper pass for cron-driven deployments.
pub async fn sweep_once(config: HushConfig) -> Result<SweepReport> {
    let store = open_store(&config)?;
    let policy = sweep_policy(&config);
    let report = tokio::task::spawn_blocking(move || store.sweep(SystemTime::now(), &policy))
        .await
        .context("sweep task")??;
    info!(
        expired = report.expired,
        orphaned = report.orphaned,
        failed = report.failed,
        "sweep finished"
    );
    Ok(report)
}

fn open_store(config: &HushConfig) -> Result<FsRecordStore> {
    FsRecordStore::open(
        &config.store.data_dir,
        config.sid_len(),
        config.store.shred_passes,
    )
    .with_context(|| format!("opening store {}", config.store.data_dir.display()))
}

fn sweep_policy(config: &HushConfig) -> SweepPolicy {
    SweepPolicy::from_secs(config.store.max_age_secs, config.store.lock_grace_secs)
}

/// Start the in-process reaper; `sweep_interval_secs = 0` leaves reaping to
/// an external `hushd sweep`.
fn spawn_reaper<S: AtomicRecordStore + 'static>(
    store: Arc<S>,
    config: &HushConfig,
    metrics: HushMetrics,
) -> Option<JoinHandle<()>> {
    if config.store.sweep_interval_secs == 0 {
        info!("reaper: disabled (store.sweep_interval_secs = 0)");
        return None;
    }
    let policy = sweep_policy(config);
    let every = Duration::from_secs(config.store.sweep_interval_secs);

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.sweep(SystemTime::now(), &policy))
                .await
            {
                Ok(Ok(report)) => {
                    metrics.record_sweep(&report);
                    if report.total() > 0 {
                        info!(
                            expired = report.expired,
                            orphaned = report.orphaned,
                            "reaper: removed records"
                        );
                    }
                    if report.failed > 0 {
                        warn!(failed = report.failed, "reaper: some entries could not be removed");
                    }
                }
                Ok(Err(e)) => warn!("reaper: sweep failed: {e}"),
                Err(e) => error!("reaper: task failed: {e}"),
            }
        }
    }))
}

/// Server key from `HUSH_SERVER_KEY` or `crypto.server_key_file`, server mode only.
pub fn load_server_key(config: &HushConfig) -> Result<Option<SecretKey>> {
    if config.crypto.mode != KeyMode::Server {
        return Ok(None);
    }

    if let Ok(encoded) = std::env::var(SERVER_KEY_ENV).map(zeroize::Zeroizing::new) {
        let key =
            parse_server_key(&encoded).with_context(|| format!("parsing {SERVER_KEY_ENV}"))?;
        info!("server key loaded from {SERVER_KEY_ENV}");
        return Ok(Some(key));
    }

    let Some(path) = &config.crypto.server_key_file else {
        anyhow::bail!("server key mode needs crypto.server_key_file or {SERVER_KEY_ENV}");
    };
    let encoded = zeroize::Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading server key {}", path.display()))?,
    );
    let key = parse_server_key(&encoded)
        .with_context(|| format!("parsing server key {}", path.display()))?;
    info!(path = %path.display(), "server key loaded");
    Ok(Some(key))
}

async fn shutdown_signal(mut sigterm: Signal, mut sigint: Signal) {
    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
        _ = sigint.recv() => info!("SIGINT received, shutting down"),
    }
}

fn notify_ready() {
    // Send sd_notify(READY=1) to systemd if running as a service
    // Uses $NOTIFY_SOCKET env var; no-op if not set
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}
