//! Desk Runtime Binary
//!
//! Boots the local service stack and runs the market stream session.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin desk-runtime
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `DESK_EMBEDDED_BACKEND`: this process hosts the backend (default: false)
//! - `DESK_BACKEND_URL`: explicit backend base URL; empty string means
//!   same-origin proxied paths (default: unset, local backend)
//! - `DESK_BACKEND_PORT`: local backend port (default: 8001)
//! - `DESK_BACKEND_PROGRAM` / `DESK_BACKEND_ARGS`: backend spawn command
//! - `DESK_DB_ADDR`: optional database address probed at startup
//!   (default: 127.0.0.1:27017)
//! - `DESK_DB_NAME`: database name handed to the backend (default: signals)
//! - `DESK_CORS_ORIGINS`: CORS origins handed to the backend (default: *)
//! - `DESK_SYMBOLS`: comma-separated symbols (default: BTCUSDT,ETHUSDT,LTCUSDT,DOGEUSDT)
//! - `DESK_RECONNECT_DELAY_SECS` / `DESK_POLL_INTERVAL_SECS` (default: 5)
//! - `DESK_READINESS_TIMEOUT_SECS` (default: 15)
//! - `DESK_STOP_GRACE_SECS` (default: 5)
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use desk_runtime::infrastructure::stream::poller::{SnapshotPoller, SnapshotPollerConfig};
use desk_runtime::{
    BackendLocator, MarketDataStore, MarketUpdate, ReconnectConfig, RuntimeConfig,
    ServiceDescriptor, ServiceSupervisor, SharedUpdateHub, StreamClient, StreamClientConfig,
    StreamEvent, UpdateHub, UpdateSource,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    tracing::info!("Starting desk runtime");

    let config = RuntimeConfig::from_env()?;
    log_config(&config);

    let endpoint = BackendLocator::new(config.backend.embedded, config.backend.backend_url.clone())
        .with_local_port(config.backend.port)
        .resolve();
    tracing::info!(
        base_url = endpoint.base_url(),
        stream_url = endpoint.stream_url(),
        origin = ?endpoint.origin(),
        "Backend endpoint resolved"
    );

    // A remote backend is someone else's process; only a local one is
    // supervised here.
    let local_backend = matches!(
        config.backend.backend_url.as_deref().map(str::trim),
        None | Some("")
    ) || config.backend.embedded;

    let mut supervisor = ServiceSupervisor::new(&config.supervisor, build_descriptors(&config));
    if local_backend {
        match supervisor.bootstrap().await {
            Ok(outcome) if outcome.ready => {
                tracing::info!(degraded = ?outcome.degraded, "Local service stack is up");
            }
            Ok(outcome) => {
                tracing::warn!(
                    degraded = ?outcome.degraded,
                    "Local service stack incomplete, continuing without backend"
                );
            }
            Err(error) => {
                tracing::warn!(%error, "Local service spawn failed, continuing without backend");
            }
        }
    } else {
        tracing::info!("Remote backend configured, skipping local bootstrap");
    }

    let store = Arc::new(MarketDataStore::new());
    let hub: SharedUpdateHub = Arc::new(UpdateHub::new(desk_runtime::HubConfig {
        updates_capacity: config.hub.updates_capacity,
        signals_capacity: config.hub.signals_capacity,
        connection_capacity: config.hub.connection_capacity,
    }));

    let poll_cancel = CancellationToken::new();
    let stream_cancel = CancellationToken::new();

    let (stream_tx, stream_rx) = mpsc::channel::<StreamEvent>(1024);
    let (poll_tx, poll_rx) = mpsc::channel::<MarketUpdate>(256);

    let client = StreamClient::new(
        StreamClientConfig {
            url: endpoint.stream_url().to_string(),
            reconnect: ReconnectConfig {
                delay: config.session.reconnect_delay,
                jitter_factor: config.session.reconnect_jitter,
            },
        },
        stream_tx,
        stream_cancel.clone(),
    );

    let poller = SnapshotPoller::new(
        SnapshotPollerConfig {
            endpoint: endpoint.clone(),
            symbols: config.session.symbols.clone(),
            interval: config.session.poll_interval,
        },
        poll_tx,
        poll_cancel.clone(),
    );

    let writer_store = Arc::clone(&store);
    let writer_hub = Arc::clone(&hub);
    let writer_task = tokio::spawn(async move {
        run_store_writer(stream_rx, poll_rx, writer_store, writer_hub).await;
    });
    let client_task = tokio::spawn(client.run());
    let poller_task = tokio::spawn(poller.run());

    tracing::info!("Desk runtime ready");

    await_shutdown().await;

    // Shutdown order: poll timer, stream session, processes in reverse.
    poll_cancel.cancel();
    stream_cancel.cancel();
    let _ = poller_task.await;
    let _ = client_task.await;
    let _ = writer_task.await;
    supervisor.shutdown().await;

    tracing::info!("Desk runtime stopped");
    Ok(())
}

/// Single writer over the market data store.
///
/// Merges stream pushes and poll snapshots through the last-write-wins
/// rule and fans accepted updates out through the hub.
async fn run_store_writer(
    mut stream_rx: mpsc::Receiver<StreamEvent>,
    mut poll_rx: mpsc::Receiver<MarketUpdate>,
    store: Arc<MarketDataStore>,
    hub: SharedUpdateHub,
) {
    let mut stream_open = true;
    let mut poll_open = true;

    while stream_open || poll_open {
        tokio::select! {
            event = stream_rx.recv(), if stream_open => match event {
                Some(StreamEvent::Update(update)) => {
                    if store.apply(update.clone(), UpdateSource::Stream) {
                        let _ = hub.send_update(update, UpdateSource::Stream);
                    }
                }
                Some(StreamEvent::Signal(signal)) => {
                    let _ = hub.send_signal(signal);
                }
                Some(StreamEvent::State(state)) => {
                    let _ = hub.send_connection_state(state);
                }
                None => stream_open = false,
            },
            update = poll_rx.recv(), if poll_open => match update {
                Some(update) => {
                    if store.apply(update.clone(), UpdateSource::Poll) {
                        let _ = hub.send_update(update, UpdateSource::Poll);
                    }
                }
                None => poll_open = false,
            },
        }
    }
}

/// Service descriptors in start order: the optional database first, then
/// the backend API.
fn build_descriptors(config: &RuntimeConfig) -> Vec<ServiceDescriptor> {
    let db_addr =
        std::env::var("DESK_DB_ADDR").unwrap_or_else(|_| "127.0.0.1:27017".to_string());
    let db_name = std::env::var("DESK_DB_NAME").unwrap_or_else(|_| "signals".to_string());
    let cors_origins = std::env::var("DESK_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let program =
        std::env::var("DESK_BACKEND_PROGRAM").unwrap_or_else(|_| "uvicorn".to_string());
    let args = std::env::var("DESK_BACKEND_ARGS").map_or_else(
        |_| {
            vec![
                "backend.server:app".to_string(),
                "--host".to_string(),
                "127.0.0.1".to_string(),
                "--port".to_string(),
                config.backend.port.to_string(),
            ]
        },
        |raw| raw.split_whitespace().map(ToString::to_string).collect(),
    );

    vec![
        ServiceDescriptor::new("db")
            .with_probe_addr(db_addr.clone())
            .optional(),
        ServiceDescriptor::new("api")
            .with_command(program, args)
            .with_env("MONGO_URL", format!("mongodb://{db_addr}"))
            .with_env("DB_NAME", db_name)
            .with_env("CORS_ORIGINS", cors_origins)
            .with_readiness_marker("Application startup complete.")
            .with_readiness_timeout(config.supervisor.readiness_timeout),
    ]
}

/// Initialize tracing with an env-filter, defaulting to info.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Log the parsed configuration.
fn log_config(config: &RuntimeConfig) {
    tracing::info!(
        embedded = config.backend.embedded,
        backend_url = ?config.backend.backend_url,
        backend_port = config.backend.port,
        symbols = ?config.session.symbols,
        reconnect_delay_secs = config.session.reconnect_delay.as_secs(),
        poll_interval_secs = config.session.poll_interval.as_secs(),
        readiness_timeout_secs = config.supervisor.readiness_timeout.as_secs(),
        stop_grace_secs = config.supervisor.stop_grace.as_secs(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
