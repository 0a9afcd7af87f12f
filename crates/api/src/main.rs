//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, LogFormat};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use messaging::BOOKING_PAYMENT_EVENTS_QUEUE;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{ExpirationReaper, PaymentEventListener};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DB_MAX_CONNECTIONS: u32 = 10;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Pick the event store and serve
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresEventStore::connect(&url, DB_MAX_CONNECTIONS)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL event store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            serve(InMemoryEventStore::new(), config, metrics_handle).await;
        }
    }
}

async fn serve<S: EventStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_default_state(store, &config).expect("failed to declare channel topology");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 4. Background workers: payment event listener and expiration reaper
    let workers = spawn_workers(&state, &config, shutdown_rx);

    // 5. Build the application and start the server
    let app = api::create_app(state.clone(), metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Stop the workers with the server
    let _ = shutdown_tx.send(true);
    state.broker.close();
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "background worker panicked");
        }
    }

    tracing::info!("server shut down gracefully");
}

fn spawn_workers<S: EventStore + Clone + 'static>(
    state: &Arc<AppState<S>>,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let consumer = state
        .broker
        .consume(BOOKING_PAYMENT_EVENTS_QUEUE)
        .expect("booking payment-events queue is declared");
    let listener = PaymentEventListener::new(state.coordinator.clone());
    let listener_shutdown = shutdown.clone();
    let listener_task = tokio::spawn(async move {
        listener.run(consumer, listener_shutdown).await;
    });

    let reaper = ExpirationReaper::new(state.coordinator.clone());
    let interval = config.reaper_interval;
    let reaper_task = tokio::spawn(async move {
        reaper.run(interval, shutdown).await;
    });

    vec![listener_task, reaper_task]
}
