//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::Config;
use domain::EventSink;
use events::{AnalyticsListener, EventBus, InMemoryAnalyticsSink, LogMailer, NotificationListener};
use repository::{InMemoryRepository, PostgresRepository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

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

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the event listeners
    let mut bus = EventBus::new();
    bus.register(Arc::new(NotificationListener::new(Arc::new(LogMailer))));
    bus.register(Arc::new(AnalyticsListener::new(Arc::new(
        InMemoryAnalyticsSink::new(),
    ))));
    let sink: Arc<dyn EventSink> = Arc::new(bus);
    let thresholds = config.thresholds();

    // 4. Build the application over Postgres or the in-memory repository
    let app = match config.database_url {
        Some(ref url) => {
            let repo = PostgresRepository::connect(url)
                .await
                .expect("failed to connect to Postgres");
            repo.run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("serving over Postgres");
            api::create_app(
                Arc::new(AppState::new(Arc::new(repo), sink, thresholds)),
                metrics_handle,
            )
        }
        None => {
            tracing::info!("DATABASE_URL not set, serving over the in-memory repository");
            api::create_app(
                Arc::new(AppState::new(
                    Arc::new(InMemoryRepository::new()),
                    sink,
                    thresholds,
                )),
                metrics_handle,
            )
        }
    };

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
