//! API server entry point.

use std::sync::Arc;

use api::Collaborators;
use api::config::{Config, LogFormat};
use api::routes::bookings::AppState;
use booking_store::{BookingStore, InMemoryBookingStore, PostgresBookingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
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

/// Runs the expiry/completion sweep every `config.sweep_interval`.
fn spawn_sweeper<S: BookingStore + Clone + 'static>(state: Arc<AppState<S>>, config: &Config) {
    let period = config.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            match state.orchestrator.sweep().await {
                Ok(report) => tracing::info!(
                    expired_holds = report.expired_holds,
                    completed = report.completed,
                    errors = report.errors,
                    "sweep finished"
                ),
                Err(err) => tracing::error!(error = %err, "sweep failed"),
            }
        }
    });
}

async fn serve<S: BookingStore + Clone + 'static>(
    store: S,
    collaborators: Collaborators,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(store, collaborators, config.saga.clone());
    spawn_sweeper(state.clone(), &config);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, payment_mode = config.saga.payment_mode.as_str(), "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");

    // 1. Initialize tracing
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, text) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Collaborators: HTTP where configured, in-memory only when allowed
    let collaborators = Collaborators::from_config(&config).expect("invalid collaborator configuration");
    for (service, url) in [
        ("reservation", &config.reservation_service_url),
        ("payment", &config.payment_service_url),
        ("provider", &config.provider_service_url),
    ] {
        match url {
            Some(url) => tracing::info!(service, %url, "using remote service"),
            None => tracing::warn!(service, "no URL configured, using in-memory fake"),
        }
    }

    // 4. Booking store and server
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresBookingStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(store, collaborators, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings are kept in memory");
            serve(InMemoryBookingStore::new(), collaborators, config, metrics_handle).await;
        }
    }
}
