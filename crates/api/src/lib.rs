//! HTTP API server for the travel booking orchestrator.
//!
//! Provides REST endpoints for booking creation, provider approval,
//! payment and cancellation, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use booking_store::BookingStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::http::build_client;
use saga::{
    BookingOrchestrator, HttpHoldClient, HttpPaymentClient, HttpProviderMetricsClient,
    InMemoryHoldService, InMemoryPaymentService, InMemoryProviderMetrics, PaymentClient,
    PaymentMode, ProviderMetricsClient, ReservationHoldClient, SagaConfig,
};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::bookings::AppState;

/// Why the collaborators could not be built from configuration.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} service has no URL; set {key} or IN_MEMORY_SERVICES=true")]
    Missing {
        service: &'static str,
        key: &'static str,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The three remote collaborators the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub holds: Arc<dyn ReservationHoldClient>,
    pub payments: Arc<dyn PaymentClient>,
    pub provider: Arc<dyn ProviderMetricsClient>,
}

impl Collaborators {
    /// In-memory fakes for all three services.
    pub fn in_memory() -> Self {
        Self {
            holds: Arc::new(InMemoryHoldService::new()),
            payments: Arc::new(InMemoryPaymentService::new()),
            provider: Arc::new(InMemoryProviderMetrics::new()),
        }
    }

    /// HTTP clients for every service with a configured URL.
    ///
    /// A service without a URL gets its in-memory fake only when
    /// `in_memory_services` is set, or, for payments, when payment is
    /// bypassed. Otherwise startup fails with [`CollaboratorError::Missing`].
    pub fn from_config(config: &Config) -> Result<Self, CollaboratorError> {
        let client = build_client()?;
        let fakes = Self::in_memory();
        let fallback = |service: &'static str, key: &'static str| {
            if config.in_memory_services {
                Ok(())
            } else {
                Err(CollaboratorError::Missing { service, key })
            }
        };

        let holds: Arc<dyn ReservationHoldClient> = match &config.reservation_service_url {
            Some(url) => Arc::new(HttpHoldClient::new(client.clone(), url.as_str())),
            None => {
                fallback("reservation", "RESERVATION_SERVICE_URL")?;
                fakes.holds
            }
        };
        let payments: Arc<dyn PaymentClient> = match &config.payment_service_url {
            Some(url) => Arc::new(HttpPaymentClient::new(client.clone(), url.as_str())),
            None if config.saga.payment_mode == PaymentMode::Bypass => fakes.payments,
            None => {
                fallback("payment", "PAYMENT_SERVICE_URL")?;
                fakes.payments
            }
        };
        let provider: Arc<dyn ProviderMetricsClient> = match &config.provider_service_url {
            Some(url) => Arc::new(HttpProviderMetricsClient::new(client, url.as_str())),
            None => {
                fallback("provider", "PROVIDER_SERVICE_URL")?;
                fakes.provider
            }
        };

        Ok(Self {
            holds,
            payments,
            provider,
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookingStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/requests", post(routes::bookings::request::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route(
            "/bookings/confirmation/{code}",
            get(routes::bookings::by_confirmation::<S>),
        )
        .route("/bookings/{id}/approve", post(routes::bookings::approve::<S>))
        .route("/bookings/{id}/decline", post(routes::bookings::decline::<S>))
        .route("/bookings/{id}/pay", post(routes::bookings::pay::<S>))
        .route("/bookings/{id}/cancel", post(routes::bookings::cancel::<S>))
        .route("/bookings/{id}/complete", post(routes::bookings::complete::<S>))
        .route(
            "/bookings/{id}/cancellation",
            get(routes::bookings::cancellation::<S>),
        )
        .route(
            "/bookings/{id}/payment-status",
            get(routes::bookings::payment_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around `store` and the given collaborators.
pub fn create_state<S: BookingStore + Clone + 'static>(
    store: S,
    collaborators: Collaborators,
    config: SagaConfig,
) -> Arc<AppState<S>> {
    let orchestrator = BookingOrchestrator::new(
        store,
        collaborators.holds,
        collaborators.payments,
        collaborators.provider,
        config,
    );
    Arc::new(AppState { orchestrator })
}

/// Creates the default application state with in-memory collaborators.
pub fn create_default_state<S: BookingStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    create_state(store, Collaborators::in_memory(), SagaConfig::default())
}
