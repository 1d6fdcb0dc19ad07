//! reqwest implementations of the remote collaborator contracts.
//!
//! No call is retried here. Timeouts are applied by the orchestrator per
//! call type, so a slow collaborator surfaces as unavailable rather than
//! being charged twice.

mod payment;
mod provider;
mod reservation;

pub use payment::HttpPaymentClient;
pub use provider::HttpProviderMetricsClient;
pub use reservation::HttpHoldClient;

use reqwest::Client;

/// User agent sent with every outbound call.
pub const USER_AGENT: &str = concat!("booking-orchestrator/", env!("CARGO_PKG_VERSION"));

/// Builds the shared HTTP client used by all collaborator clients.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).build()
}

fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    }
}
