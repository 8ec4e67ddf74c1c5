use std::future::Future;
use std::net::TcpListener;
use std::time::Duration;

use url::Url;

/// A server the [`TestClient`](super::TestClient) can launch on a random local port.
///
/// Implement it once per fake service, e.g. an `axum` app answering
/// long-running operations.
pub trait TestServer {
    /// Error raised by the server.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Serves requests on the listener until the task is aborted.
    fn launch(&self, listener: TcpListener) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Tells whether the server is ready to answer.
    ///
    /// Defaults to [`HealthStatus::Uncheckable`]: the client then waits for
    /// a TCP connection to succeed.
    fn is_healthy(
        &self,
        _client: &reqwest::Client,
        _base_url: &Url,
    ) -> impl Future<Output = Result<HealthStatus, Self::Error>> + Send {
        std::future::ready(Ok(HealthStatus::Uncheckable))
    }

    /// Client and start-up configuration.
    fn config(&self) -> TestServerConfig {
        TestServerConfig::default()
    }
}

/// Answer of [`TestServer::is_healthy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Ready.
    Healthy,
    /// Not ready yet, check again later.
    Unhealthy,
    /// No health endpoint, fall back to a TCP connection check.
    Uncheckable,
}

/// Configuration of a [`TestClient`](super::TestClient) start-up.
#[derive(Debug, Clone)]
pub struct TestServerConfig {
    /// The HTTP client to use, a default `reqwest::Client` when `None`.
    pub client: Option<reqwest::Client>,
    /// First delay between two health checks.
    pub min_backoff_delay: Duration,
    /// Longest delay between two health checks.
    pub max_backoff_delay: Duration,
    /// Randomizes health check delays.
    pub backoff_jitter: bool,
    /// Health checks before giving up.
    pub max_retry_attempts: usize,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            client: None,
            min_backoff_delay: Duration::from_millis(10),
            max_backoff_delay: Duration::from_secs(1),
            backoff_jitter: true,
            max_retry_attempts: 10,
        }
    }
}
