//! Launch a fake service on a local port and talk to it.
//!
//! ```rust,no_run
//! use std::net::TcpListener;
//! use pollux_core::test_client::{TestClient, TestServer};
//!
//! #[derive(Debug)]
//! struct FakeDisks;
//!
//! impl TestServer for FakeDisks {
//!     type Error = std::io::Error;
//!
//!     async fn launch(&self, listener: TcpListener) -> Result<(), Self::Error> {
//!         listener.set_nonblocking(true)?;
//!         let _listener = tokio::net::TcpListener::from_std(listener)?;
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TestClient::start(FakeDisks).await?;
//! let url = client.url("/disks/disk-1")?;
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, error};
use url::Url;

mod error;
pub use self::error::TestAppError;

mod test_server;
pub use self::test_server::{HealthStatus, TestServer, TestServerConfig};

/// A running [`TestServer`] and a client pointed at it.
///
/// Dereferences to the `reqwest::Client`; the server task is aborted on drop.
#[derive(Debug, derive_more::Deref)]
pub struct TestClient<T> {
    local_addr: SocketAddr,
    base_url: Url,
    #[deref]
    client: reqwest::Client,
    handle: Option<tokio::task::JoinHandle<()>>,
    #[allow(dead_code)]
    test_server: Arc<T>,
}

impl<T> TestClient<T>
where
    T: TestServer + Send + Sync + 'static,
{
    /// Launches the server and waits until it is healthy.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot be bound or the server never gets healthy.
    pub async fn start(test_server: T) -> Result<Self, TestAppError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{local_addr}/"))?;

        let test_server = Arc::new(test_server);
        let handle = tokio::spawn({
            let server = Arc::clone(&test_server);
            async move {
                if let Err(error) = server.launch(listener).await {
                    error!(?error, "Server launch failed");
                }
            }
        });

        let TestServerConfig {
            client,
            min_backoff_delay,
            max_backoff_delay,
            backoff_jitter,
            max_retry_attempts,
        } = test_server.config();
        let client = client.unwrap_or_default();

        let mut backoff = ExponentialBuilder::default()
            .with_min_delay(min_backoff_delay)
            .with_max_delay(max_backoff_delay)
            .with_max_times(max_retry_attempts);
        if backoff_jitter {
            backoff = backoff.with_jitter();
        }

        let healthy =
            Self::wait_for_health(&test_server, &client, &base_url, local_addr, backoff).await;
        if !healthy {
            handle.abort();
            return Err(TestAppError::UnhealthyServer {
                timeout: max_backoff_delay,
            });
        }

        Ok(Self {
            local_addr,
            base_url,
            client,
            handle: Some(handle),
            test_server,
        })
    }

    async fn wait_for_health(
        test_server: &Arc<T>,
        client: &reqwest::Client,
        base_url: &Url,
        local_addr: SocketAddr,
        backoff: ExponentialBuilder,
    ) -> bool {
        let health_check = || {
            let server = Arc::clone(test_server);
            async move {
                match server.is_healthy(client, base_url).await {
                    Ok(HealthStatus::Healthy) => {
                        debug!("server healthy");
                        Ok(true)
                    }
                    Ok(HealthStatus::Unhealthy) => {
                        debug!("server not yet healthy, retrying");
                        Err(std::io::Error::new(
                            std::io::ErrorKind::ConnectionRefused,
                            "Server not healthy yet",
                        ))
                    }
                    Ok(HealthStatus::Uncheckable) => {
                        tokio::net::TcpStream::connect(local_addr)
                            .await
                            .map(|_| true)
                    }
                    Err(error) => {
                        error!(?error, "Health check error");
                        Ok(false)
                    }
                }
            }
        };

        health_check.retry(&backoff).await.unwrap_or(false)
    }

    /// The address the server listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://127.0.0.1:<port>/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// A URL of the server.
    ///
    /// # Errors
    ///
    /// Fails if `path` is not a valid relative URL.
    pub fn url(&self, path: &str) -> Result<Url, TestAppError> {
        Ok(self.base_url.join(path)?)
    }

    /// The HTTP client, cheap to clone.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl<T> Drop for TestClient<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
