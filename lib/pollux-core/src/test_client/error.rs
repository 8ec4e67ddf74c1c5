use std::time::Duration;

/// Errors raised while starting a [`TestClient`](super::TestClient).
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum TestAppError {
    /// Binding the local listener failed.
    #[display("I/O error: {_0}")]
    IoError(std::io::Error),

    /// A URL could not be built.
    #[display("Invalid URL: {_0}")]
    UrlError(url::ParseError),

    /// The server never reported healthy.
    #[from(skip)]
    #[display("Server failed to become healthy within {timeout:?}")]
    UnhealthyServer {
        /// Longest delay between two health checks.
        timeout: Duration,
    },
}
