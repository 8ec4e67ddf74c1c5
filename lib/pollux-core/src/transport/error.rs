/// Errors raised while sending a request or reading its response.
///
/// A transport error never changes the state of a [`Poller`](crate::Poller):
/// the caller can retry the call that failed.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum TransportError {
    /// HTTP client error from the underlying reqwest library.
    ReqwestError(reqwest::Error),

    /// Failure reported by a non-reqwest transport (fakes, custom pipelines).
    #[display("Transport failure: {message}")]
    #[from(skip)]
    Failure {
        /// Description of the failure.
        message: String,
    },
}

impl TransportError {
    /// Creates a [`TransportError::Failure`].
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}
