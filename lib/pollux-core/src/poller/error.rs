use http::StatusCode;

use super::PollerStatus;
use crate::decode::DecodeError;
use crate::response_error::ResponseError;
use crate::transport::TransportError;

/// Errors raised by a [`Poller`](super::Poller).
///
/// A failed poll never changes the poller state: the caller may retry the
/// same call.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum PollerError {
    /// The transport could not deliver the request or read the response.
    #[display("Transport error: {_0}")]
    Transport(TransportError),

    /// A response could not be classified.
    #[display("Malformed response: {reason}")]
    #[from(skip)]
    MalformedResponse {
        /// What is wrong with the response.
        reason: String,
    },

    /// A resume token cannot be used for this operation.
    #[display("Invalid resume token: {reason}")]
    #[from(skip)]
    InvalidToken {
        /// Why the token was rejected.
        reason: String,
    },

    /// The operation reached the `Failed` state.
    #[display("Operation failed: {_0}")]
    OperationFailed(ResponseError),

    /// The final body cannot be decoded as the result type.
    #[display("Cannot decode the operation result: {_0}")]
    Decode(DecodeError),

    /// Only an in-progress operation can be resumed.
    #[display("Cannot create a resume token for a poller in state {state}")]
    #[from(skip)]
    NotResumable {
        /// State of the poller at the time of the request.
        state: PollerStatus,
    },

    /// The caller cancelled the wait.
    #[display("Polling was cancelled")]
    Cancelled,
}

impl PollerError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// The HTTP status behind the error, when a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::OperationFailed(error) => Some(error.status()),
            _ => None,
        }
    }
}
