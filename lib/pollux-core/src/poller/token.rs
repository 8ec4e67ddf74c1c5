use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::PollerError;
use super::handle::{OperationHandle, PollingStrategy};

const TOKEN_VERSION: u8 = 1;

/// Opaque, portable snapshot of an in-progress operation.
///
/// Only valid for the operation that produced it, in any process able to
/// reach the same service.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::Deref,
)]
#[serde(transparent)]
pub struct ResumeToken(String);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPayload {
    version: u8,
    operation: String,
    strategy: PollingStrategy,
    method: String,
    original_url: Url,
    poll_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Url>,
    last_status: u16,
}

impl ResumeToken {
    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn encode(operation: &str, handle: &OperationHandle) -> Result<Self, PollerError> {
        let payload = TokenPayload {
            version: TOKEN_VERSION,
            operation: operation.to_string(),
            strategy: handle.strategy,
            method: handle.method.to_string(),
            original_url: handle.original_url.clone(),
            poll_url: handle.poll_url.clone(),
            location: handle.location.clone(),
            last_status: handle.last_status.as_u16(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|error| PollerError::invalid_token(format!("cannot serialize: {error}")))?;

        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Rebuilds the handle, checking the token belongs to `operation`.
    pub(crate) fn decode(&self, operation: &str) -> Result<OperationHandle, PollerError> {
        let json = URL_SAFE_NO_PAD
            .decode(self.0.trim())
            .map_err(|error| PollerError::invalid_token(format!("not base64: {error}")))?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|error| PollerError::invalid_token(format!("unreadable payload: {error}")))?;

        if payload.version != TOKEN_VERSION {
            return Err(PollerError::invalid_token(format!(
                "unsupported version {}",
                payload.version
            )));
        }
        if payload.operation != operation {
            return Err(PollerError::invalid_token(format!(
                "token belongs to operation '{}', not '{operation}'",
                payload.operation
            )));
        }
        if payload.strategy == PollingStrategy::Immediate {
            return Err(PollerError::invalid_token(
                "the operation has nothing to poll",
            ));
        }
        let method = Method::from_bytes(payload.method.as_bytes())
            .map_err(|error| PollerError::invalid_token(format!("invalid method: {error}")))?;
        let last_status = StatusCode::from_u16(payload.last_status)
            .map_err(|error| PollerError::invalid_token(format!("invalid status: {error}")))?;

        Ok(OperationHandle {
            strategy: payload.strategy,
            method,
            original_url: payload.original_url,
            poll_url: payload.poll_url,
            location: payload.location,
            final_link: None,
            last_status,
            last_body: Bytes::new(),
        })
    }
}

impl From<String> for ResumeToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<ResumeToken> for String {
    fn from(value: ResumeToken) -> Self {
        value.0
    }
}

impl FromStr for ResumeToken {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.to_string()))
    }
}
