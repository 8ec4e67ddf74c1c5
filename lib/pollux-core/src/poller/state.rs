use bytes::Bytes;

use super::PollerError;
use super::handle::{
    PollingStrategy, is_failed, is_succeeded, monitor_status, provisioning_state,
};
use crate::response_error::ResponseError;
use crate::status::SuccessStatusCodes;
use crate::transport::HttpResponse;

/// Public view of the poller state.
///
/// `Created` only exists between construction and the classification of the
/// initial response; `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PollerStatus {
    /// Constructed, initial response not yet classified.
    Created,
    /// The operation is still running.
    InProgress,
    /// The operation completed successfully.
    Succeeded,
    /// The operation failed or was cancelled by the service.
    Failed,
}

impl PollerStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum State {
    Created,
    InProgress,
    Succeeded,
    Failed(ResponseError),
}

impl State {
    pub(crate) fn status(&self) -> PollerStatus {
        match self {
            Self::Created => PollerStatus::Created,
            Self::InProgress => PollerStatus::InProgress,
            Self::Succeeded => PollerStatus::Succeeded,
            Self::Failed(_) => PollerStatus::Failed,
        }
    }
}

/// What a single poll observed.
#[derive(Debug, Clone)]
pub enum PollResult {
    /// Still running, with the service-reported status when there is one
    /// (e.g. `Running`, `Accepted`).
    InProgress {
        /// Raw status reported by the service.
        status: Option<String>,
    },
    /// Completed; carries the body of the terminal response.
    ///
    /// When the final result lives elsewhere (see
    /// [`FinalStateVia`](super::FinalStateVia)) it is fetched by
    /// [`Poller::result`](super::Poller::result), not here.
    Succeeded(Bytes),
    /// Failed, with the service error.
    Failed(ResponseError),
}

impl PollResult {
    /// Whether the operation reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

/// Classifies a poll response for a strategy.
///
/// Non-`2xx` is always a failure. Status monitors are read from their
/// `status` field regardless of the HTTP code. Resource bodies are read from
/// `properties.provisioningState`. `Location` polling checks for a reported
/// failure first, then the terminal success codes, then a pending indicator,
/// then `202 Accepted`.
pub(crate) fn classify(
    strategy: PollingStrategy,
    response: &HttpResponse,
    success_status_codes: &SuccessStatusCodes,
) -> Result<PollResult, PollerError> {
    let status = response.status();
    if !status.is_success() {
        return Ok(PollResult::Failed(ResponseError::from_response(response)));
    }

    match strategy {
        PollingStrategy::AzureAsyncOperation | PollingStrategy::OperationLocation => {
            let body = response.json_body().ok_or_else(|| {
                PollerError::malformed(format!(
                    "status monitor {} answered {status} without a JSON body",
                    response.url()
                ))
            })?;
            let Some(state) = monitor_status(&body) else {
                return Err(PollerError::malformed(format!(
                    "status monitor {} has no 'status' field",
                    response.url()
                )));
            };
            Ok(by_state(state, response))
        }
        PollingStrategy::Body => match provisioning_state(response) {
            Some(state) => Ok(by_state(&state, response)),
            None if success_status_codes.contains(status) => {
                Ok(PollResult::Succeeded(response.body().clone()))
            }
            None => Err(unexpected_status(response)),
        },
        PollingStrategy::Location | PollingStrategy::Immediate => {
            if let Some(error) = reported_failure(response) {
                return Ok(PollResult::Failed(error));
            }
            if success_status_codes.contains(status) {
                return Ok(PollResult::Succeeded(response.body().clone()));
            }
            match reported_state(response) {
                Some(state) => Ok(by_state(&state, response)),
                None if status == http::StatusCode::ACCEPTED => {
                    Ok(PollResult::InProgress { status: None })
                }
                None => Err(unexpected_status(response)),
            }
        }
    }
}

/// The operation state a body reports, from a monitor `status` or a
/// resource `properties.provisioningState`.
fn reported_state(response: &HttpResponse) -> Option<String> {
    response
        .json_body()
        .and_then(|body| monitor_status(&body).map(str::to_string))
        .or_else(|| provisioning_state(response))
}

/// The service error of a `2xx` body that reports a failed operation.
pub(crate) fn reported_failure(response: &HttpResponse) -> Option<ResponseError> {
    reported_state(response)
        .filter(|state| is_failed(state))
        .map(|state| ResponseError::from_status_monitor(response, &state))
}

fn by_state(state: &str, response: &HttpResponse) -> PollResult {
    if is_succeeded(state) {
        PollResult::Succeeded(response.body().clone())
    } else if is_failed(state) {
        PollResult::Failed(ResponseError::from_status_monitor(response, state))
    } else {
        PollResult::InProgress {
            status: Some(state.to_string()),
        }
    }
}

fn unexpected_status(response: &HttpResponse) -> PollerError {
    PollerError::malformed(format!(
        "{} answered {} which is neither pending nor a terminal success",
        response.url(),
        response.status()
    ))
}
