use std::borrow::Cow;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::status::SuccessStatusCodes;

/// Default wait between two polls.
pub const DEFAULT_POLL_FREQUENCY: Duration = Duration::from_secs(30);

/// Where the final result of a successful operation lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum FinalStateVia {
    /// `PUT`/`PATCH` fetch the original URL, `POST` fetches the initial
    /// `Location` when there was one, `DELETE` has no result (it decodes
    /// from `null`). Everything else reads the terminal response.
    #[default]
    Auto,
    /// The terminal status monitor body is the result.
    StatusMonitor,
    /// The `result` member of the terminal status monitor is the result.
    StatusMonitorResult,
    /// Fetch the `Location` of the initial response.
    Location,
    /// Fetch the URL of the initial request.
    OriginalUri,
}

/// Per-operation poller configuration, usually fixed by generated code.
///
/// # Example
///
/// ```rust
/// use pollux_core::{FinalStateVia, PollerOptions, SuccessStatusCodes};
///
/// let options = PollerOptions::new("Disks_Delete")
///     .with_success_status_codes(SuccessStatusCodes::from_single(200).add_single(204))
///     .with_final_state_via(FinalStateVia::StatusMonitor);
///
/// assert_eq!(options.operation(), "Disks_Delete");
/// ```
#[derive(Debug, Clone)]
pub struct PollerOptions {
    operation: Cow<'static, str>,
    success_status_codes: SuccessStatusCodes,
    final_state_via: FinalStateVia,
}

impl PollerOptions {
    /// Options for the named operation, with the default terminal success codes.
    pub fn new(operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            operation: operation.into(),
            success_status_codes: SuccessStatusCodes::default(),
            final_state_via: FinalStateVia::default(),
        }
    }

    /// Sets the HTTP codes that mark terminal success for this operation.
    #[must_use]
    pub fn with_success_status_codes(mut self, success_status_codes: SuccessStatusCodes) -> Self {
        self.success_status_codes = success_status_codes;
        self
    }

    /// Sets where the final result lives.
    #[must_use]
    pub fn with_final_state_via(mut self, final_state_via: FinalStateVia) -> Self {
        self.final_state_via = final_state_via;
        self
    }

    /// Name of the operation, embedded in resume tokens.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Terminal success codes.
    pub fn success_status_codes(&self) -> &SuccessStatusCodes {
        &self.success_status_codes
    }

    /// Where the final result lives.
    pub fn final_state_via(&self) -> FinalStateVia {
        self.final_state_via
    }
}

/// How [`Poller::poll_until_done`](super::Poller::poll_until_done) waits.
#[derive(Debug, Clone)]
pub struct PollUntilDoneOptions {
    frequency: Duration,
    cancellation: Option<CancellationToken>,
    honor_retry_after: bool,
}

impl Default for PollUntilDoneOptions {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_POLL_FREQUENCY,
            cancellation: None,
            honor_retry_after: true,
        }
    }
}

impl PollUntilDoneOptions {
    /// Sets the wait between two polls.
    #[must_use]
    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    /// Stops waiting as soon as the token is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Always waits [`Self::frequency`], even when the service sent `Retry-After`.
    #[must_use]
    pub fn ignore_retry_after(mut self) -> Self {
        self.honor_retry_after = false;
        self
    }

    /// The wait between two polls.
    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone().unwrap_or_default()
    }

    pub(crate) fn delay(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) if self.honor_retry_after => delay,
            _ => self.frequency,
        }
    }
}
