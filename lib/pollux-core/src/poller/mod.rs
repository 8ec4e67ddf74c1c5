//! Long-running operation pollers.
//!
//! A [`Poller`] is created from the initial response of an operation, or
//! resumed from a [`ResumeToken`]. It follows the operation through one of
//! the [`PollingStrategy`] shapes until it succeeds or fails, then decodes
//! the final result.
//!
//! ```text
//! Created ──▶ InProgress ──▶ Succeeded
//!    │            │  ▲
//!    │            └──┘ poll
//!    └────────────┴──▶ Failed
//! ```

use std::any::type_name;
use std::marker::PhantomData;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use headers::Header as _;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::decode::DecodeError;
use crate::response_error::ResponseError;
use crate::transport::{HttpResponse, PollRequest, Transport};

mod error;
pub use self::error::PollerError;

mod handle;
use self::handle::OperationHandle;
pub use self::handle::PollingStrategy;

mod options;
pub use self::options::{
    DEFAULT_POLL_FREQUENCY, FinalStateVia, PollUntilDoneOptions, PollerOptions,
};

mod state;
use self::state::{State, classify, reported_failure};
pub use self::state::{PollResult, PollerStatus};

mod token;
pub use self::token::ResumeToken;

/// Follows a long-running operation until it reaches a terminal state.
///
/// `R` is the type of the final result (`()` for operations without one),
/// `T` the transport used to poll.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo(initial: pollux_core::HttpResponse) -> Result<(), pollux_core::PollerError> {
/// use std::time::Duration;
/// use pollux_core::{Poller, PollerOptions, PollUntilDoneOptions};
///
/// let mut poller = Poller::<serde_json::Value>::create(
///     initial,
///     reqwest::Client::new(),
///     PollerOptions::new("Disks_CreateOrUpdate"),
/// )?;
/// let disk = poller
///     .poll_until_done(&PollUntilDoneOptions::default().with_frequency(Duration::from_secs(1)))
///     .await?;
/// # let _ = disk;
/// # Ok(())
/// # }
/// ```
#[derive(derive_more::Debug)]
pub struct Poller<R, T = reqwest::Client> {
    #[debug(skip)]
    transport: T,
    options: PollerOptions,
    handle: OperationHandle,
    state: State,
    retry_after: Option<Duration>,
    #[debug(skip)]
    result: PhantomData<fn() -> R>,
}

impl<R, T> Poller<R, T>
where
    R: DeserializeOwned,
    T: Transport,
{
    /// Creates a poller from the initial response of an operation.
    ///
    /// A non-`2xx` initial response, or a terminal body reporting a failure,
    /// yields a poller already `Failed`; an already-complete operation yields
    /// a poller already `Succeeded`.
    ///
    /// # Errors
    ///
    /// Fails with [`PollerError::MalformedResponse`] when the response can be
    /// neither polled nor read as terminal.
    pub fn create(
        response: HttpResponse,
        transport: T,
        options: PollerOptions,
    ) -> Result<Self, PollerError> {
        let handle = OperationHandle::from_initial(&response)?;
        debug!(
            operation = options.operation(),
            strategy = %handle.strategy,
            poll_url = %handle.poll_url,
            "creating poller"
        );
        let mut poller = Self {
            transport,
            retry_after: retry_after(&response),
            options,
            handle,
            state: State::Created,
            result: PhantomData,
        };
        poller.classify_initial(&response)?;

        Ok(poller)
    }

    /// Rebuilds an in-progress poller from a resume token.
    ///
    /// No request is sent; the next [`Self::poll`] hits the same URL the
    /// original poller would have.
    ///
    /// # Errors
    ///
    /// Fails with [`PollerError::InvalidToken`] when the token is unreadable
    /// or belongs to another operation.
    pub fn resume(
        token: &ResumeToken,
        transport: T,
        options: PollerOptions,
    ) -> Result<Self, PollerError> {
        let handle = token.decode(options.operation())?;
        info!(
            operation = options.operation(),
            poll_url = %handle.poll_url,
            "resuming poller"
        );

        Ok(Self {
            transport,
            options,
            handle,
            state: State::InProgress,
            retry_after: None,
            result: PhantomData,
        })
    }

    fn classify_initial(&mut self, response: &HttpResponse) -> Result<(), PollerError> {
        let next = if !response.status().is_success() {
            State::Failed(ResponseError::from_response(response))
        } else if self.handle.strategy != PollingStrategy::Immediate {
            State::InProgress
        } else if let Some(error) = reported_failure(response) {
            State::Failed(error)
        } else if self
            .options
            .success_status_codes()
            .contains(response.status())
        {
            self.handle.last_body = self.final_body(response)?;
            State::Succeeded
        } else {
            return Err(PollerError::malformed(format!(
                "{} {} answered {} which is not a terminal success for {}",
                response.method(),
                response.url(),
                response.status(),
                self.options.operation()
            )));
        };
        self.transition(next);

        Ok(())
    }

    /// Sends exactly one poll request and updates the state.
    ///
    /// On a terminal poller, returns the stored outcome without any request.
    ///
    /// # Errors
    ///
    /// Transport errors are returned verbatim and leave the state unchanged.
    /// So does a response that cannot be classified.
    pub async fn poll(&mut self) -> Result<PollResult, PollerError> {
        match &self.state {
            State::Succeeded => return Ok(PollResult::Succeeded(self.handle.last_body.clone())),
            State::Failed(error) => return Ok(PollResult::Failed(error.clone())),
            State::Created | State::InProgress => {}
        }

        let request = PollRequest::get(self.handle.poll_url.clone());
        debug!(operation = self.options.operation(), url = %request.url, "polling");
        let response = self.transport.send(request).await?;

        let result = classify(
            self.handle.strategy,
            &response,
            self.options.success_status_codes(),
        )?;
        let refreshed = match self.handle.strategy.header() {
            Some(header) if !result.is_terminal() => handle::link(&response, header)?,
            _ => None,
        };
        let (next, last_body, final_link) = match &result {
            PollResult::InProgress { status } => {
                debug!(status = status.as_deref(), "operation still running");
                (State::InProgress, response.body().clone(), None)
            }
            PollResult::Succeeded(_) => (
                State::Succeeded,
                self.final_body(&response)?,
                self.final_link(&response)?,
            ),
            PollResult::Failed(error) => (
                State::Failed(error.clone()),
                response.body().clone(),
                None,
            ),
        };

        if let Some(url) = refreshed {
            self.handle.poll_url = url;
        }
        self.handle.final_link = final_link;
        self.handle.last_status = response.status();
        self.handle.last_body = last_body;
        self.retry_after = retry_after(&response);
        self.transition(next);

        Ok(result)
    }

    /// Whether the operation reached a terminal state.
    pub fn done(&self) -> bool {
        self.status().is_terminal()
    }

    /// The current state.
    pub fn status(&self) -> PollerStatus {
        self.state.status()
    }

    /// The URL the next poll will hit.
    pub fn poll_url(&self) -> &Url {
        &self.handle.poll_url
    }

    /// The strategy followed by this poller.
    pub fn strategy(&self) -> PollingStrategy {
        self.handle.strategy
    }

    /// The last `Retry-After` hint of the service.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// The final result.
    ///
    /// On a terminal poller this sends at most the one request needed to
    /// fetch a final result living elsewhere, then caches it. On a running
    /// poller it behaves like [`Self::poll_until_done`].
    ///
    /// # Errors
    ///
    /// [`PollerError::OperationFailed`] when the operation failed, any
    /// polling error otherwise.
    pub async fn result(&mut self, options: &PollUntilDoneOptions) -> Result<R, PollerError> {
        if self.done() {
            self.final_value(options).await
        } else {
            self.poll_until_done(options).await
        }
    }

    /// Polls until a terminal state, waiting between polls, then returns the
    /// final result.
    ///
    /// The wait is the `Retry-After` of the last response when there was one,
    /// [`PollUntilDoneOptions::frequency`] otherwise.
    ///
    /// # Errors
    ///
    /// [`PollerError::Cancelled`] as soon as the cancellation token fires,
    /// any other polling error as returned by [`Self::poll`].
    pub async fn poll_until_done(
        &mut self,
        options: &PollUntilDoneOptions,
    ) -> Result<R, PollerError> {
        let cancellation = options.cancellation();
        let operation = self.options.operation().to_string();

        while !self.done() {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    warn!(%operation, "polling cancelled");
                    return Err(PollerError::Cancelled);
                }
                result = self.poll() => {
                    result?;
                }
            }
            if self.done() {
                break;
            }

            let delay = options.delay(self.retry_after);
            debug!(?delay, "waiting before the next poll");
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    warn!(%operation, "polling cancelled");
                    return Err(PollerError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.final_value(options).await
    }

    /// A token to resume this poller later, possibly elsewhere.
    ///
    /// # Errors
    ///
    /// [`PollerError::NotResumable`] unless the operation is in progress.
    pub fn resume_token(&self) -> Result<ResumeToken, PollerError> {
        match self.state {
            State::InProgress => ResumeToken::encode(self.options.operation(), &self.handle),
            _ => Err(PollerError::NotResumable {
                state: self.status(),
            }),
        }
    }

    async fn final_value(&mut self, options: &PollUntilDoneOptions) -> Result<R, PollerError> {
        match &self.state {
            State::Succeeded => {}
            State::Failed(error) => return Err(PollerError::OperationFailed(error.clone())),
            State::Created | State::InProgress => {
                return Err(PollerError::malformed(format!(
                    "operation {} has no terminal response yet",
                    self.options.operation()
                )));
            }
        }

        if let Some(url) = self.handle.final_link.clone() {
            debug!(operation = self.options.operation(), %url, "fetching the final result");
            let cancellation = options.cancellation();
            let response = tokio::select! {
                biased;
                () = cancellation.cancelled() => return Err(PollerError::Cancelled),
                response = self.transport.send(PollRequest::get(url)) => response?,
            };
            if !response.status().is_success() {
                return Err(PollerError::OperationFailed(ResponseError::from_response(
                    &response,
                )));
            }
            self.handle.last_status = response.status();
            self.handle.last_body = response.body().clone();
            self.handle.final_link = None;
        }

        decode_body(&self.handle.last_body)
    }

    /// Where to fetch the final result once the poll succeeded, if not in
    /// the terminal response itself.
    fn final_link(&self, terminal: &HttpResponse) -> Result<Option<Url>, PollerError> {
        if !self.handle.strategy.uses_status_monitor() {
            return Ok(None);
        }
        let method = &self.handle.method;
        let link = match self.options.final_state_via() {
            FinalStateVia::OriginalUri => Some(self.handle.original_url.clone()),
            FinalStateVia::Location => self.handle.location.clone(),
            FinalStateVia::StatusMonitor | FinalStateVia::StatusMonitorResult => None,
            FinalStateVia::Auto => match resource_location(terminal)? {
                Some(url) => Some(url),
                None if method == Method::PUT || method == Method::PATCH => {
                    Some(self.handle.original_url.clone())
                }
                None if method == Method::POST => self.handle.location.clone(),
                None => None,
            },
        };

        Ok(link)
    }

    /// The part of a terminal success response holding the result.
    fn final_body(&self, terminal: &HttpResponse) -> Result<Bytes, PollerError> {
        let final_state_via = self.options.final_state_via();
        if final_state_via == FinalStateVia::Auto && self.handle.method == Method::DELETE {
            return Ok(Bytes::new());
        }
        if final_state_via != FinalStateVia::StatusMonitorResult
            || !self.handle.strategy.uses_status_monitor()
        {
            return Ok(terminal.body().clone());
        }
        let result = terminal
            .json_body()
            .and_then(|mut body| body.get_mut("result").map(Value::take))
            .unwrap_or(Value::Null);
        serde_json::to_vec(&result)
            .map(Bytes::from)
            .map_err(|error| PollerError::Decode(DecodeError::Json(error)))
    }

    fn transition(&mut self, next: State) {
        let from = self.state.status();
        let to = next.status();
        if from != to {
            info!(operation = self.options.operation(), %from, %to, "operation state changed");
        }
        if let State::Failed(error) = &next {
            warn!(operation = self.options.operation(), %error, "operation failed");
        }
        self.state = next;
    }
}

/// `resourceLocation` of a status monitor body.
fn resource_location(terminal: &HttpResponse) -> Result<Option<Url>, PollerError> {
    let Some(body) = terminal.json_body() else {
        return Ok(None);
    };
    let Some(location) = body.get("resourceLocation").and_then(Value::as_str) else {
        return Ok(None);
    };
    terminal
        .url()
        .join(location)
        .map(Some)
        .map_err(|error| {
            PollerError::malformed(format!("invalid resourceLocation '{location}': {error}"))
        })
}

/// Decodes a final body, an empty body reads as `null`.
fn decode_body<R: DeserializeOwned>(body: &Bytes) -> Result<R, PollerError> {
    let target = type_name::<R>();
    let result = if body.is_empty() {
        serde_path_to_error::deserialize(Value::Null)
    } else {
        let deserializer = &mut serde_json::Deserializer::from_slice(body);
        serde_path_to_error::deserialize(deserializer)
    };

    result.map_err(|error| {
        let path = error.path().to_string();
        let body = String::from_utf8_lossy(body);
        let body = body.chars().take(crate::transport::BODY_MAX_LENGTH).collect();
        PollerError::Decode(DecodeError::Body {
            target,
            path,
            error: error.into_inner(),
            body,
        })
    })
}

/// The delay asked by the service, from `retry-after-ms`,
/// `x-ms-retry-after-ms` or `Retry-After` (seconds or HTTP date).
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    for header in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(millis) = response
            .header_str(header)
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            return Some(Duration::from_millis(millis));
        }
    }

    let value = response.headers().get(http::header::RETRY_AFTER)?;
    if let Some(seconds) = value
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(seconds));
    }
    let date = headers::Date::decode(&mut std::iter::once(value)).ok()?;
    let at = SystemTime::from(date);
    Some(at.duration_since(SystemTime::now()).unwrap_or_default())
}
