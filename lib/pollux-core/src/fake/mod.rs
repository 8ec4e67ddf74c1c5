//! In-memory transport for testing pollers without a server.
//!
//! [`FakeTransport`] answers requests from per-URL queues of canned replies;
//! [`PollerResponder`] scripts a whole status-monitor sequence.
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pollux_core::fake::{FakeTransport, PollerResponder};
//! use pollux_core::{Poller, PollerOptions, PollUntilDoneOptions};
//!
//! let transport = FakeTransport::default();
//! let responder = PollerResponder::new(
//!     "https://example.com/disks/disk-1".parse()?,
//!     "https://example.com/operations/1".parse()?,
//! )
//!     .add_non_terminal_response("Running")
//!     .set_terminal_response(serde_json::json!({}));
//! responder.install(&transport).await;
//!
//! let mut poller = Poller::<serde_json::Value, _>::create(
//!     responder.initial_response(http::Method::DELETE),
//!     transport.clone(),
//!     PollerOptions::new("Disks_Delete"),
//! )?;
//! poller
//!     .poll_until_done(&PollUntilDoneOptions::default().with_frequency(std::time::Duration::ZERO))
//!     .await?;
//! assert_eq!(transport.request_count().await, 2);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::transport::{HttpResponse, PollRequest, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    Failure(String),
}

#[derive(Debug, Default)]
struct Inner {
    replies: HashMap<(Method, String), VecDeque<Reply>>,
    requests: Vec<PollRequest>,
}

/// A [`Transport`] replaying queued replies, keyed by method and URL.
///
/// Clones share the same queues, so a test can keep one clone to inspect the
/// requests while the poller owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTransport {
    /// Queues a response for the next `method url` request.
    pub async fn enqueue(&self, method: Method, url: Url, response: HttpResponse) {
        self.push(method, url, Reply::Response(response)).await;
    }

    /// Queues a transport failure for the next `method url` request.
    pub async fn enqueue_error(&self, method: Method, url: Url, message: impl Into<String>) {
        self.push(method, url, Reply::Failure(message.into())).await;
    }

    async fn push(&self, method: Method, url: Url, reply: Reply) {
        let mut inner = self.inner.lock().await;
        inner
            .replies
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<PollRequest> {
        self.inner.lock().await.requests.clone()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.inner.lock().await.requests.len()
    }

    /// Number of replies not consumed yet.
    pub async fn pending(&self) -> usize {
        self.inner
            .lock()
            .await
            .replies
            .values()
            .map(VecDeque::len)
            .sum()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: PollRequest) -> Result<HttpResponse, TransportError> {
        let mut inner = self.inner.lock().await;
        inner.requests.push(request.clone());
        let key = (request.method.clone(), request.url.to_string());
        let reply = inner.replies.get_mut(&key).and_then(VecDeque::pop_front);
        debug!(method = %request.method, url = %request.url, ?reply, "fake reply");

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Failure(message)) => Err(TransportError::failure(message)),
            None => Err(TransportError::failure(format!(
                "no fake reply for {} {}",
                request.method, request.url
            ))),
        }
    }
}

/// Scripts the status monitor of a long-running operation.
///
/// The initial response is a `202 Accepted` pointing at the monitor through
/// `Operation-Location`; each non-terminal step answers one poll.
#[derive(Debug, Clone)]
pub struct PollerResponder {
    resource_url: Url,
    operation_url: Url,
    steps: Vec<Reply>,
    terminal: Option<HttpResponse>,
}

impl PollerResponder {
    /// A responder for the resource and its operation monitor.
    pub fn new(resource_url: Url, operation_url: Url) -> Self {
        Self {
            resource_url,
            operation_url,
            steps: Vec::new(),
            terminal: None,
        }
    }

    /// The URL polled by the poller.
    pub fn operation_url(&self) -> &Url {
        &self.operation_url
    }

    /// Adds a poll answered with a running status, e.g. `Running`.
    #[must_use]
    pub fn add_non_terminal_response(mut self, status: &str) -> Self {
        let response = self.monitor(StatusCode::OK, json!({ "status": status }));
        self.steps.push(Reply::Response(response));
        self
    }

    /// Adds a poll failing in the transport.
    #[must_use]
    pub fn add_non_terminal_error(mut self, message: impl Into<String>) -> Self {
        self.steps.push(Reply::Failure(message.into()));
        self
    }

    /// Ends with a `Succeeded` monitor whose other members come from `body`.
    #[must_use]
    pub fn set_terminal_response(mut self, body: Value) -> Self {
        let mut monitor = match body {
            Value::Object(members) => members,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut members = serde_json::Map::new();
                members.insert("result".to_string(), other);
                members
            }
        };
        monitor.insert("status".to_string(), json!("Succeeded"));
        self.terminal = Some(self.monitor(StatusCode::OK, Value::Object(monitor)));
        self
    }

    /// Ends with a `Failed` monitor carrying the error.
    #[must_use]
    pub fn set_terminal_error(mut self, code: &str, message: &str) -> Self {
        let body = json!({ "status": "Failed", "error": { "code": code, "message": message } });
        self.terminal = Some(self.monitor(StatusCode::OK, body));
        self
    }

    /// The `202 Accepted` starting the operation.
    pub fn initial_response(&self, method: Method) -> HttpResponse {
        let link = HeaderValue::from_str(self.operation_url.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static("/"));
        HttpResponse::new(method, self.resource_url.clone(), StatusCode::ACCEPTED)
            .with_header(HeaderName::from_static("operation-location"), link)
    }

    /// Queues every scripted poll reply on the transport.
    pub async fn install(&self, transport: &FakeTransport) {
        let replies = self.steps.iter().cloned().chain(self.terminal.clone().map(Reply::Response));
        for reply in replies {
            transport
                .push(Method::GET, self.operation_url.clone(), reply)
                .await;
        }
    }

    fn monitor(&self, status: StatusCode, body: Value) -> HttpResponse {
        HttpResponse::new(Method::GET, self.operation_url.clone(), status).with_json(&body)
    }
}
