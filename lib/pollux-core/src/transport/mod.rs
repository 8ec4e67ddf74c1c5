use std::future::Future;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use tracing::debug;
use url::Url;

mod error;
pub use self::error::TransportError;

pub(crate) const BODY_MAX_LENGTH: usize = 1024;

/// The single request a poller needs to send: a method and a URL.
///
/// Polling never carries a body, so this is all the transport receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    /// HTTP method, `GET` for every poll and final-state fetch.
    pub method: Method,
    /// Target URL.
    pub url: Url,
}

impl PollRequest {
    /// Creates a `GET` request for the URL.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }
}

/// Abstraction over the HTTP pipeline used to poll.
///
/// Retries, authentication and logging policies belong to the implementation;
/// the poller sends exactly one request per call and surfaces any error verbatim.
///
/// # Example
///
/// ```rust
/// use pollux_core::{HttpResponse, PollRequest, Transport, TransportError};
///
/// struct AlwaysDone;
///
/// impl Transport for AlwaysDone {
///     async fn send(&self, request: PollRequest) -> Result<HttpResponse, TransportError> {
///         Ok(HttpResponse::new(request.method, request.url, http::StatusCode::OK)
///             .with_json(&serde_json::json!({ "status": "Succeeded" })))
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Sends the request and reads the whole response body.
    fn send(
        &self,
        request: PollRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl Transport for reqwest::Client {
    async fn send(&self, request: PollRequest) -> Result<HttpResponse, TransportError> {
        let PollRequest { method, url } = request;
        debug!(%method, %url, "sending...");
        let response = self.request(method.clone(), url).send().await?;
        debug!(?response, "...receiving");
        HttpResponse::from_reqwest(method, response).await
    }
}

/// A fully-read HTTP response, together with the request line that produced it.
///
/// The request method and URL are kept because polling decisions depend on
/// them (relative poll links, `PUT`/`PATCH` final-state rules).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    method: Method,
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    /// Creates an empty-bodied response.
    pub fn new(method: Method, url: Url, status: StatusCode) -> Self {
        Self {
            method,
            url,
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Reads a `reqwest` response into memory.
    ///
    /// # Errors
    ///
    /// Fails if the body cannot be read.
    pub async fn from_reqwest(
        method: Method,
        response: reqwest::Response,
    ) -> Result<Self, TransportError> {
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Self {
            method,
            url,
            status,
            headers,
            body,
        })
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and the matching `Content-Type`.
    #[must_use]
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string())
    }

    /// The method of the request that produced this response.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URL of the request that produced this response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A header value, when present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The body parsed as JSON, `None` when empty or not JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// The body as lossy UTF-8, cut at [`BODY_MAX_LENGTH`] bytes.
    pub(crate) fn body_text_truncated(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        if text.len() <= BODY_MAX_LENGTH {
            return text.into_owned();
        }
        let end = (0..=BODY_MAX_LENGTH)
            .rev()
            .find(|index| text.is_char_boundary(*index))
            .unwrap_or_default();
        format!("{}... (truncated)", text.get(..end).unwrap_or_default())
    }
}
