use std::fmt;

use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::transport::HttpResponse;

/// A failure reported by the service inside a response body.
///
/// Built from a non-`2xx` response, or from a terminal status monitor whose
/// `status` is `Failed`/`Canceled`. The service payload is read from
/// `{"error": {"code": .., "message": ..}}`, then from a top-level
/// `{"code": .., "message": ..}`, and falls back to the raw body text.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct ResponseError {
    status: StatusCode,
    code: Option<String>,
    message: String,
    raw_body: String,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

impl ResponseError {
    /// Creates an error from its parts.
    pub fn new(status: StatusCode, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            raw_body: String::new(),
        }
    }

    /// Extracts the service error carried by a response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let raw_body = response.body_text_truncated();
        let detail = response.json_body().and_then(Self::detail);
        Self::from_detail(response.status(), detail, raw_body)
    }

    /// Extracts the error of a failed status monitor body (`{"status": "Failed", "error": {..}}`).
    pub(crate) fn from_status_monitor(response: &HttpResponse, status: &str) -> Self {
        let raw_body = response.body_text_truncated();
        let detail = response.json_body().and_then(Self::detail);
        let mut error = Self::from_detail(response.status(), detail, raw_body);
        if error.code.is_none() {
            error.code = Some(status.to_string());
        }
        error
    }

    fn detail(value: Value) -> Option<ErrorDetail> {
        if let Ok(ErrorEnvelope { error }) = serde_json::from_value(value.clone()) {
            return Some(error);
        }
        serde_json::from_value::<ErrorDetail>(value)
            .ok()
            .filter(|detail| detail.code.is_some() || detail.message.is_some())
    }

    fn from_detail(status: StatusCode, detail: Option<ErrorDetail>, raw_body: String) -> Self {
        let (code, message) = match detail {
            Some(ErrorDetail { code, message }) => (code, message),
            None => (None, None),
        };
        let message = message.unwrap_or_else(|| {
            if raw_body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown failure")
                    .to_string()
            } else {
                raw_body.clone()
            }
        });

        Self {
            status,
            code,
            message,
            raw_body,
        }
    }

    /// Status code of the response that carried the error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Service error code, e.g. `ResourceNotFound`.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Response body, truncated to 1 KiB.
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {} (HTTP {})", self.message, self.status.as_u16()),
            None => write!(f, "{} (HTTP {})", self.message, self.status.as_u16()),
        }
    }
}
