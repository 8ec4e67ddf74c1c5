use bytes::Bytes;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::PollerError;
use crate::transport::HttpResponse;

pub(crate) const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
pub(crate) const OPERATION_LOCATION: &str = "operation-location";
pub(crate) const LOCATION: &str = "location";

/// How the poller follows an operation, detected from the initial response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum PollingStrategy {
    /// Poll the `Azure-AsyncOperation` status monitor.
    AzureAsyncOperation,
    /// Poll the `Operation-Location` status monitor.
    OperationLocation,
    /// Poll the `Location` URL of a `202 Accepted` until it stops answering `202`.
    Location,
    /// Poll the original URL until `properties.provisioningState` is terminal.
    Body,
    /// The initial response was already terminal, nothing to poll.
    Immediate,
}

impl PollingStrategy {
    /// The header carrying this strategy's poll link, if any.
    pub(crate) fn header(self) -> Option<&'static str> {
        match self {
            Self::AzureAsyncOperation => Some(AZURE_ASYNC_OPERATION),
            Self::OperationLocation => Some(OPERATION_LOCATION),
            Self::Location => Some(LOCATION),
            Self::Body | Self::Immediate => None,
        }
    }

    /// Whether the poll body is a status monitor (`{"status": ..}`).
    pub(crate) fn uses_status_monitor(self) -> bool {
        matches!(self, Self::AzureAsyncOperation | Self::OperationLocation)
    }
}

/// Everything known about an in-flight operation.
///
/// Created from the initial response, updated by every poll. Only the
/// request line and the links survive a resume token; the body is refetched.
#[derive(Debug, Clone)]
pub(crate) struct OperationHandle {
    pub(crate) strategy: PollingStrategy,
    pub(crate) method: Method,
    pub(crate) original_url: Url,
    pub(crate) poll_url: Url,
    pub(crate) location: Option<Url>,
    pub(crate) final_link: Option<Url>,
    pub(crate) last_status: StatusCode,
    pub(crate) last_body: Bytes,
}

impl OperationHandle {
    /// Detects the polling strategy and links of an initial response.
    ///
    /// Header strategies win over `Location`, which only applies to a
    /// `202 Accepted`. A `202` without any poll link cannot be followed.
    pub(crate) fn from_initial(response: &HttpResponse) -> Result<Self, PollerError> {
        let status = response.status();
        let method = response.method().clone();
        let original_url = response.url().clone();
        let location = link(response, LOCATION)?;

        let (strategy, poll_url) = if let Some(url) = link(response, AZURE_ASYNC_OPERATION)? {
            (PollingStrategy::AzureAsyncOperation, url)
        } else if let Some(url) = link(response, OPERATION_LOCATION)? {
            (PollingStrategy::OperationLocation, url)
        } else if status == StatusCode::ACCEPTED {
            let Some(url) = location.clone() else {
                return Err(PollerError::MalformedResponse {
                    reason: format!(
                        "{method} {original_url} answered 202 Accepted without a poll link"
                    ),
                });
            };
            (PollingStrategy::Location, url)
        } else if status.is_success()
            && (method == Method::PUT || method == Method::PATCH)
            && provisioning_state(response).is_some_and(|state| !is_terminal_state(&state))
        {
            (PollingStrategy::Body, original_url.clone())
        } else {
            (PollingStrategy::Immediate, original_url.clone())
        };

        Ok(Self {
            strategy,
            method,
            original_url,
            poll_url,
            location,
            final_link: None,
            last_status: status,
            last_body: response.body().clone(),
        })
    }
}

/// Reads a link header, resolving relative links against the request URL.
pub(crate) fn link(response: &HttpResponse, header: &str) -> Result<Option<Url>, PollerError> {
    let Some(value) = response.headers().get(header) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|error| PollerError::MalformedResponse {
        reason: format!("header '{header}' is not valid text: {error}"),
    })?;
    if value.trim().is_empty() {
        return Ok(None);
    }
    response
        .url()
        .join(value.trim())
        .map(Some)
        .map_err(|error| PollerError::MalformedResponse {
            reason: format!("header '{header}' holds an invalid URL '{value}': {error}"),
        })
}

/// `properties.provisioningState` of a resource body.
pub(crate) fn provisioning_state(response: &HttpResponse) -> Option<String> {
    response
        .json_body()?
        .get("properties")?
        .get("provisioningState")?
        .as_str()
        .map(str::to_string)
}

/// `status` of a status monitor body.
pub(crate) fn monitor_status(body: &Value) -> Option<&str> {
    body.get("status")?.as_str()
}

pub(crate) fn is_succeeded(state: &str) -> bool {
    state.eq_ignore_ascii_case("succeeded")
}

pub(crate) fn is_failed(state: &str) -> bool {
    ["failed", "canceled", "cancelled"]
        .iter()
        .any(|failed| state.eq_ignore_ascii_case(failed))
}

pub(crate) fn is_terminal_state(state: &str) -> bool {
    is_succeeded(state) || is_failed(state)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn initial(method: Method, status: StatusCode) -> HttpResponse {
        let url = Url::parse("https://management.example.com/subscriptions/s1/disks/disk-1")
            .expect("valid url");
        HttpResponse::new(method, url, status)
    }

    #[test]
    fn test_azure_async_operation_wins_over_other_headers() {
        let response = initial(Method::PUT, StatusCode::CREATED)
            .with_header(
                http::header::HeaderName::from_static(AZURE_ASYNC_OPERATION),
                HeaderValue::from_static("https://management.example.com/operations/a1"),
            )
            .with_header(
                http::header::HeaderName::from_static(OPERATION_LOCATION),
                HeaderValue::from_static("https://management.example.com/operations/o1"),
            );

        let handle = OperationHandle::from_initial(&response).expect("should detect");

        assert_eq!(handle.strategy, PollingStrategy::AzureAsyncOperation);
        assert_eq!(
            handle.poll_url.as_str(),
            "https://management.example.com/operations/a1"
        );
    }

    #[test]
    fn test_relative_operation_location_is_resolved() {
        let response = initial(Method::POST, StatusCode::ACCEPTED).with_header(
            http::header::HeaderName::from_static(OPERATION_LOCATION),
            HeaderValue::from_static("/operations/o1?api-version=2024-01-01"),
        );

        let handle = OperationHandle::from_initial(&response).expect("should detect");

        assert_eq!(handle.strategy, PollingStrategy::OperationLocation);
        assert_eq!(
            handle.poll_url.as_str(),
            "https://management.example.com/operations/o1?api-version=2024-01-01"
        );
    }

    #[test]
    fn test_location_on_accepted() {
        let response = initial(Method::DELETE, StatusCode::ACCEPTED).with_header(
            http::header::LOCATION,
            HeaderValue::from_static("https://management.example.com/locations/l1"),
        );

        let handle = OperationHandle::from_initial(&response).expect("should detect");

        assert_eq!(handle.strategy, PollingStrategy::Location);
        assert_eq!(handle.location, Some(handle.poll_url.clone()));
    }

    #[test]
    fn test_accepted_without_link_is_malformed() {
        let response = initial(Method::DELETE, StatusCode::ACCEPTED);

        let error = OperationHandle::from_initial(&response).expect_err("should fail");

        insta::assert_snapshot!(error, @"Malformed response: DELETE https://management.example.com/subscriptions/s1/disks/disk-1 answered 202 Accepted without a poll link");
    }

    #[test]
    fn test_invalid_link_is_malformed() {
        let response = initial(Method::POST, StatusCode::ACCEPTED).with_header(
            http::header::HeaderName::from_static(OPERATION_LOCATION),
            HeaderValue::from_static("http://[::1"),
        );

        let error = OperationHandle::from_initial(&response).expect_err("should fail");

        assert!(matches!(error, PollerError::MalformedResponse { .. }));
    }

    #[test]
    fn test_body_polling_for_put_in_progress() {
        let response = initial(Method::PUT, StatusCode::CREATED)
            .with_json(&json!({ "name": "disk-1", "properties": { "provisioningState": "Updating" } }));

        let handle = OperationHandle::from_initial(&response).expect("should detect");

        assert_eq!(handle.strategy, PollingStrategy::Body);
        assert_eq!(handle.poll_url, handle.original_url);
    }

    #[test]
    fn test_terminal_put_is_immediate() {
        let response = initial(Method::PUT, StatusCode::OK)
            .with_json(&json!({ "name": "disk-1", "properties": { "provisioningState": "Succeeded" } }));

        let handle = OperationHandle::from_initial(&response).expect("should detect");

        assert_eq!(handle.strategy, PollingStrategy::Immediate);
    }

    #[test]
    fn test_state_names_are_case_insensitive() {
        assert!(is_succeeded("SUCCEEDED"));
        assert!(is_failed("Cancelled"));
        assert!(is_failed("canceled"));
        assert!(!is_terminal_state("Running"));
    }
}
