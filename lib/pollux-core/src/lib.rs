//! # Pollux Core
//!
//! Runtime support for generated REST clients of long-running operations.
//!
//! - **[`Poller`]**: follows an operation started by a `PUT`, `PATCH`, `POST`
//!   or `DELETE` until it succeeds or fails, and decodes its final result.
//!   A running poller can be saved as a [`ResumeToken`] and resumed later,
//!   possibly in another process.
//! - **[`decode`]**: decodes polymorphic JSON payloads, whose concrete shape
//!   is selected by a discriminator field, through a [`VariantRegistry`](decode::VariantRegistry).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pollux_core::{HttpResponse, Poller, PollerOptions, PollUntilDoneOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = reqwest::Client::new();
//! let response = client
//!     .delete("https://management.example.com/disks/disk-1")
//!     .send()
//!     .await?;
//! let initial = HttpResponse::from_reqwest(http::Method::DELETE, response).await?;
//!
//! let mut poller = Poller::<(), _>::create(initial, client, PollerOptions::new("Disks_Delete"))?;
//!
//! // Save the operation, to pick it up after a restart
//! let token = poller.resume_token()?;
//! let mut poller =
//!     Poller::<(), _>::resume(&token, reqwest::Client::new(), PollerOptions::new("Disks_Delete"))?;
//!
//! poller
//!     .poll_until_done(&PollUntilDoneOptions::default().with_frequency(Duration::from_secs(2)))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! - [`fake::FakeTransport`] replays canned responses, [`fake::PollerResponder`]
//!   scripts a status monitor.
//! - [`test_client::TestClient`] starts a real fake service on a local port.

pub mod decode;
pub mod fake;
mod poller;
mod response_error;
mod status;
pub mod test_client;
mod transport;

pub use self::poller::{
    DEFAULT_POLL_FREQUENCY, FinalStateVia, PollResult, PollUntilDoneOptions, Poller, PollerError,
    PollerOptions, PollerStatus, PollingStrategy, ResumeToken,
};
pub use self::response_error::ResponseError;
pub use self::status::SuccessStatusCodes;
pub use self::transport::{HttpResponse, PollRequest, Transport, TransportError};

// Re-export external types so users don't need to add these crates
pub use http;
pub use tokio_util::sync::CancellationToken;
pub use url::Url;

/// Creates a [`SuccessStatusCodes`] from codes and inclusive ranges.
///
/// ```rust
/// use pollux_core::success_status_codes;
///
/// let codes = success_status_codes!(200, 202-204);
/// assert!(codes.contains(http::StatusCode::NO_CONTENT));
/// assert!(!codes.contains(http::StatusCode::CREATED));
/// ```
#[macro_export]
macro_rules! success_status_codes {
    () => {
        $crate::SuccessStatusCodes::default()
    };

    ($single:literal) => {
        $crate::SuccessStatusCodes::from_single($single)
    };

    ($start:literal - $end:literal) => {
        $crate::SuccessStatusCodes::from_inclusive_range($start..=$end)
    };

    ($first:literal, $($rest:tt)*) => {{
        #[allow(unused_mut)]
        let mut codes = $crate::SuccessStatusCodes::from_single($first);
        $crate::success_status_codes!(@accumulate codes, $($rest)*);
        codes
    }};

    ($start:literal - $end:literal, $($rest:tt)*) => {{
        #[allow(unused_mut)]
        let mut codes = $crate::SuccessStatusCodes::from_inclusive_range($start..=$end);
        $crate::success_status_codes!(@accumulate codes, $($rest)*);
        codes
    }};

    (@accumulate $codes:ident $(,)?) => {};

    (@accumulate $codes:ident, $single:literal $(, $($rest:tt)*)?) => {
        $codes = $codes.add_single($single);
        $( $crate::success_status_codes!(@accumulate $codes, $($rest)*); )?
    };

    (@accumulate $codes:ident, $start:literal - $end:literal $(, $($rest:tt)*)?) => {
        $codes = $codes.add_inclusive_range($start..=$end);
        $( $crate::success_status_codes!(@accumulate $codes, $($rest)*); )?
    };
}
