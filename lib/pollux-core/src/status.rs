use std::ops::RangeInclusive;

use http::StatusCode;

/// The status codes an operation treats as "terminal success".
///
/// Different operations use different conventions: some answer `200 OK` once
/// finished, others `201 Created` or `204 No Content`. The set is supplied per
/// operation through [`PollerOptions`](crate::PollerOptions) and is never
/// inferred from the response.
///
/// Only `2xx` codes can be members: anything outside `2xx` is always a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessStatusCodes {
    ranges: Vec<StatusCodeRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusCodeRange {
    Single(u16),
    Inclusive(RangeInclusive<u16>),
}

impl SuccessStatusCodes {
    /// Creates the default terminal set: `200`, `201` and `204`.
    pub fn new() -> Self {
        Self {
            ranges: vec![
                StatusCodeRange::Single(200),
                StatusCodeRange::Single(201),
                StatusCodeRange::Single(204),
            ],
        }
    }

    /// Creates a set holding a single status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code is not a `2xx` code.
    pub fn from_single(status: u16) -> Self {
        assert!(
            (200..=299).contains(&status),
            "terminal success status must be a 2xx code, got {status}"
        );

        Self {
            ranges: vec![StatusCodeRange::Single(status)],
        }
    }

    /// Creates a set from an inclusive range.
    ///
    /// # Panics
    ///
    /// Panics if the range leaves `200..=299` or is empty.
    pub fn from_inclusive_range(range: RangeInclusive<u16>) -> Self {
        assert!(
            *range.start() >= 200 && *range.end() <= 299,
            "terminal success range must stay within 200..=299, got {}..={}",
            range.start(),
            range.end()
        );
        assert!(
            range.start() <= range.end(),
            "terminal success range start ({}) must be less than or equal to end ({})",
            range.start(),
            range.end()
        );

        Self {
            ranges: vec![StatusCodeRange::Inclusive(range)],
        }
    }

    /// Creates a set from `http::StatusCode` values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use http::StatusCode;
    /// use pollux_core::SuccessStatusCodes;
    ///
    /// let codes = SuccessStatusCodes::from_status_codes([StatusCode::OK, StatusCode::NO_CONTENT]);
    /// assert!(codes.contains(StatusCode::NO_CONTENT));
    /// assert!(!codes.contains(StatusCode::CREATED));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if one of the codes is not a `2xx` code.
    pub fn from_status_codes(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        let ranges = codes
            .into_iter()
            .map(|code| {
                assert!(
                    code.is_success(),
                    "terminal success status must be a 2xx code, got {}",
                    code.as_u16()
                );
                StatusCodeRange::Single(code.as_u16())
            })
            .collect();
        Self { ranges }
    }

    /// Adds a status code to the set. Non-`2xx` codes are ignored by [`contains`](Self::contains).
    #[must_use]
    pub fn add_single(mut self, status: u16) -> Self {
        self.ranges.push(StatusCodeRange::Single(status));
        self
    }

    /// Adds an inclusive range to the set.
    #[must_use]
    pub fn add_inclusive_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.ranges.push(StatusCodeRange::Inclusive(range));
        self
    }

    /// Checks if the status code marks terminal success.
    pub fn contains(&self, status: StatusCode) -> bool {
        if !status.is_success() {
            return false;
        }
        let status = status.as_u16();
        self.ranges.iter().any(|range| match range {
            StatusCodeRange::Single(single) => *single == status,
            StatusCodeRange::Inclusive(range) => range.contains(&status),
        })
    }
}

impl Default for SuccessStatusCodes {
    fn default() -> Self {
        Self::new()
    }
}
