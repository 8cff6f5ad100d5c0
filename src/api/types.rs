//! API query and error types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::sim::engine::parse_timestamp;

/// Optional `?at=YYYY-MM-DDTHH:MM` query for time-dependent endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct TimeQuery {
    /// Timestamp to evaluate instead of the current hour.
    pub at: Option<String>,
}

impl TimeQuery {
    /// Parses `at`, if present.
    ///
    /// # Errors
    ///
    /// Returns an `ErrorResponse` naming the expected format.
    pub fn timestamp(&self) -> Result<Option<NaiveDateTime>, ErrorResponse> {
        self.at
            .as_deref()
            .map(|s| {
                parse_timestamp(s).map_err(|e| ErrorResponse {
                    error: format!("`at` must be YYYY-MM-DDTHH:MM, got \"{s}\": {e}"),
                })
            })
            .transpose()
    }
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
