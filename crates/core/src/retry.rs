//! Re-download eligibility for previously stored segments.
//!
//! One boolean flag per retryable outcome kind; expressed as a table lookup
//! so the mapping stays exhaustive and trivially testable instead of nested
//! branching.

use serde::{Deserialize, Serialize};

use crate::classify::OutcomeKind;

/// Per-kind retry flags, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryFlags {
    /// Segment row exists but was never attempted (no outcome recorded).
    #[serde(default = "default_true")]
    pub retry_seg_not_found: bool,
    /// Connection/timeout/DNS failures.
    #[serde(default = "default_true")]
    pub retry_url_err: bool,
    /// Payload failed format validation.
    #[serde(default)]
    pub retry_mseed_err: bool,
    /// HTTP 4xx.
    #[serde(default)]
    pub retry_client_err: bool,
    /// HTTP 5xx.
    #[serde(default)]
    pub retry_server_err: bool,
    /// Payload outside the requested window.
    #[serde(default)]
    pub retry_timespan_err: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RetryFlags {
    fn default() -> Self {
        Self {
            retry_seg_not_found: true,
            retry_url_err: true,
            retry_mseed_err: false,
            retry_client_err: false,
            retry_server_err: false,
            retry_timespan_err: false,
        }
    }
}

/// Decides whether a stored segment is eligible for re-download.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    flags: RetryFlags,
    /// Credentials are supplied for this run.
    credentials_supplied: bool,
}

impl RetryPolicy {
    pub fn new(flags: RetryFlags, credentials_supplied: bool) -> Self {
        Self {
            flags,
            credentials_supplied,
        }
    }

    /// Eligibility of a segment given its last recorded outcome.
    ///
    /// `None` means the row exists but no download was ever completed for it.
    /// `Ok` and `NoContent` are never eligible. A segment previously skipped
    /// as `Unauthorized` becomes unconditionally eligible once credentials
    /// are supplied: credential availability strictly dominates the flags.
    pub fn eligible(&self, last_outcome: Option<OutcomeKind>) -> bool {
        let kind = match last_outcome {
            None => return self.flags.retry_seg_not_found,
            Some(kind) => kind,
        };
        match kind {
            OutcomeKind::Ok | OutcomeKind::NoContent => false,
            OutcomeKind::Unauthorized => self.credentials_supplied,
            OutcomeKind::NotFound => self.flags.retry_seg_not_found,
            OutcomeKind::TransportError => self.flags.retry_url_err,
            OutcomeKind::Malformed => self.flags.retry_mseed_err,
            OutcomeKind::ClientError => self.flags.retry_client_err,
            OutcomeKind::ServerError => self.flags.retry_server_err,
            OutcomeKind::OutOfTimespan => self.flags.retry_timespan_err,
        }
    }
}
