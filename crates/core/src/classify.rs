//! Outcome classification for completed or failed exchanges.
//!
//! Every network exchange maps to exactly one [`OutcomeKind`]. Classification
//! is pure and total: the same observed exchange always yields the same kind,
//! and no exchange is left unclassified.

use serde::{Deserialize, Serialize};

use crate::window::TimeWindow;

/// The fixed set of download outcome kinds recorded per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Payload present and structurally valid for the requested stream.
    Ok,
    /// Server reported success but the requested segment was absent.
    NotFound,
    /// Payload present but failed format validation.
    Malformed,
    /// HTTP 4xx (other than 401/403).
    ClientError,
    /// HTTP 5xx.
    ServerError,
    /// Connection, timeout or DNS failure.
    TransportError,
    /// Payload time range does not intersect the requested window.
    OutOfTimespan,
    /// Explicit empty response; never retried regardless of flags.
    NoContent,
    /// HTTP 401/403; triggers credential re-evaluation.
    Unauthorized,
}

impl OutcomeKind {
    /// Stable text tag used for persistence and reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Ok => "ok",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::Malformed => "malformed",
            OutcomeKind::ClientError => "client_error",
            OutcomeKind::ServerError => "server_error",
            OutcomeKind::TransportError => "transport_error",
            OutcomeKind::OutOfTimespan => "out_of_timespan",
            OutcomeKind::NoContent => "no_content",
            OutcomeKind::Unauthorized => "unauthorized",
        }
    }

    /// Parse the persisted tag back into a kind.
    pub fn parse(s: &str) -> Option<OutcomeKind> {
        Some(match s {
            "ok" => OutcomeKind::Ok,
            "not_found" => OutcomeKind::NotFound,
            "malformed" => OutcomeKind::Malformed,
            "client_error" => OutcomeKind::ClientError,
            "server_error" => OutcomeKind::ServerError,
            "transport_error" => OutcomeKind::TransportError,
            "out_of_timespan" => OutcomeKind::OutOfTimespan,
            "no_content" => OutcomeKind::NoContent,
            "unauthorized" => OutcomeKind::Unauthorized,
            _ => return None,
        })
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the classifier observes about one exchange.
///
/// `status` is `None` for transport-level failures. `actual` and
/// `segment_present`/`payload_valid` are produced by the waveform probe for
/// dataselect responses; non-waveform exchanges set `payload_valid = true`
/// and `segment_present = !payload.is_empty()`.
#[derive(Debug, Clone)]
pub struct ExchangeView<'a> {
    pub status: Option<u16>,
    pub payload: &'a [u8],
    pub requested: TimeWindow,
    /// Time range actually covered by the payload, if determinable.
    pub actual: Option<TimeWindow>,
    /// The requested stream appeared in the (possibly multi-stream) response.
    pub segment_present: bool,
    /// Payload passed format validation.
    pub payload_valid: bool,
}

/// Map one exchange to its outcome kind.
pub fn classify(view: &ExchangeView) -> OutcomeKind {
    let status = match view.status {
        None => return OutcomeKind::TransportError,
        Some(s) => s,
    };
    match status {
        401 | 403 => OutcomeKind::Unauthorized,
        400..=499 => OutcomeKind::ClientError,
        500..=599 => OutcomeKind::ServerError,
        204 => OutcomeKind::NoContent,
        _ if view.payload.is_empty() => OutcomeKind::NoContent,
        _ if !view.segment_present => OutcomeKind::NotFound,
        _ if !view.payload_valid => OutcomeKind::Malformed,
        _ => match view.actual {
            Some(actual) if !actual.intersects(&view.requested) => OutcomeKind::OutOfTimespan,
            _ => OutcomeKind::Ok,
        },
    }
}
