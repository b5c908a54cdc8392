//! Types for the download orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::OutcomeKind;

/// Errors that end a run. Per-segment failures are outcomes, not errors;
/// only conditions that make the rest of the run meaningless land here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("routing error: {0}")]
    Routing(#[from] crate::routing::RoutingError),

    #[error("travel time model error: {0}")]
    Model(#[from] crate::traveltime::ModelError),

    #[error("event fetch failed: {0}")]
    EventFetch(String),

    #[error("event catalog unreadable: {0}")]
    EventParse(#[from] crate::fdsn::ParseError),

    /// Every station service failed and the store holds no channels either.
    #[error("no stations available: services unreachable and store is empty")]
    EmptyStationSet,
}

/// The stages a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchEvents,
    FetchStations,
    BuildWindows,
    FetchWaveforms,
    FetchInventories,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FetchEvents => "fetch_events",
            Stage::FetchStations => "fetch_stations",
            Stage::BuildWindows => "build_windows",
            Stage::FetchWaveforms => "fetch_waveforms",
            Stage::FetchInventories => "fetch_inventories",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Aggregated counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadStats {
    pub events: usize,
    pub channels: usize,
    /// (event, channel) pairs inside the search radius with a valid window.
    pub candidates: usize,
    /// Pairs dropped because the travel time lookup missed the table domain.
    pub model_misses: usize,
    /// Stored segments whose outcome made them ineligible for re-download.
    pub skipped_not_eligible: usize,
    /// Stored segments re-downloaded because their window changed.
    pub window_changes: usize,
    /// Waveform outcomes by kind tag.
    pub outcomes: BTreeMap<String, usize>,
    /// Segment rows written, and rows discarded by buffer integrity handling.
    pub rows_written: usize,
    pub rows_discarded: usize,
    pub inventories_saved: usize,
    pub inventory_errors: usize,
    /// Credentials were invalidated mid-run by an unauthorized response.
    pub credentials_expired: bool,
}

impl DownloadStats {
    pub fn count_outcome(&mut self, kind: OutcomeKind) {
        *self.outcomes.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn outcome_count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// Final report of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    pub run_id: i64,
    /// `Done`, or the stage the run stopped in.
    pub final_stage: Stage,
    pub stats: DownloadStats,
}

impl std::fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "run {} finished in stage {}", self.run_id, self.final_stage)?;
        writeln!(
            f,
            "  events: {}  channels: {}  candidates: {}",
            self.stats.events, self.stats.channels, self.stats.candidates
        )?;
        if !self.stats.outcomes.is_empty() {
            write!(f, "  outcomes:")?;
            for (tag, count) in &self.stats.outcomes {
                write!(f, " {tag}={count}")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "  rows written: {}  discarded: {}  inventories: {}",
            self.stats.rows_written, self.stats.rows_discarded, self.stats.inventories_saved
        )
    }
}
