//! Download run orchestration.

mod runner;
mod types;

pub use runner::DownloadOrchestrator;
pub use types::{DownloadReport, DownloadStats, OrchestratorError, Stage};
