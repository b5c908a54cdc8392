//! Event-driven seismic waveform acquisition engine.
//!
//! Given a time span and a set of stream filters, the engine pulls an event
//! catalog, resolves the stations around each event, computes per-pair
//! download windows from a travel time model and fetches the waveform
//! segments into an embedded SQLite database, classifying and recording
//! every outcome so that later runs only re-download what is worth
//! retrying.

pub mod classify;
pub mod config;
pub mod credentials;
pub mod fdsn;
pub mod fetch;
pub mod geometry;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod routing;
pub mod store;
pub mod testing;
pub mod traveltime;
pub mod waveform;
pub mod window;

pub use classify::{classify, ExchangeView, OutcomeKind};
pub use config::{load_config, load_config_from_str, ConfigError, DownloadConfig};
pub use orchestrator::{DownloadOrchestrator, DownloadReport, OrchestratorError, Stage};
pub use store::SqliteStore;
