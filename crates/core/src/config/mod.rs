mod loader;
mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    AdvancedSettings, ChannelFilters, DataSource, DownloadConfig, EventSource, RawConfig,
    StreamMatcher, UpdateMetadata,
};
pub(crate) use types::parse_datetime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
