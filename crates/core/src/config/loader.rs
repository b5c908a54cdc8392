use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use std::path::Path;

use super::{types::RawConfig, ConfigError, DownloadConfig};

/// Load configuration from file with environment variable overrides.
///
/// The document format follows the file extension: `.toml` is TOML,
/// anything else is YAML (the conventional format for download configs).
pub fn load_config(path: &Path) -> Result<DownloadConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new().merge(Toml::file(path)),
        _ => Figment::new().merge(Yaml::file(path)),
    };
    let raw: RawConfig = figment
        .merge(Env::prefixed("SEISFETCH_"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    raw.into_config()
}

/// Load configuration from a YAML string (useful for testing).
pub fn load_config_from_str(yaml_str: &str) -> Result<DownloadConfig, ConfigError> {
    let raw: RawConfig = Figment::new()
        .merge(Yaml::string(yaml_str))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    raw.into_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataSource, EventSource};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
dburl: ":memory:"
starttime: "2011-01-01"
endtime: "2011-12-31"
search_radius:
  min: 0.5
  max: 5.0
timespan: [2.0, 5.0]
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.dburl, ":memory:");
        assert_eq!(config.timespan, (2.0, 5.0));
        // defaults
        assert!(matches!(config.dataws, DataSource::Eida));
        assert!(matches!(config.eventws, EventSource::Url(ref u) if u.contains("seismicportal")));
        assert_eq!(config.traveltimes_model, "ak135_ttp+");
    }

    #[test]
    fn test_load_config_from_str_missing_required() {
        let result = load_config_from_str("dburl: \":memory:\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/download.yaml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{MINIMAL}").unwrap();
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.dburl, ":memory:");
    }

    #[test]
    fn test_load_config_from_toml_file() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            temp_file,
            r#"
dburl = ":memory:"
starttime = "2011-01-01"
endtime = "2011-12-31"
timespan = [2.0, 5.0]

[search_radius]
min = 0.5
max = 5.0
"#
        )
        .unwrap();
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.timespan, (2.0, 5.0));
    }
}
