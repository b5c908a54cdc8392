//! Configuration types.
//!
//! The configuration document is deliberately loose: many keys have short
//! aliases (`minlat`/`minlatitude`), several accept more than one shape
//! (string or list, bool or `"only"`). All of that is resolved here, at the
//! boundary, into one canonical validated [`DownloadConfig`]; nothing past
//! this module ever sees an alias.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::credentials::RestrictedData;
use crate::geometry::SearchRadius;
use crate::retry::RetryFlags;

/// Loose configuration document, straight from the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub dburl: String,

    #[serde(alias = "start")]
    pub starttime: String,
    #[serde(alias = "end")]
    pub endtime: String,

    /// Event web service: URL, local file path or named shortcut.
    #[serde(default = "default_eventws")]
    pub eventws: String,

    #[serde(default, alias = "minlat")]
    pub minlatitude: Option<f64>,
    #[serde(default, alias = "maxlat")]
    pub maxlatitude: Option<f64>,
    #[serde(default, alias = "minlon")]
    pub minlongitude: Option<f64>,
    #[serde(default, alias = "maxlon")]
    pub maxlongitude: Option<f64>,
    #[serde(default)]
    pub mindepth: Option<f64>,
    #[serde(default)]
    pub maxdepth: Option<f64>,
    #[serde(default, alias = "minmag")]
    pub minmagnitude: Option<f64>,
    #[serde(default, alias = "maxmag")]
    pub maxmagnitude: Option<f64>,

    /// Free-form passthrough appended to the event query.
    #[serde(default)]
    pub eventws_params: BTreeMap<String, toml::Value>,

    #[serde(default, alias = "net")]
    pub network: StringOrList,
    #[serde(default, alias = "sta")]
    pub station: StringOrList,
    #[serde(default, alias = "loc")]
    pub location: StringOrList,
    #[serde(default, alias = "cha", alias = "channels")]
    pub channel: StringOrList,

    #[serde(default)]
    pub min_sample_rate: f64,

    #[serde(default)]
    pub update_metadata: UpdateMetadata,
    #[serde(default)]
    pub inventory: bool,

    pub search_radius: SearchRadius,

    /// Data web service: URL or shortcut (`iris`, `eida`).
    #[serde(default = "default_dataws")]
    pub dataws: String,

    #[serde(default = "default_model")]
    pub traveltimes_model: String,

    /// `[pre, post]` margins around the arrival time, minutes.
    pub timespan: Vec<f64>,

    #[serde(default)]
    pub restricted_data: RestrictedData,

    #[serde(flatten)]
    pub retry: RetryFlags,

    #[serde(default)]
    pub advanced_settings: RawAdvancedSettings,
}

fn default_eventws() -> String {
    "emsc".to_string()
}

fn default_dataws() -> String {
    "eida".to_string()
}

fn default_model() -> String {
    "ak135_ttp+".to_string()
}

/// A key accepting either a single string or a list of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        StringOrList::One("*".to_string())
    }
}

impl StringOrList {
    /// Flatten to a pattern list; comma-separated strings are split.
    pub fn into_patterns(self) -> Vec<String> {
        let items = match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        };
        let mut out: Vec<String> = items
            .iter()
            .flat_map(|s| s.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if out.is_empty() {
            out.push("*".to_string());
        }
        out
    }
}

/// `update_metadata`: `false`, `true` or the literal `"only"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMetadata {
    #[default]
    Never,
    Always,
    Only,
}

impl UpdateMetadata {
    /// Stations/channels/events may overwrite existing rows.
    pub fn overwrite(self) -> bool {
        !matches!(self, UpdateMetadata::Never)
    }

    /// The run stops after the metadata stages.
    pub fn metadata_only(self) -> bool {
        matches!(self, UpdateMetadata::Only)
    }
}

impl<'de> Deserialize<'de> for UpdateMetadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bool(bool),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Bool(true) => Ok(UpdateMetadata::Always),
            Repr::Bool(false) => Ok(UpdateMetadata::Never),
            Repr::Text(s) if s.eq_ignore_ascii_case("only") => Ok(UpdateMetadata::Only),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "update_metadata: expected true, false or \"only\", got {s:?}"
            ))),
        }
    }
}

/// Raw `advanced_settings` block, negative/zero values still allowed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawAdvancedSettings {
    pub routing_service_url: String,
    pub download_blocksize: i64,
    pub max_thread_workers: i64,
    pub e_timeout: u64,
    pub s_timeout: u64,
    pub i_timeout: u64,
    pub w_timeout: u64,
    pub db_buf_size: usize,
}

impl Default for RawAdvancedSettings {
    fn default() -> Self {
        Self {
            routing_service_url: "http://www.orfeus-eu.org/eidaws/routing/1/query".to_string(),
            download_blocksize: 1024 * 1024,
            max_thread_workers: 0,
            e_timeout: 120,
            s_timeout: 120,
            i_timeout: 60,
            w_timeout: 30,
            db_buf_size: 100,
        }
    }
}

/// Normalized advanced settings.
#[derive(Debug, Clone)]
pub struct AdvancedSettings {
    pub routing_service_url: String,
    /// Block size in bytes for blocked fetching; `None` = single fetch.
    pub download_blocksize: Option<u64>,
    /// Worker pool size; `None` = derive from available parallelism.
    pub max_thread_workers: Option<usize>,
    pub e_timeout_secs: u64,
    pub s_timeout_secs: u64,
    pub i_timeout_secs: u64,
    pub w_timeout_secs: u64,
    pub db_buf_size: usize,
}

impl RawAdvancedSettings {
    fn normalize(self) -> AdvancedSettings {
        AdvancedSettings {
            routing_service_url: self.routing_service_url,
            // zero and negative both mean "unblocked"
            download_blocksize: (self.download_blocksize > 0)
                .then_some(self.download_blocksize as u64),
            max_thread_workers: (self.max_thread_workers > 0)
                .then_some(self.max_thread_workers as usize),
            e_timeout_secs: self.e_timeout,
            s_timeout_secs: self.s_timeout,
            i_timeout_secs: self.i_timeout,
            w_timeout_secs: self.w_timeout,
            db_buf_size: self.db_buf_size.max(1),
        }
    }
}

/// Where events come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Url(String),
    File(PathBuf),
}

/// Where waveform data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Single FDSN data center, identified by its dataselect query URL.
    Fdsn(String),
    /// EIDA federation: endpoints resolved through the routing service.
    Eida,
}

/// Station/channel code filter patterns (`*`, `?`, leading `!` negation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFilters {
    pub network: Vec<String>,
    pub station: Vec<String>,
    pub location: Vec<String>,
    pub channel: Vec<String>,
}

impl ChannelFilters {
    /// Compile the four pattern lists into one matcher. Pattern syntax
    /// errors cannot occur (the translation escapes everything but `*`/`?`),
    /// but an all-negation list that excludes everything is legal.
    pub fn matcher(&self) -> Result<StreamMatcher, ConfigError> {
        Ok(StreamMatcher {
            network: CodeMatcher::compile(&self.network)?,
            station: CodeMatcher::compile(&self.station)?,
            location: CodeMatcher::compile(&self.location)?,
            channel: CodeMatcher::compile(&self.channel)?,
        })
    }

    /// Positive (non-negated) patterns for a code class, for FDSN query
    /// parameters. Negations are applied locally after the response.
    fn positive(patterns: &[String]) -> Vec<String> {
        patterns
            .iter()
            .filter(|p| !p.starts_with('!'))
            .cloned()
            .collect()
    }

    pub fn fdsn_params(&self) -> [(&'static str, String); 4] {
        let join = |pats: &[String]| {
            let pos = Self::positive(pats);
            if pos.is_empty() {
                "*".to_string()
            } else {
                pos.join(",")
            }
        };
        [
            ("net", join(&self.network)),
            ("sta", join(&self.station)),
            ("loc", join(&self.location)),
            ("cha", join(&self.channel)),
        ]
    }
}

/// Compiled matcher for one code class.
struct CodeMatcher {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
}

impl CodeMatcher {
    fn compile(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for pattern in patterns {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };
            let regex = Self::translate(body)
                .map_err(|e| ConfigError::Validation(format!("bad pattern {pattern:?}: {e}")))?;
            if negated {
                negative.push(regex);
            } else {
                positive.push(regex);
            }
        }
        Ok(Self { positive, negative })
    }

    /// FDSN wildcards to an anchored regex. `--` is the conventional
    /// spelling of the empty location code.
    fn translate(pattern: &str) -> Result<Regex, regex_lite::Error> {
        let body = if pattern == "--" { "" } else { pattern };
        let mut out = String::from("^");
        for c in body.chars() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                c => out.push_str(&regex_lite::escape(&c.to_string())),
            }
        }
        out.push('$');
        Regex::new(&out)
    }

    fn matches(&self, code: &str) -> bool {
        if self.negative.iter().any(|r| r.is_match(code)) {
            return false;
        }
        self.positive.is_empty() || self.positive.iter().any(|r| r.is_match(code))
    }
}

impl std::fmt::Debug for CodeMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeMatcher")
            .field("positive", &self.positive.len())
            .field("negative", &self.negative.len())
            .finish()
    }
}

/// Matcher over full (network, station, location, channel) codes.
#[derive(Debug)]
pub struct StreamMatcher {
    network: CodeMatcher,
    station: CodeMatcher,
    location: CodeMatcher,
    channel: CodeMatcher,
}

impl StreamMatcher {
    pub fn matches(&self, network: &str, station: &str, location: &str, channel: &str) -> bool {
        self.network.matches(network)
            && self.station.matches(station)
            && self.location.matches(location)
            && self.channel.matches(channel)
    }
}

/// Canonical, validated configuration. The only form the engine consumes.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub dburl: String,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub eventws: EventSource,
    /// Event query parameters (geographic/depth/magnitude window plus
    /// passthrough), already stringified.
    pub event_params: BTreeMap<String, String>,
    pub filters: ChannelFilters,
    pub min_sample_rate: f64,
    pub update_metadata: UpdateMetadata,
    pub inventory: bool,
    pub search_radius: SearchRadius,
    pub dataws: DataSource,
    pub traveltimes_model: String,
    /// `(pre, post)` margins in minutes.
    pub timespan: (f64, f64),
    pub restricted_data: RestrictedData,
    pub retry: RetryFlags,
    pub advanced: AdvancedSettings,
}

/// Parse the permissive date/datetime spellings accepted in the document.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, ConfigError> {
    let s = s.trim().trim_end_matches(['Z', 'z']);
    let s = s.replace(' ', "T");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M") {
        return Ok(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(d.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }
    Err(ConfigError::Validation(format!("unparsable date/time: {s:?}")))
}

const EVENT_SHORTCUTS: &[(&str, &str)] = &[
    ("emsc", "http://www.seismicportal.eu/fdsnws/event/1/query"),
    ("isc", "http://www.isc.ac.uk/fdsnws/event/1/query"),
    ("usgs", "https://earthquake.usgs.gov/fdsnws/event/1/query"),
    ("iris", "https://service.iris.edu/fdsnws/event/1/query"),
];

impl RawConfig {
    /// Normalize and validate into the canonical configuration.
    ///
    /// All failures here are fatal and happen before any network activity.
    pub fn into_config(self) -> Result<DownloadConfig, ConfigError> {
        let starttime = parse_datetime(&self.starttime)?;
        let endtime = parse_datetime(&self.endtime)?;
        if endtime <= starttime {
            return Err(ConfigError::Validation(format!(
                "endtime ({endtime}) must be after starttime ({starttime})"
            )));
        }

        validate_dburl(&self.dburl)?;
        self.search_radius.validate()?;

        if self.timespan.len() != 2 {
            return Err(ConfigError::Validation(format!(
                "timespan: expected [pre, post] minutes, got {} items",
                self.timespan.len()
            )));
        }
        let timespan = (self.timespan[0], self.timespan[1]);
        if timespan.0 < 0.0 || timespan.1 < 0.0 {
            return Err(ConfigError::Validation(
                "timespan: margins must be non-negative".into(),
            ));
        }
        if self.min_sample_rate < 0.0 {
            return Err(ConfigError::Validation(
                "min_sample_rate must be non-negative".into(),
            ));
        }

        let eventws = resolve_event_source(&self.eventws)?;
        let dataws = resolve_data_source(&self.dataws)?;

        let mut event_params = BTreeMap::new();
        let mut push = |key: &str, value: Option<f64>| {
            if let Some(v) = value {
                event_params.insert(key.to_string(), format_float(v));
            }
        };
        push("minlatitude", self.minlatitude);
        push("maxlatitude", self.maxlatitude);
        push("minlongitude", self.minlongitude);
        push("maxlongitude", self.maxlongitude);
        push("mindepth", self.mindepth);
        push("maxdepth", self.maxdepth);
        push("minmagnitude", self.minmagnitude);
        push("maxmagnitude", self.maxmagnitude);
        for (key, value) in &self.eventws_params {
            let rendered = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            event_params.insert(key.clone(), rendered);
        }

        let filters = ChannelFilters {
            network: self.network.into_patterns(),
            station: self.station.into_patterns(),
            location: self.location.into_patterns(),
            channel: self.channel.into_patterns(),
        };
        // surface pattern problems now rather than mid-run
        filters.matcher()?;

        Ok(DownloadConfig {
            dburl: self.dburl,
            starttime,
            endtime,
            eventws,
            event_params,
            filters,
            min_sample_rate: self.min_sample_rate,
            update_metadata: self.update_metadata,
            inventory: self.inventory,
            search_radius: self.search_radius,
            dataws,
            traveltimes_model: self.traveltimes_model,
            timespan,
            restricted_data: self.restricted_data.normalize()?,
            retry: self.retry,
            advanced: self.advanced_settings.normalize(),
        })
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn validate_dburl(dburl: &str) -> Result<(), ConfigError> {
    if dburl == ":memory:" || dburl.starts_with("sqlite://") {
        return Ok(());
    }
    if let Some((scheme, _)) = dburl.split_once("://") {
        return Err(ConfigError::Validation(format!(
            "dburl: unsupported scheme {scheme:?} (only the embedded sqlite driver ships)"
        )));
    }
    // bare path
    Ok(())
}

fn resolve_event_source(spec: &str) -> Result<EventSource, ConfigError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ConfigError::Validation("eventws must not be empty".into()));
    }
    if spec.contains("://") {
        return Ok(EventSource::Url(spec.to_string()));
    }
    if let Some((_, url)) = EVENT_SHORTCUTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(spec))
    {
        return Ok(EventSource::Url(url.to_string()));
    }
    let path = Path::new(spec);
    if path.exists() {
        return Ok(EventSource::File(path.to_path_buf()));
    }
    Err(ConfigError::Validation(format!(
        "eventws: {spec:?} is neither a URL, a known shortcut nor an existing file"
    )))
}

fn resolve_data_source(spec: &str) -> Result<DataSource, ConfigError> {
    let spec = spec.trim();
    match spec.to_ascii_lowercase().as_str() {
        "eida" => Ok(DataSource::Eida),
        "iris" => Ok(DataSource::Fdsn(
            "https://service.iris.edu/fdsnws/dataselect/1/query".to_string(),
        )),
        _ if spec.contains("://") => Ok(DataSource::Fdsn(spec.to_string())),
        _ => Err(ConfigError::Validation(format!(
            "dataws: {spec:?} is neither a URL nor a known shortcut (iris, eida)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
dburl: ":memory:"
starttime: "2006-01-01"
endtime: "2016-12-25"
minmagnitude: 4.0
search_radius:
  minmag: 6
  maxmag: 7
  minmag_radius: 3
  maxmag_radius: 3
dataws: "iris"
timespan: [1.0, 3.0]
"#
    }

    fn parse(yaml: &str) -> Result<DownloadConfig, ConfigError> {
        crate::config::load_config_from_str(yaml)
    }

    #[test]
    fn test_minimal_config_normalizes() {
        let cfg = parse(minimal_yaml()).unwrap();
        assert_eq!(cfg.starttime, parse_datetime("2006-01-01").unwrap());
        assert_eq!(cfg.event_params.get("minmagnitude").unwrap(), "4");
        assert_eq!(cfg.timespan, (1.0, 3.0));
        assert!(matches!(cfg.dataws, DataSource::Fdsn(_)));
        assert_eq!(cfg.update_metadata, UpdateMetadata::Never);
        assert!(!cfg.inventory);
        // defaults flow through
        assert_eq!(cfg.advanced.db_buf_size, 100);
        assert_eq!(cfg.advanced.download_blocksize, Some(1024 * 1024));
        assert!(cfg.advanced.max_thread_workers.is_none());
    }

    #[test]
    fn test_aliases_resolve() {
        let yaml = minimal_yaml()
            .replace("starttime", "start")
            .replace("endtime", "end")
            .replace("minmagnitude", "minmag");
        let cfg = parse(&yaml).unwrap();
        assert_eq!(cfg.event_params.get("minmagnitude").unwrap(), "4");
        let yaml = format!("{}\nminlat: -10.5\ncha: \"BH?,HH?\"\n", minimal_yaml());
        let cfg = parse(&yaml).unwrap();
        assert_eq!(cfg.event_params.get("minlatitude").unwrap(), "-10.5");
        assert_eq!(cfg.filters.channel, vec!["BH?", "HH?"]);
    }

    #[test]
    fn test_update_metadata_forms() {
        let cfg = parse(&format!("{}\nupdate_metadata: true\n", minimal_yaml())).unwrap();
        assert_eq!(cfg.update_metadata, UpdateMetadata::Always);
        let cfg = parse(&format!("{}\nupdate_metadata: \"only\"\n", minimal_yaml())).unwrap();
        assert_eq!(cfg.update_metadata, UpdateMetadata::Only);
        assert!(cfg.update_metadata.metadata_only());
        assert!(parse(&format!("{}\nupdate_metadata: \"sometimes\"\n", minimal_yaml())).is_err());
    }

    #[test]
    fn test_blocksize_zero_and_negative_mean_unblocked() {
        for value in ["0", "-5"] {
            let yaml = format!(
                "{}\nadvanced_settings:\n  download_blocksize: {}\n",
                minimal_yaml(),
                value
            );
            let cfg = parse(&yaml).unwrap();
            assert_eq!(cfg.advanced.download_blocksize, None);
        }
    }

    #[test]
    fn test_worker_normalization() {
        let yaml = format!(
            "{}\nadvanced_settings:\n  max_thread_workers: 4\n",
            minimal_yaml()
        );
        assert_eq!(parse(&yaml).unwrap().advanced.max_thread_workers, Some(4));
        let yaml = format!(
            "{}\nadvanced_settings:\n  max_thread_workers: -1\n",
            minimal_yaml()
        );
        assert_eq!(parse(&yaml).unwrap().advanced.max_thread_workers, None);
    }

    #[test]
    fn test_invalid_time_order_rejected() {
        let yaml = minimal_yaml().replace("2016-12-25", "2005-01-01");
        assert!(matches!(parse(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unsupported_dburl_scheme_rejected() {
        let yaml = minimal_yaml().replace(":memory:", "postgres://localhost/seismic");
        assert!(parse(&yaml).is_err());
        let yaml = minimal_yaml().replace(":memory:", "sqlite:///tmp/db.sqlite");
        assert!(parse(&yaml).is_ok());
    }

    #[test]
    fn test_restricted_data_forms() {
        let cfg = parse(&format!("{}\nrestricted_data: \"\"\n", minimal_yaml())).unwrap();
        assert_eq!(cfg.restricted_data, RestrictedData::Anonymous);
        let cfg = parse(&format!(
            "{}\nrestricted_data: [\"user\", \"pass\"]\n",
            minimal_yaml()
        ))
        .unwrap();
        assert_eq!(
            cfg.restricted_data,
            RestrictedData::UserPassword(vec!["user".into(), "pass".into()])
        );
    }

    #[test]
    fn test_eventws_params_passthrough() {
        let yaml = format!(
            "{}\neventws_params:\n  catalog: \"ISC\"\n  limit: 100\n",
            minimal_yaml()
        );
        let cfg = parse(&yaml).unwrap();
        assert_eq!(cfg.event_params.get("catalog").unwrap(), "ISC");
        assert_eq!(cfg.event_params.get("limit").unwrap(), "100");
    }

    #[test]
    fn test_stream_matcher_wildcards_and_negation() {
        let filters = ChannelFilters {
            network: vec!["*".into()],
            station: vec!["*".into()],
            location: vec!["--".into()],
            channel: vec!["BH?".into(), "!BHN".into()],
        };
        let m = filters.matcher().unwrap();
        assert!(m.matches("GE", "APE", "", "BHZ"));
        assert!(!m.matches("GE", "APE", "", "BHN")); // negated
        assert!(!m.matches("GE", "APE", "00", "BHZ")); // location mismatch
        assert!(!m.matches("GE", "APE", "", "HHZ")); // channel mismatch
    }

    #[test]
    fn test_fdsn_params_drop_negations() {
        let filters = ChannelFilters {
            network: vec!["GE".into(), "IV".into()],
            station: vec!["*".into()],
            location: vec!["*".into()],
            channel: vec!["!BHN".into()],
        };
        let params = filters.fdsn_params();
        assert_eq!(params[0], ("net", "GE,IV".to_string()));
        // all-negation list degrades to a wildcard on the wire
        assert_eq!(params[3], ("cha", "*".to_string()));
    }

    #[test]
    fn test_parse_datetime_spellings() {
        assert!(parse_datetime("2006-01-01").is_ok());
        assert!(parse_datetime("2006-01-01T12:31:07").is_ok());
        assert!(parse_datetime("2006-01-01 12:31:07Z").is_ok());
        assert!(parse_datetime("2006-01-01T12:31").is_ok());
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_scenario_fixed_radius_config() {
        // minmag_radius == maxmag_radius: 3 degrees for every magnitude
        let cfg = parse(minimal_yaml()).unwrap();
        for m in [2.0, 4.0, 6.5, 8.0] {
            assert_eq!(cfg.search_radius.radii(m).1, 3.0);
        }
    }
}
