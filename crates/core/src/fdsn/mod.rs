//! FDSN web service access.
//!
//! All remote stations of the pipeline (event, station, dataselect, routing)
//! speak plain HTTP GET with query parameters. The [`WebService`] trait is
//! the single seam between the engine and the network; production uses the
//! reqwest-backed [`HttpService`], tests substitute a scripted mock.

mod parse;

pub use parse::{parse_channel_text, parse_event_text, parse_routing_response, ParseError};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;

use crate::config::ChannelFilters;
use crate::credentials::AuthScheme;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// One outbound HTTP request, fully described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRequest {
    pub url: String,
    pub auth: Option<AuthScheme>,
    pub timeout: Duration,
    /// Byte range `[start, end)` for blocked waveform fetching.
    pub range: Option<(u64, u64)>,
}

impl WebRequest {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            auth: None,
            timeout,
            range: None,
        }
    }
}

/// What came back. Transport failures are `FetchError`; any HTTP status,
/// including errors, is a successful exchange from this layer's viewpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait WebService: Send + Sync {
    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, FetchError>;
}

/// Production `WebService` backed by a shared reqwest client.
pub struct HttpService {
    client: Client,
}

impl HttpService {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("seisfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebService for HttpService {
    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, FetchError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        match &request.auth {
            Some(AuthScheme::Bearer(token)) => {
                builder = builder.bearer_auth(token);
            }
            Some(AuthScheme::Basic { username, password }) => {
                builder = builder.basic_auth(username, Some(password));
            }
            None => {}
        }
        if let Some((start, end)) = request.range {
            builder = builder.header("Range", format!("bytes={}-{}", start, end - 1));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_connect() {
                FetchError::ConnectionFailed(e.to_string())
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        Ok(WebResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// FDSN timestamp without timezone suffix, as services expect it.
pub fn fdsn_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn push_param(url: &mut String, key: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(key);
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}

/// Event service query over a time span, with format forced to `text`.
pub fn event_query(
    base_url: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    params: &BTreeMap<String, String>,
) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();
    push_param(&mut url, "starttime", &fdsn_time(start));
    push_param(&mut url, "endtime", &fdsn_time(end));
    for (key, value) in params {
        if matches!(key.as_str(), "starttime" | "endtime" | "format") {
            continue;
        }
        push_param(&mut url, key, value);
    }
    push_param(&mut url, "format", "text");
    url
}

/// Station service query at channel level, format `text`.
pub fn station_query(
    station_url: &str,
    filters: &ChannelFilters,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let mut url = station_url.trim_end_matches('/').to_string();
    for (key, value) in filters.fdsn_params() {
        push_param(&mut url, key, &value);
    }
    push_param(&mut url, "starttime", &fdsn_time(start));
    push_param(&mut url, "endtime", &fdsn_time(end));
    push_param(&mut url, "level", "channel");
    push_param(&mut url, "format", "text");
    url
}

/// Station service query for one station's inventory (StationXML at
/// response level, the form needed for instrument correction).
pub fn inventory_query(station_url: &str, network: &str, station: &str) -> String {
    let mut url = station_url.trim_end_matches('/').to_string();
    push_param(&mut url, "net", network);
    push_param(&mut url, "sta", station);
    push_param(&mut url, "level", "response");
    url
}

/// Dataselect query for one stream over one time window.
pub fn dataselect_query(
    dataselect_url: &str,
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let mut url = dataselect_url.trim_end_matches('/').to_string();
    push_param(&mut url, "net", network);
    push_param(&mut url, "sta", station);
    // empty location is spelled "--" on the wire
    push_param(&mut url, "loc", if location.is_empty() { "--" } else { location });
    push_param(&mut url, "cha", channel);
    push_param(&mut url, "start", &fdsn_time(start));
    push_param(&mut url, "end", &fdsn_time(end));
    url
}

/// Routing service query asking for dataselect endpoints in `post` format.
pub fn routing_query(
    routing_url: &str,
    filters: &ChannelFilters,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let mut url = routing_url.trim_end_matches('/').to_string();
    for (key, value) in filters.fdsn_params() {
        push_param(&mut url, key, &value);
    }
    push_param(&mut url, "starttime", &fdsn_time(start));
    push_param(&mut url, "endtime", &fdsn_time(end));
    push_param(&mut url, "service", "dataselect");
    push_param(&mut url, "format", "post");
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelFilters;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn filters() -> ChannelFilters {
        ChannelFilters {
            network: vec!["GE".into()],
            station: vec!["*".into()],
            location: vec!["*".into()],
            channel: vec!["BH?".into()],
        }
    }

    #[test]
    fn test_event_query_forces_text_format() {
        let mut params = BTreeMap::new();
        params.insert("minmagnitude".to_string(), "4".to_string());
        params.insert("format".to_string(), "xml".to_string());
        let url = event_query(
            "http://www.seismicportal.eu/fdsnws/event/1/query",
            t("2011-01-01T00:00:00Z"),
            t("2011-12-31T00:00:00Z"),
            &params,
        );
        assert!(url.contains("starttime=2011-01-01T00%3A00%3A00.000000"));
        assert!(url.contains("minmagnitude=4"));
        assert!(url.ends_with("format=text"));
        assert!(!url.contains("format=xml"));
    }

    #[test]
    fn test_station_query_channel_level() {
        let url = station_query(
            "https://geofon.gfz-potsdam.de/fdsnws/station/1/query",
            &filters(),
            t("2011-01-01T00:00:00Z"),
            t("2011-12-31T00:00:00Z"),
        );
        assert!(url.contains("net=GE"));
        assert!(url.contains("cha=BH%3F"));
        assert!(url.contains("level=channel"));
        assert!(url.contains("format=text"));
    }

    #[test]
    fn test_dataselect_query_empty_location() {
        let url = dataselect_query(
            "https://geofon.gfz-potsdam.de/fdsnws/dataselect/1/query",
            "GE",
            "APE",
            "",
            "BHZ",
            t("2016-05-01T10:00:00Z"),
            t("2016-05-01T10:10:00Z"),
        );
        assert!(url.contains("loc=--"));
        assert!(url.contains("start=2016-05-01T10%3A00%3A00.000000"));
    }

    #[test]
    fn test_routing_query() {
        let url = routing_query(
            "http://www.orfeus-eu.org/eidaws/routing/1/query",
            &filters(),
            t("2011-01-01T00:00:00Z"),
            t("2011-12-31T00:00:00Z"),
        );
        assert!(url.contains("service=dataselect"));
        assert!(url.contains("format=post"));
    }
}
