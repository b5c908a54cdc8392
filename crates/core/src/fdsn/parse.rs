//! Parsers for the pipe-separated `format=text` FDSN responses and for the
//! routing service `format=post` response.
//!
//! Services are lenient about header rows and blank lines; so are these
//! parsers. A malformed row is an error (the whole response is suspect), but
//! rows missing optional fields parse fine.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::config::parse_datetime;
use crate::models::{Channel, Event, Station};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("response is not valid UTF-8")]
    NotText,
}

fn rows(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

fn field<'a>(cols: &[&'a str], idx: usize, line: usize) -> Result<&'a str, ParseError> {
    cols.get(idx).copied().ok_or(ParseError::MalformedRow {
        line,
        reason: format!("missing column {}", idx + 1),
    })
}

fn parse_f64(s: &str, line: usize, what: &str) -> Result<f64, ParseError> {
    s.trim().parse().map_err(|_| ParseError::MalformedRow {
        line,
        reason: format!("bad {what}: {s:?}"),
    })
}

fn parse_time(s: &str, line: usize) -> Result<DateTime<Utc>, ParseError> {
    parse_datetime(s).map_err(|_| ParseError::MalformedRow {
        line,
        reason: format!("bad timestamp: {s:?}"),
    })
}

/// Parse an event service `format=text` response.
///
/// Columns: EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|
/// Contributor|ContributorID|MagType|Magnitude|MagAuthor|LocationName
pub fn parse_event_text(body: &[u8]) -> Result<Vec<Event>, ParseError> {
    let text = std::str::from_utf8(body).map_err(|_| ParseError::NotText)?;
    let mut events = Vec::new();
    for (line, row) in rows(text) {
        let cols: Vec<&str> = row.split('|').map(str::trim).collect();
        let event_id = field(&cols, 0, line)?;
        if event_id.is_empty() {
            return Err(ParseError::MalformedRow {
                line,
                reason: "empty event id".into(),
            });
        }
        events.push(Event {
            event_id: event_id.to_string(),
            time: parse_time(field(&cols, 1, line)?, line)?,
            latitude: parse_f64(field(&cols, 2, line)?, line, "latitude")?,
            longitude: parse_f64(field(&cols, 3, line)?, line, "longitude")?,
            depth_km: parse_f64(field(&cols, 4, line)?, line, "depth")?,
            magnitude: parse_f64(field(&cols, 10, line)?, line, "magnitude")?,
            mag_type: cols.get(9).filter(|s| !s.is_empty()).map(|s| s.to_string()),
            catalog: cols.get(6).filter(|s| !s.is_empty()).map(|s| s.to_string()),
        });
    }
    debug!(events = events.len(), "parsed event response");
    Ok(events)
}

/// Parse a station service `format=text&level=channel` response into
/// channels, attributing every row to `datacenter_url`.
///
/// Columns: Network|Station|Location|Channel|Latitude|Longitude|Elevation|
/// Depth|Azimuth|Dip|SensorDescription|Scale|ScaleFreq|ScaleUnits|
/// SampleRate|StartTime|EndTime
pub fn parse_channel_text(body: &[u8], datacenter_url: &str) -> Result<Vec<Channel>, ParseError> {
    let text = std::str::from_utf8(body).map_err(|_| ParseError::NotText)?;
    let mut channels = Vec::new();
    for (line, row) in rows(text) {
        let cols: Vec<&str> = row.split('|').map(str::trim).collect();
        let end_time = match cols.get(16).copied().filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_time(s, line)?),
            None => None,
        };
        let station = Station {
            network: field(&cols, 0, line)?.to_string(),
            station: field(&cols, 1, line)?.to_string(),
            latitude: parse_f64(field(&cols, 4, line)?, line, "latitude")?,
            longitude: parse_f64(field(&cols, 5, line)?, line, "longitude")?,
            start_time: parse_time(field(&cols, 15, line)?, line)?,
            end_time,
            datacenter_url: datacenter_url.to_string(),
        };
        channels.push(Channel {
            station,
            location: field(&cols, 2, line)?.to_string(),
            channel: field(&cols, 3, line)?.to_string(),
            sample_rate: parse_f64(field(&cols, 14, line)?, line, "sample rate")?,
        });
    }
    debug!(channels = channels.len(), "parsed channel response");
    Ok(channels)
}

/// Parse a routing service `format=post` response into the dataselect URLs
/// of the matched data centers, in response order, deduplicated.
///
/// The response is a sequence of blocks separated by blank lines; the first
/// line of each block is a dataselect URL, the following lines are stream
/// epochs (which the engine re-derives from the station services).
pub fn parse_routing_response(body: &[u8]) -> Result<Vec<String>, ParseError> {
    let text = std::str::from_utf8(body).map_err(|_| ParseError::NotText)?;
    let mut urls: Vec<String> = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            in_block = false;
            continue;
        }
        if !in_block {
            if !line.contains("://") {
                return Err(ParseError::MalformedRow {
                    line: 0,
                    reason: format!("expected a URL at block start, got {line:?}"),
                });
            }
            if !urls.iter().any(|u| u == line) {
                urls.push(line.to_string());
            }
            in_block = true;
        }
    }
    Ok(urls)
}
