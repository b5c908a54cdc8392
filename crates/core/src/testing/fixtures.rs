//! Response fixtures shared across tests.

use chrono::{DateTime, Utc};

use crate::models::Event;
use crate::waveform::make_record;

pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap()
}

/// One event row in the FDSN `format=text` layout.
pub fn event_row(id: &str, time: &str, lat: f64, lon: f64, depth_km: f64, mag: f64) -> String {
    format!("{id}|{time}|{lat}|{lon}|{depth_km}|AUTH|CAT|CTR|{id}|mw|{mag}|AUTH|SOMEWHERE")
}

/// A full event service response body.
pub fn event_text(rows: &[String]) -> Vec<u8> {
    let mut out = String::from(
        "#EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName\n",
    );
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out.into_bytes()
}

/// One channel row in the station `format=text&level=channel` layout.
pub fn channel_row(
    net: &str,
    sta: &str,
    loc: &str,
    cha: &str,
    lat: f64,
    lon: f64,
    sample_rate: f64,
) -> String {
    channel_row_epoch(net, sta, loc, cha, lat, lon, sample_rate, "1999-01-01T00:00:00", "")
}

/// Like [`channel_row`] but with an explicit station epoch. An empty `end`
/// renders as an open epoch.
#[allow(clippy::too_many_arguments)]
pub fn channel_row_epoch(
    net: &str,
    sta: &str,
    loc: &str,
    cha: &str,
    lat: f64,
    lon: f64,
    sample_rate: f64,
    start: &str,
    end: &str,
) -> String {
    format!(
        "{net}|{sta}|{loc}|{cha}|{lat}|{lon}|0.0|0.0|0.0|-90.0|sensor|1.0|0.02|M/S|{sample_rate}|{start}|{end}"
    )
}

/// A full station service response body.
pub fn channel_text(rows: &[String]) -> Vec<u8> {
    let mut out = String::from(
        "#Network|Station|Location|Channel|Latitude|Longitude|Elevation|Depth|Azimuth|Dip|SensorDescription|Scale|ScaleFreq|ScaleUnits|SampleRate|StartTime|EndTime\n",
    );
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out.into_bytes()
}

/// A routing service `format=post` response body.
pub fn routing_text(dataselect_urls: &[&str]) -> Vec<u8> {
    let mut out = String::new();
    for url in dataselect_urls {
        out.push_str(url);
        out.push_str("\nXX YYY -- ZZZ 2000-01-01T00:00:00 2100-01-01T00:00:00\n\n");
    }
    out.into_bytes()
}

/// A miniseed payload of consecutive records for one stream, covering
/// `[start, start + seconds)` at 20 Hz.
pub fn miniseed(
    net: &str,
    sta: &str,
    loc: &str,
    cha: &str,
    start: DateTime<Utc>,
    seconds: u32,
) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut t = start;
    let mut remaining = seconds;
    while remaining > 0 {
        let chunk = remaining.min(100);
        payload.extend(make_record(net, sta, loc, cha, t, (chunk * 20) as u16, 20));
        t += chrono::Duration::seconds(chunk as i64);
        remaining -= chunk;
    }
    payload
}

pub fn sample_event(id: &str, time: &str, mag: f64) -> Event {
    Event {
        event_id: id.to_string(),
        time: parse_time(time),
        latitude: 38.0,
        longitude: 25.0,
        depth_km: 10.0,
        magnitude: mag,
        mag_type: Some("mw".into()),
        catalog: None,
    }
}
