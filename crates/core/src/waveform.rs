//! Shallow waveform payload probe.
//!
//! The engine treats miniseed as an opaque validated blob: no sample data is
//! ever decoded. The probe walks the 512-byte records of a dataselect
//! response and reads only the 48-byte fixed header of each, enough to tell
//! (a) whether the payload is structurally sound, (b) whether the requested
//! stream appears at all in a multi-stream response, and (c) the time range
//! the matching records actually cover. Those three observations feed the
//! request classifier.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::window::TimeWindow;

/// Fixed miniseed v2 record length assumed by the probe.
const RECORD_LEN: usize = 512;

/// What the probe learned about one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformInfo {
    /// All records passed the structural header checks.
    pub valid: bool,
    /// Records for the requested stream were present.
    pub matched: bool,
    /// Time range covered by the matching records, if determinable.
    pub actual: Option<TimeWindow>,
}

impl WaveformInfo {
    fn invalid() -> Self {
        Self {
            valid: false,
            matched: false,
            actual: None,
        }
    }
}

/// Probe a dataselect payload against the requested `stream_id`
/// (`NET.STA.LOC.CHA`, empty location kept empty).
pub fn probe(payload: &[u8], stream_id: &str) -> WaveformInfo {
    if payload.is_empty() || payload.len() % RECORD_LEN != 0 {
        return WaveformInfo::invalid();
    }

    let mut matched = false;
    let mut start: Option<DateTime<Utc>> = None;
    let mut end: Option<DateTime<Utc>> = None;

    for record in payload.chunks(RECORD_LEN) {
        let header = match RecordHeader::parse(record) {
            Some(h) => h,
            None => return WaveformInfo::invalid(),
        };
        if header.stream_id != stream_id {
            continue;
        }
        matched = true;
        let rec_start = match header.start_time() {
            Some(t) => t,
            None => return WaveformInfo::invalid(),
        };
        let rec_end = rec_start + header.span();
        start = Some(start.map_or(rec_start, |s| s.min(rec_start)));
        end = Some(end.map_or(rec_end, |e| e.max(rec_end)));
    }

    let actual = match (start, end) {
        (Some(s), Some(e)) if e > s => Some(TimeWindow { start: s, end: e }),
        _ => None,
    };
    WaveformInfo {
        valid: true,
        matched,
        actual,
    }
}

struct RecordHeader {
    stream_id: String,
    year: u16,
    doy: u16,
    hour: u8,
    minute: u8,
    second: u8,
    fract_1e4: u16,
    num_samples: u16,
    rate_factor: i16,
    rate_multiplier: i16,
}

impl RecordHeader {
    fn parse(record: &[u8]) -> Option<Self> {
        if record.len() < 48 {
            return None;
        }
        // sequence number: six ASCII digits (or spaces), then a quality flag
        if !record[..6].iter().all(|b| b.is_ascii_digit() || *b == b' ') {
            return None;
        }
        if !matches!(record[6], b'D' | b'R' | b'Q' | b'M') {
            return None;
        }

        let field = |range: std::ops::Range<usize>| -> String {
            String::from_utf8_lossy(&record[range]).trim().to_string()
        };
        let station = field(8..13);
        let location = field(13..15);
        let channel = field(15..18);
        let network = field(18..20);
        let stream_id = format!("{network}.{station}.{location}.{channel}");

        let u16_at = |i: usize| u16::from_be_bytes([record[i], record[i + 1]]);
        let i16_at = |i: usize| i16::from_be_bytes([record[i], record[i + 1]]);

        Some(Self {
            stream_id,
            year: u16_at(20),
            doy: u16_at(22),
            hour: record[24],
            minute: record[25],
            second: record[26],
            fract_1e4: u16_at(28),
            num_samples: u16_at(30),
            rate_factor: i16_at(32),
            rate_multiplier: i16_at(34),
        })
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_yo_opt(self.year as i32, self.doy as u32)?;
        let time = NaiveTime::from_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )?;
        let naive = date.and_time(time) + Duration::microseconds(self.fract_1e4 as i64 * 100);
        Some(naive.and_utc())
    }

    fn sample_rate(&self) -> f64 {
        let f = self.rate_factor as f64;
        let m = self.rate_multiplier as f64;
        let mut rate = if self.rate_factor >= 0 { f } else { -1.0 / f };
        if self.rate_multiplier >= 0 {
            rate *= m.max(1.0);
        } else {
            rate /= -m;
        }
        rate
    }

    fn span(&self) -> Duration {
        let rate = self.sample_rate();
        if rate <= 0.0 || self.num_samples == 0 {
            return Duration::zero();
        }
        Duration::microseconds((self.num_samples as f64 / rate * 1_000_000.0) as i64)
    }
}

/// Build a synthetic record for tests and fixtures.
#[doc(hidden)]
pub fn make_record(
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    start: DateTime<Utc>,
    num_samples: u16,
    sample_rate_hz: i16,
) -> Vec<u8> {
    let mut rec = vec![0u8; RECORD_LEN];
    rec[..6].copy_from_slice(b"000001");
    rec[6] = b'D';
    rec[7] = b' ';
    let pad = |s: &str, width: usize| -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(width, b' ');
        v
    };
    rec[8..13].copy_from_slice(&pad(station, 5));
    rec[13..15].copy_from_slice(&pad(location, 2));
    rec[15..18].copy_from_slice(&pad(channel, 3));
    rec[18..20].copy_from_slice(&pad(network, 2));
    let year = start.format("%Y").to_string().parse::<u16>().unwrap();
    let doy = start.format("%j").to_string().parse::<u16>().unwrap();
    rec[20..22].copy_from_slice(&year.to_be_bytes());
    rec[22..24].copy_from_slice(&doy.to_be_bytes());
    rec[24] = start.format("%H").to_string().parse().unwrap();
    rec[25] = start.format("%M").to_string().parse().unwrap();
    rec[26] = start.format("%S").to_string().parse().unwrap();
    rec[28..30].copy_from_slice(&0u16.to_be_bytes());
    rec[30..32].copy_from_slice(&num_samples.to_be_bytes());
    rec[32..34].copy_from_slice(&sample_rate_hz.to_be_bytes());
    rec[34..36].copy_from_slice(&1i16.to_be_bytes());
    rec
}
