//! Domain records exchanged between the web services, the store and the
//! orchestrator. `Stored*` variants carry the database row id alongside the
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::OutcomeKind;
use crate::window::TimeWindow;

/// A seismic event from an FDSN event service or a local catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Publisher-assigned identifier, unique within the catalog.
    pub event_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Source depth, km.
    pub depth_km: f64,
    pub magnitude: f64,
    #[serde(default)]
    pub mag_type: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: i64,
    pub event: Event,
}

/// A station as returned by an FDSN station service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub network: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Station epoch start. Part of the station identity: the same code can
    /// reappear with different coordinates after an epoch change.
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Dataselect query URL of the data center serving this station.
    pub datacenter_url: String,
}

/// A channel (sensor stream) belonging to a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub station: Station,
    pub location: String,
    pub channel: String,
    pub sample_rate: f64,
}

impl Channel {
    /// `NET.STA.LOC.CHA` stream identifier, empty location kept empty.
    pub fn seed_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.station.network, self.station.station, self.location, self.channel
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredChannel {
    pub id: i64,
    pub station_id: i64,
    pub channel: Channel,
}

/// The persisted outcome of one waveform request. Exactly one row exists per
/// (channel, event) pair; re-runs update the row in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub channel_id: i64,
    pub event_id: i64,
    /// Source-receiver distance at request time, degrees.
    pub distance_deg: f64,
    pub arrival_time: DateTime<Utc>,
    pub window: TimeWindow,
    pub outcome: OutcomeKind,
    /// HTTP status of the final exchange, when one happened.
    pub status: Option<u16>,
    /// Waveform payload, present only for `Ok` outcomes.
    pub data: Option<Vec<u8>>,
    pub run_id: i64,
}

/// A station inventory document (StationXML), stored as received.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub station_id: i64,
    pub data: Vec<u8>,
    pub run_id: i64,
}
