//! SQLite-backed download store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{RecordWriter, StoreError};
use crate::classify::OutcomeKind;
use crate::models::{
    Channel, Event, InventoryRecord, SegmentRecord, Station, StoredChannel, StoredEvent,
};
use crate::window::TimeWindow;

/// The persisted identity and last outcome of one (channel, event) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentState {
    pub channel_id: i64,
    pub event_id: i64,
    pub window: TimeWindow,
    /// `None` when the stored tag is unknown (schema from a newer version).
    pub outcome: Option<OutcomeKind>,
}

/// SQLite-backed store for one download database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database named by a configuration `dburl`: a bare path,
    /// `sqlite://<path>` or `:memory:`.
    pub fn open(dburl: &str) -> Result<Self, StoreError> {
        if dburl == ":memory:" {
            return Self::in_memory();
        }
        let path = dburl.strip_prefix("sqlite://").unwrap_or(dburl);
        if path.contains("://") {
            return Err(StoreError::UnsupportedUrl(dburl.to_string()));
        }
        Self::new(Path::new(path))
    }

    /// Create the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- One row per orchestrator execution
            CREATE TABLE IF NOT EXISTS download_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                config TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL UNIQUE,
                time TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                depth_km REAL NOT NULL,
                magnitude REAL NOT NULL,
                mag_type TEXT,
                catalog TEXT
            );

            -- Station identity includes the epoch start: codes get reused
            CREATE TABLE IF NOT EXISTS stations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                network TEXT NOT NULL,
                station TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                datacenter_url TEXT NOT NULL,
                UNIQUE(network, station, start_time)
            );

            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                station_id INTEGER NOT NULL REFERENCES stations(id),
                location TEXT NOT NULL,
                channel TEXT NOT NULL,
                sample_rate REAL NOT NULL,
                UNIQUE(station_id, location, channel)
            );

            -- One row per (channel, event); re-runs update the row in place
            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL REFERENCES channels(id),
                event_id INTEGER NOT NULL REFERENCES events(id),
                distance_deg REAL NOT NULL,
                arrival_time TEXT NOT NULL,
                request_start TEXT NOT NULL,
                request_end TEXT NOT NULL,
                outcome TEXT NOT NULL,
                status INTEGER,
                data BLOB,
                run_id INTEGER NOT NULL REFERENCES download_runs(id),
                UNIQUE(channel_id, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_segments_outcome ON segments(outcome);

            CREATE TABLE IF NOT EXISTS inventories (
                station_id INTEGER PRIMARY KEY REFERENCES stations(id),
                data BLOB NOT NULL,
                run_id INTEGER NOT NULL REFERENCES download_runs(id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Record the start of a run, returning its id.
    pub fn create_run(&self, started_at: DateTime<Utc>, config: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO download_runs (started_at, config) VALUES (?, ?)",
            params![started_at.to_rfc3339(), config],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert or update events, returning them with their row ids.
    ///
    /// Without `overwrite`, rows already present keep their stored values.
    pub fn upsert_events(
        &self,
        events: &[Event],
        overwrite: bool,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            let sql = if overwrite {
                "INSERT INTO events (event_id, time, latitude, longitude, depth_km, magnitude, mag_type, catalog)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(event_id) DO UPDATE SET
                     time = excluded.time, latitude = excluded.latitude,
                     longitude = excluded.longitude, depth_km = excluded.depth_km,
                     magnitude = excluded.magnitude, mag_type = excluded.mag_type,
                     catalog = excluded.catalog"
            } else {
                "INSERT OR IGNORE INTO events (event_id, time, latitude, longitude, depth_km, magnitude, mag_type, catalog)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
            };
            tx.execute(
                sql,
                params![
                    event.event_id,
                    event.time.to_rfc3339(),
                    event.latitude,
                    event.longitude,
                    event.depth_km,
                    event.magnitude,
                    event.mag_type,
                    event.catalog,
                ],
            )?;
            let id: i64 = tx.query_row(
                "SELECT id FROM events WHERE event_id = ?",
                params![event.event_id],
                |row| row.get(0),
            )?;
            stored.push(StoredEvent {
                id,
                event: event.clone(),
            });
        }
        tx.commit().map_err(StoreError::from)?;
        Ok(stored)
    }

    /// Insert or update channels (and their stations), returning row ids.
    pub fn upsert_channels(
        &self,
        channels: &[Channel],
        overwrite: bool,
    ) -> Result<Vec<StoredChannel>, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let mut stored = Vec::with_capacity(channels.len());
        for channel in channels {
            let station = &channel.station;
            let sql = if overwrite {
                "INSERT INTO stations (network, station, latitude, longitude, start_time, end_time, datacenter_url)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(network, station, start_time) DO UPDATE SET
                     latitude = excluded.latitude, longitude = excluded.longitude,
                     end_time = excluded.end_time, datacenter_url = excluded.datacenter_url"
            } else {
                "INSERT OR IGNORE INTO stations (network, station, latitude, longitude, start_time, end_time, datacenter_url)
                 VALUES (?, ?, ?, ?, ?, ?, ?)"
            };
            tx.execute(
                sql,
                params![
                    station.network,
                    station.station,
                    station.latitude,
                    station.longitude,
                    station.start_time.to_rfc3339(),
                    station.end_time.map(|t| t.to_rfc3339()),
                    station.datacenter_url,
                ],
            )?;
            let station_id: i64 = tx.query_row(
                "SELECT id FROM stations WHERE network = ? AND station = ? AND start_time = ?",
                params![station.network, station.station, station.start_time.to_rfc3339()],
                |row| row.get(0),
            )?;

            let sql = if overwrite {
                "INSERT INTO channels (station_id, location, channel, sample_rate)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(station_id, location, channel) DO UPDATE SET
                     sample_rate = excluded.sample_rate"
            } else {
                "INSERT OR IGNORE INTO channels (station_id, location, channel, sample_rate)
                 VALUES (?, ?, ?, ?)"
            };
            tx.execute(
                sql,
                params![station_id, channel.location, channel.channel, channel.sample_rate],
            )?;
            let id: i64 = tx.query_row(
                "SELECT id FROM channels WHERE station_id = ? AND location = ? AND channel = ?",
                params![station_id, channel.location, channel.channel],
                |row| row.get(0),
            )?;
            stored.push(StoredChannel {
                id,
                station_id,
                channel: channel.clone(),
            });
        }
        tx.commit().map_err(StoreError::from)?;
        Ok(stored)
    }

    /// All stored channels, for falling back when station services fail.
    pub fn stored_channels(&self) -> Result<Vec<StoredChannel>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.station_id, c.location, c.channel, c.sample_rate,
                    s.network, s.station, s.latitude, s.longitude, s.start_time, s.end_time, s.datacenter_url
             FROM channels c JOIN stations s ON s.id = c.station_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let start_time: String = row.get(9)?;
            let end_time: Option<String> = row.get(10)?;
            Ok(StoredChannel {
                id: row.get(0)?,
                station_id: row.get(1)?,
                channel: Channel {
                    station: Station {
                        network: row.get(5)?,
                        station: row.get(6)?,
                        latitude: row.get(7)?,
                        longitude: row.get(8)?,
                        start_time: parse_stored_time(&start_time, 9)?,
                        end_time: end_time
                            .as_deref()
                            .map(|s| parse_stored_time(s, 10))
                            .transpose()?,
                        datacenter_url: row.get(11)?,
                    },
                    location: row.get(2)?,
                    channel: row.get(3)?,
                    sample_rate: row.get(4)?,
                },
            })
        })?;
        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    /// Window and last outcome of every stored segment.
    pub fn segment_states(&self) -> Result<Vec<SegmentState>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT channel_id, event_id, request_start, request_end, outcome FROM segments",
        )?;
        let rows = stmt.query_map([], |row| {
            let start: String = row.get(2)?;
            let end: String = row.get(3)?;
            let outcome: String = row.get(4)?;
            Ok(SegmentState {
                channel_id: row.get(0)?,
                event_id: row.get(1)?,
                window: TimeWindow {
                    start: parse_stored_time(&start, 2)?,
                    end: parse_stored_time(&end, 3)?,
                },
                outcome: OutcomeKind::parse(&outcome),
            })
        })?;
        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }
        Ok(states)
    }

    /// Insert or update the single row for the record's (channel, event).
    pub fn write_segment(&self, record: &SegmentRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO segments (channel_id, event_id, distance_deg, arrival_time,
                                   request_start, request_end, outcome, status, data, run_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(channel_id, event_id) DO UPDATE SET
                 distance_deg = excluded.distance_deg,
                 arrival_time = excluded.arrival_time,
                 request_start = excluded.request_start,
                 request_end = excluded.request_end,
                 outcome = excluded.outcome,
                 status = excluded.status,
                 data = excluded.data,
                 run_id = excluded.run_id",
            params![
                record.channel_id,
                record.event_id,
                record.distance_deg,
                record.arrival_time.to_rfc3339(),
                record.window.start.to_rfc3339(),
                record.window.end.to_rfc3339(),
                record.outcome.as_str(),
                record.status,
                record.data,
                record.run_id,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a station's inventory document.
    pub fn write_inventory(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO inventories (station_id, data, run_id) VALUES (?, ?, ?)
             ON CONFLICT(station_id) DO UPDATE SET data = excluded.data, run_id = excluded.run_id",
            params![record.station_id, record.data, record.run_id],
        )?;
        Ok(())
    }

    /// Ids of stations holding at least one segment with waveform data,
    /// from any run. These are the inventory download targets.
    pub fn stations_with_segment_data(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT c.station_id
             FROM segments s JOIN channels c ON c.id = s.channel_id
             WHERE s.data IS NOT NULL AND length(s.data) > 0",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Ids of stations that already have an inventory stored.
    pub fn stations_with_inventory(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT station_id FROM inventories")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn segment_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Stored payload of one segment, for tests and tooling.
    pub fn segment_data(&self, channel_id: i64, event_id: i64) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let data: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT data FROM segments WHERE channel_id = ? AND event_id = ?",
                params![channel_id, event_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data.flatten())
    }
}

/// A stored timestamp that no longer parses is a corrupt row, not a value
/// to guess at; surface it as a column conversion failure.
fn parse_stored_time(s: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl RecordWriter<SegmentRecord> for SqliteStore {
    fn write(&self, record: &SegmentRecord) -> Result<(), StoreError> {
        self.write_segment(record)
    }
}

impl RecordWriter<InventoryRecord> for SqliteStore {
    fn write(&self, record: &InventoryRecord) -> Result<(), StoreError> {
        self.write_inventory(record)
    }
}
