//! Download orchestrator implementation.
//!
//! Drives one run through the fixed stage sequence: events, stations,
//! window construction, waveforms, inventories. Metadata stages are
//! sequential; waveform and inventory fetching fan out over the scheduler's
//! worker pool. Stage failures are terminal, segment failures are data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{DownloadConfig, EventSource, StreamMatcher};
use crate::credentials::CredentialManager;
use crate::fdsn::{
    event_query, inventory_query, parse_channel_text, parse_event_text, station_query, WebService,
};
use crate::fetch::{FetchScheduler, WaveformRequest};
use crate::geometry::locations2degrees;
use crate::models::{Event, InventoryRecord, SegmentRecord, StoredChannel, StoredEvent};
use crate::retry::RetryPolicy;
use crate::routing::{Datacenter, RoutingResolver};
use crate::store::{SqliteStore, WriteBuffer};
use crate::traveltime::{ModelError, TravelTimeTable, TravelTimes};
use crate::window::WindowBuilder;

use super::types::{DownloadReport, DownloadStats, OrchestratorError, Stage};
use crate::classify::OutcomeKind;

/// One fully resolved (event, channel) download candidate.
struct Candidate {
    channel_id: i64,
    event_id: i64,
    request: WaveformRequest,
    distance_deg: f64,
    arrival: DateTime<Utc>,
}

/// The download orchestrator: one instance per run.
pub struct DownloadOrchestrator {
    config: DownloadConfig,
    store: Arc<SqliteStore>,
    scheduler: FetchScheduler,
    resolver: RoutingResolver,
    credentials: Arc<CredentialManager>,
    model: Box<dyn TravelTimes>,
}

impl DownloadOrchestrator {
    pub fn new(
        config: DownloadConfig,
        store: Arc<SqliteStore>,
        service: Arc<dyn WebService>,
    ) -> Result<Self, OrchestratorError> {
        let credentials = Arc::new(CredentialManager::resolve(&config.restricted_data)?);
        let scheduler = FetchScheduler::new(service.clone(), credentials.clone(), &config.advanced);
        let resolver = RoutingResolver::new(
            service,
            config.advanced.routing_service_url.clone(),
            Duration::from_secs(config.advanced.s_timeout_secs),
        );
        let model: Box<dyn TravelTimes> =
            Box::new(TravelTimeTable::resolve(&config.traveltimes_model)?);
        Ok(Self {
            config,
            store,
            scheduler,
            resolver,
            credentials,
            model,
        })
    }

    /// Execute the run to completion.
    pub async fn run(&self) -> Result<DownloadReport, OrchestratorError> {
        let run_id = self.store.create_run(Utc::now(), &self.run_provenance())?;
        let mut stats = DownloadStats::default();

        info!(run_id, stage = %Stage::FetchEvents, "starting");
        let events = self.fetch_events().await?;
        let events = self
            .store
            .upsert_events(&events, self.config.update_metadata.overwrite())?;
        stats.events = events.len();
        if events.is_empty() {
            warn!("no events match the requested span and filters");
            return Ok(self.report(run_id, Stage::Done, stats));
        }

        info!(run_id, stage = %Stage::FetchStations, "starting");
        let matcher = self.config.filters.matcher()?;
        let channels = self.fetch_channels(&matcher).await?;
        stats.channels = channels.len();

        if self.config.update_metadata.metadata_only() {
            if self.config.inventory {
                info!(run_id, stage = %Stage::FetchInventories, "starting");
                self.fetch_inventories(run_id, &channels, &mut stats).await?;
            }
            info!(run_id, "metadata-only run, stopping after metadata stages");
            return Ok(self.report(run_id, Stage::Done, stats));
        }

        info!(run_id, stage = %Stage::BuildWindows, "starting");
        let candidates = self.build_candidates(&events, &channels, &mut stats)?;
        stats.candidates = candidates.len();

        info!(run_id, stage = %Stage::FetchWaveforms, candidates = candidates.len(), "starting");
        self.fetch_waveforms(run_id, candidates, &mut stats).await?;

        if self.config.inventory {
            info!(run_id, stage = %Stage::FetchInventories, "starting");
            self.fetch_inventories(run_id, &channels, &mut stats)
                .await?;
        }

        info!(run_id, stage = %Stage::Done, "finished");
        Ok(self.report(run_id, Stage::Done, stats))
    }

    fn report(&self, run_id: i64, final_stage: Stage, stats: DownloadStats) -> DownloadReport {
        DownloadReport {
            run_id,
            final_stage,
            stats,
        }
    }

    fn run_provenance(&self) -> String {
        json!({
            "starttime": self.config.starttime.to_rfc3339(),
            "endtime": self.config.endtime.to_rfc3339(),
            "eventws": match &self.config.eventws {
                EventSource::Url(u) => u.clone(),
                EventSource::File(p) => p.display().to_string(),
            },
            "traveltimes_model": self.config.traveltimes_model,
            "timespan": [self.config.timespan.0, self.config.timespan.1],
        })
        .to_string()
    }

    async fn fetch_events(&self) -> Result<Vec<Event>, OrchestratorError> {
        match &self.config.eventws {
            EventSource::File(path) => {
                let body = std::fs::read(path)
                    .map_err(|e| OrchestratorError::EventFetch(format!("{}: {e}", path.display())))?;
                Ok(parse_event_text(&body)?)
            }
            EventSource::Url(base) => {
                let url = event_query(
                    base,
                    self.config.starttime,
                    self.config.endtime,
                    &self.config.event_params,
                );
                let response = self
                    .scheduler
                    .fetch_events(url)
                    .await
                    .map_err(|e| OrchestratorError::EventFetch(e.to_string()))?;
                match response.status {
                    200 => Ok(parse_event_text(&response.body)?),
                    204 => Ok(Vec::new()),
                    status => Err(OrchestratorError::EventFetch(format!(
                        "event service returned HTTP {status}"
                    ))),
                }
            }
        }
    }

    /// Fetch the channel set from every resolved data center, falling back
    /// to the stored channels when no service is reachable.
    async fn fetch_channels(
        &self,
        matcher: &StreamMatcher,
    ) -> Result<Vec<StoredChannel>, OrchestratorError> {
        let centers = match self
            .resolver
            .resolve(
                &self.config.dataws,
                &self.config.filters,
                self.config.starttime,
                self.config.endtime,
            )
            .await
        {
            Ok(centers) => centers,
            Err(e) => {
                warn!(error = %e, "data center resolution failed, falling back to stored stations");
                return self.stored_channel_fallback(matcher);
            }
        };

        let mut fetched = Vec::new();
        let mut successes = 0usize;
        for center in &centers {
            let url = station_query(
                &center.station_url,
                &self.config.filters,
                self.config.starttime,
                self.config.endtime,
            );
            match self.scheduler.fetch_stations(url).await {
                Ok(response) if response.status == 200 => {
                    match parse_channel_text(&response.body, &center.dataselect_url) {
                        Ok(channels) => {
                            successes += 1;
                            fetched.extend(channels);
                        }
                        Err(e) => {
                            warn!(station_url = %center.station_url, error = %e, "station response unreadable")
                        }
                    }
                }
                Ok(response) if response.status == 204 => successes += 1,
                Ok(response) => {
                    warn!(station_url = %center.station_url, status = response.status, "station service error")
                }
                Err(e) => {
                    warn!(station_url = %center.station_url, error = %e, "station service unreachable")
                }
            }
        }

        if successes == 0 {
            warn!("every station service failed, falling back to stored stations");
            return self.stored_channel_fallback(matcher);
        }

        fetched.retain(|ch| {
            matcher.matches(&ch.station.network, &ch.station.station, &ch.location, &ch.channel)
                && ch.sample_rate >= self.config.min_sample_rate
        });
        debug!(channels = fetched.len(), "channel set after filtering");
        Ok(self
            .store
            .upsert_channels(&fetched, self.config.update_metadata.overwrite())?)
    }

    fn stored_channel_fallback(
        &self,
        matcher: &StreamMatcher,
    ) -> Result<Vec<StoredChannel>, OrchestratorError> {
        let mut stored = self.store.stored_channels()?;
        stored.retain(|sc| {
            let ch = &sc.channel;
            matcher.matches(&ch.station.network, &ch.station.station, &ch.location, &ch.channel)
                && ch.sample_rate >= self.config.min_sample_rate
        });
        if stored.is_empty() {
            return Err(OrchestratorError::EmptyStationSet);
        }
        info!(channels = stored.len(), "using stored channel set");
        Ok(stored)
    }

    /// Cross events with channels into download candidates, applying the
    /// search radius, the travel time model and the retry policy.
    fn build_candidates(
        &self,
        events: &[StoredEvent],
        channels: &[StoredChannel],
        stats: &mut DownloadStats,
    ) -> Result<Vec<Candidate>, OrchestratorError> {
        let builder = WindowBuilder::new(self.config.timespan.0, self.config.timespan.1);
        let policy = RetryPolicy::new(self.config.retry, self.credentials.supplied());
        let existing: HashMap<(i64, i64), _> = self
            .store
            .segment_states()?
            .into_iter()
            .map(|s| ((s.channel_id, s.event_id), s))
            .collect();

        let mut candidates = Vec::new();
        let mut seen_windows: HashSet<(i64, DateTime<Utc>, DateTime<Utc>)> = HashSet::new();
        for event in events {
            let (min_radius, max_radius) = self.config.search_radius.radii(event.event.magnitude);
            for channel in channels {
                let station = &channel.channel.station;
                // station epoch must cover the event time
                if station.start_time > event.event.time
                    || station.end_time.is_some_and(|end| end < event.event.time)
                {
                    continue;
                }
                let distance = locations2degrees(
                    event.event.latitude,
                    event.event.longitude,
                    station.latitude,
                    station.longitude,
                );
                if distance < min_radius || distance > max_radius {
                    continue;
                }
                let travel_time = match self.model.travel_time(distance, event.event.depth_km) {
                    Ok(t) => t,
                    Err(ModelError::OutOfRange { .. }) => {
                        stats.model_misses += 1;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                let (arrival, window) = builder.window_for(event.event.time, travel_time);

                if let Some(state) = existing.get(&(channel.id, event.id)) {
                    if state.window == window {
                        if !policy.eligible(state.outcome) {
                            stats.skipped_not_eligible += 1;
                            continue;
                        }
                    } else {
                        // a margin or model change moved the window: the old
                        // payload no longer answers the request
                        stats.window_changes += 1;
                    }
                }

                if !seen_windows.insert((channel.id, window.start, window.end)) {
                    warn!(
                        channel = %channel.channel.seed_id(),
                        window = %window,
                        "two events map to the same window for this channel"
                    );
                }

                candidates.push(Candidate {
                    channel_id: channel.id,
                    event_id: event.id,
                    request: WaveformRequest {
                        dataselect_url: station.datacenter_url.clone(),
                        network: station.network.clone(),
                        station: station.station.clone(),
                        location: channel.channel.location.clone(),
                        channel: channel.channel.channel.clone(),
                        window,
                    },
                    distance_deg: distance,
                    arrival,
                });
            }
        }
        Ok(candidates)
    }

    /// Run the waveform pool and persist outcomes through the write buffer.
    async fn fetch_waveforms(
        &self,
        run_id: i64,
        candidates: Vec<Candidate>,
        stats: &mut DownloadStats,
    ) -> Result<(), OrchestratorError> {
        let results: Vec<(Candidate, crate::fetch::WaveformOutcome)> =
            stream::iter(candidates.into_iter())
                .map(|candidate| async move {
                    let outcome = self.scheduler.fetch_waveform(&candidate.request).await;
                    // invalidate immediately so queued requests go anonymous
                    if outcome.kind == OutcomeKind::Unauthorized && self.credentials.invalidate() {
                        warn!("credentials rejected by data center, continuing anonymously");
                    }
                    (candidate, outcome)
                })
                .buffer_unordered(self.scheduler.workers().max(1))
                .collect()
                .await;

        let mut buffer = WriteBuffer::new(self.config.advanced.db_buf_size);
        for (candidate, outcome) in results {
            stats.count_outcome(outcome.kind);
            let record = SegmentRecord {
                channel_id: candidate.channel_id,
                event_id: candidate.event_id,
                distance_deg: candidate.distance_deg,
                arrival_time: candidate.arrival,
                window: candidate.request.window,
                outcome: outcome.kind,
                status: outcome.status,
                data: outcome.data,
                run_id,
            };
            let report = buffer.push(self.store.as_ref(), record)?;
            stats.rows_written += report.written;
            stats.rows_discarded += report.discarded;
        }
        let report = buffer.flush(self.store.as_ref())?;
        stats.rows_written += report.written;
        stats.rows_discarded += report.discarded;
        stats.credentials_expired = self.credentials.expired();
        Ok(())
    }

    /// Download StationXML for every station holding segment data, from this
    /// run or any earlier one, that has no inventory yet (all of them with
    /// metadata updates enabled). Inventory failures never fail the run.
    async fn fetch_inventories(
        &self,
        run_id: i64,
        channels: &[StoredChannel],
        stats: &mut DownloadStats,
    ) -> Result<(), OrchestratorError> {
        let with_data: HashSet<i64> = self
            .store
            .stations_with_segment_data()?
            .into_iter()
            .collect();
        let already: HashSet<i64> = if self.config.update_metadata.overwrite() {
            HashSet::new()
        } else {
            self.store.stations_with_inventory()?.into_iter().collect()
        };

        let mut targets: HashMap<i64, (String, String, String)> = HashMap::new();
        for channel in channels {
            if !with_data.contains(&channel.station_id) || already.contains(&channel.station_id) {
                continue;
            }
            let station = &channel.channel.station;
            let station_url = Datacenter::from_dataselect_url(&station.datacenter_url).station_url;
            targets.entry(channel.station_id).or_insert_with(|| {
                (station_url, station.network.clone(), station.station.clone())
            });
        }

        let results: Vec<(i64, Option<Vec<u8>>)> = stream::iter(targets.into_iter())
            .map(|(station_id, (station_url, network, station))| async move {
                let url = inventory_query(&station_url, &network, &station);
                match self.scheduler.fetch_inventory(url).await {
                    Ok(response) if response.status == 200 && !response.body.is_empty() => {
                        (station_id, Some(response.body))
                    }
                    Ok(response) => {
                        warn!(station = %station, status = response.status, "inventory fetch rejected");
                        (station_id, None)
                    }
                    Err(e) => {
                        warn!(station = %station, error = %e, "inventory fetch failed");
                        (station_id, None)
                    }
                }
            })
            .buffer_unordered(self.scheduler.workers().max(1))
            .collect()
            .await;

        let mut buffer = WriteBuffer::new(self.config.advanced.db_buf_size);
        for (station_id, body) in results {
            match body {
                Some(data) => {
                    let report = buffer.push(
                        self.store.as_ref(),
                        InventoryRecord {
                            station_id,
                            data,
                            run_id,
                        },
                    )?;
                    stats.inventories_saved += report.written;
                    stats.rows_discarded += report.discarded;
                }
                None => stats.inventory_errors += 1,
            }
        }
        let report = buffer.flush(self.store.as_ref())?;
        stats.inventories_saved += report.written;
        stats.rows_discarded += report.discarded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::testing::MockWebService;

    fn config(yaml_tail: &str) -> DownloadConfig {
        let yaml = format!(
            r#"
dburl: ":memory:"
starttime: "2016-05-01"
endtime: "2016-05-02"
search_radius:
  min: 0.0
  max: 90.0
dataws: "iris"
timespan: [1.0, 3.0]
{yaml_tail}
"#
        );
        load_config_from_str(&yaml).unwrap()
    }

    #[test]
    fn test_new_resolves_builtin_model() {
        let orchestrator = DownloadOrchestrator::new(
            config(""),
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(MockWebService::new()),
        )
        .unwrap();
        assert_eq!(orchestrator.model.name(), "ak135_ttp");
    }

    #[test]
    fn test_new_rejects_unknown_model() {
        let result = DownloadOrchestrator::new(
            config("traveltimes_model: \"/missing/table.json\""),
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(MockWebService::new()),
        );
        assert!(matches!(result, Err(OrchestratorError::Model(_))));
    }

    #[tokio::test]
    async fn test_event_service_error_is_fatal() {
        let service = Arc::new(MockWebService::new());
        service.enqueue("event", 500, Vec::new());
        let orchestrator = DownloadOrchestrator::new(
            config(""),
            Arc::new(SqliteStore::in_memory().unwrap()),
            service,
        )
        .unwrap();
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::EventFetch(_)));
    }

    #[tokio::test]
    async fn test_no_events_ends_the_run_cleanly() {
        let service = Arc::new(MockWebService::new());
        service.enqueue("event", 204, Vec::new());
        let orchestrator = DownloadOrchestrator::new(
            config(""),
            Arc::new(SqliteStore::in_memory().unwrap()),
            service.clone(),
        )
        .unwrap();
        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.final_stage, Stage::Done);
        assert_eq!(report.stats.events, 0);
        // no station traffic after an empty catalog
        assert_eq!(service.recorded_requests().len(), 1);
    }
}
