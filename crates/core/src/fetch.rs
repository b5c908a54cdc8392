//! Segment fetch execution.
//!
//! The scheduler owns the per-request-kind timeouts, the worker pool width
//! and the blocked-download logic. Waveform payloads can be pulled in
//! sequential byte-range blocks (`download_blocksize`) so that one huge
//! response cannot hold a worker slot for minutes; the blocks of one segment
//! are always sequential, concurrency exists only across segments.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::classify::{classify, ExchangeView, OutcomeKind};
use crate::config::AdvancedSettings;
use crate::credentials::CredentialManager;
use crate::fdsn::{dataselect_query, WebRequest, WebResponse, WebService};
use crate::waveform;
use crate::window::TimeWindow;

/// One waveform request, fully addressed.
#[derive(Debug, Clone)]
pub struct WaveformRequest {
    pub dataselect_url: String,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub window: TimeWindow,
}

impl WaveformRequest {
    fn seed_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// The classified result of one waveform request.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformOutcome {
    pub kind: OutcomeKind,
    /// HTTP status of the exchange, `None` on transport failure.
    pub status: Option<u16>,
    /// Payload bytes, kept only for `Ok` outcomes.
    pub data: Option<Vec<u8>>,
}

impl WaveformOutcome {
    fn transport_error() -> Self {
        Self {
            kind: OutcomeKind::TransportError,
            status: None,
            data: None,
        }
    }
}

pub struct FetchScheduler {
    service: Arc<dyn WebService>,
    credentials: Arc<CredentialManager>,
    event_timeout: Duration,
    station_timeout: Duration,
    inventory_timeout: Duration,
    waveform_timeout: Duration,
    blocksize: Option<u64>,
    workers: usize,
}

impl FetchScheduler {
    pub fn new(
        service: Arc<dyn WebService>,
        credentials: Arc<CredentialManager>,
        advanced: &AdvancedSettings,
    ) -> Self {
        let workers = advanced.max_thread_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(8)
        });
        Self {
            service,
            credentials,
            event_timeout: Duration::from_secs(advanced.e_timeout_secs),
            station_timeout: Duration::from_secs(advanced.s_timeout_secs),
            inventory_timeout: Duration::from_secs(advanced.i_timeout_secs),
            waveform_timeout: Duration::from_secs(advanced.w_timeout_secs),
            blocksize: advanced.download_blocksize,
            workers,
        }
    }

    /// Concurrency width for waveform and inventory pools.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn fetch_events(&self, url: String) -> Result<WebResponse, crate::fdsn::FetchError> {
        self.service
            .fetch(&WebRequest::new(url, self.event_timeout))
            .await
    }

    pub async fn fetch_stations(&self, url: String) -> Result<WebResponse, crate::fdsn::FetchError> {
        self.service
            .fetch(&WebRequest::new(url, self.station_timeout))
            .await
    }

    pub async fn fetch_inventory(&self, url: String) -> Result<WebResponse, crate::fdsn::FetchError> {
        self.service
            .fetch(&WebRequest::new(url, self.inventory_timeout))
            .await
    }

    /// Fetch and classify one waveform segment.
    ///
    /// With a block size configured the payload is pulled in sequential
    /// `Range` sub-fetches; a transport failure after the first block
    /// degrades the whole segment to a transport error and the partial
    /// bytes are dropped. Servers that ignore `Range` simply answer the
    /// first sub-fetch with the full payload.
    pub async fn fetch_waveform(&self, request: &WaveformRequest) -> WaveformOutcome {
        let url = dataselect_query(
            &request.dataselect_url,
            &request.network,
            &request.station,
            &request.location,
            &request.channel,
            request.window.start,
            request.window.end,
        );

        let (status, payload) = match self.fetch_blocked(&url).await {
            Some(exchange) => exchange,
            None => return WaveformOutcome::transport_error(),
        };

        let info = waveform::probe(&payload, &request.seed_id());
        let kind = classify(&ExchangeView {
            status: Some(status),
            payload: &payload,
            requested: request.window,
            actual: info.actual,
            segment_present: info.matched,
            payload_valid: info.valid,
        });
        debug!(stream = %request.seed_id(), window = %request.window, outcome = %kind, "waveform fetched");

        WaveformOutcome {
            kind,
            status: Some(status),
            data: (kind == OutcomeKind::Ok).then_some(payload),
        }
    }

    /// Returns `None` on transport failure (partial data included).
    async fn fetch_blocked(&self, url: &str) -> Option<(u16, Vec<u8>)> {
        let auth = self.credentials.auth();
        let blocksize = match self.blocksize {
            Some(b) => b,
            None => {
                let mut req = WebRequest::new(url.to_string(), self.waveform_timeout);
                req.auth = auth;
                return match self.service.fetch(&req).await {
                    Ok(r) => Some((r.status, r.body)),
                    Err(e) => {
                        warn!(url = url, error = %e, "waveform fetch failed");
                        None
                    }
                };
            }
        };

        let mut payload = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut req = WebRequest::new(url.to_string(), self.waveform_timeout);
            req.auth = auth.clone();
            req.range = Some((offset, offset + blocksize));
            let response = match self.service.fetch(&req).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = url, offset = offset, partial = payload.len(), error = %e, "waveform block fetch failed, partial bytes dropped");
                    return None;
                }
            };
            if offset == 0 && response.status != 206 {
                // full response, error status or empty: one exchange settles it
                return Some((response.status, response.body));
            }
            if response.status != 206 {
                if response.status == 416 {
                    // ran exactly off the end of the resource
                    return Some((206, payload));
                }
                warn!(url = url, offset = offset, partial = payload.len(), status = response.status, "unexpected status mid-download, partial bytes dropped");
                return None;
            }
            let len = response.body.len() as u64;
            payload.extend(response.body);
            if len < blocksize {
                return Some((206, payload));
            }
            offset += blocksize;
        }
    }
}
