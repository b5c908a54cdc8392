//! Data center resolution.
//!
//! A single-FDSN configuration maps to exactly one data center. An EIDA
//! configuration asks the federation's routing service which data centers
//! hold matching streams, then queries each one's station service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::config::{ChannelFilters, DataSource};
use crate::fdsn::{parse_routing_response, routing_query, FetchError, ParseError, WebRequest, WebService};

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("routing service returned HTTP {0}")]
    HttpStatus(u16),

    #[error("routing response unreadable: {0}")]
    Parse(#[from] ParseError),

    #[error("no data center matches the requested streams")]
    NoDatacenters,
}

/// One FDSN data center, addressed by its two query endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    pub station_url: String,
    pub dataselect_url: String,
}

impl Datacenter {
    /// Derive the sibling station endpoint from a dataselect URL. FDSN
    /// mandates the parallel `/fdsnws/<service>/<major>/query` layout.
    pub fn from_dataselect_url(dataselect_url: &str) -> Self {
        Self {
            station_url: dataselect_url.replace("/dataselect/", "/station/"),
            dataselect_url: dataselect_url.to_string(),
        }
    }
}

pub struct RoutingResolver {
    service: Arc<dyn WebService>,
    routing_url: String,
    timeout: Duration,
}

impl RoutingResolver {
    pub fn new(service: Arc<dyn WebService>, routing_url: String, timeout: Duration) -> Self {
        Self {
            service,
            routing_url,
            timeout,
        }
    }

    /// Resolve the configured data source into concrete data centers.
    pub async fn resolve(
        &self,
        source: &DataSource,
        filters: &ChannelFilters,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Datacenter>, RoutingError> {
        match source {
            DataSource::Fdsn(url) => Ok(vec![Datacenter::from_dataselect_url(url)]),
            DataSource::Eida => {
                let url = routing_query(&self.routing_url, filters, start, end);
                let response = self
                    .service
                    .fetch(&WebRequest::new(url, self.timeout))
                    .await?;
                if response.status == 204 {
                    return Err(RoutingError::NoDatacenters);
                }
                if response.status != 200 {
                    return Err(RoutingError::HttpStatus(response.status));
                }
                let urls = parse_routing_response(&response.body)?;
                if urls.is_empty() {
                    return Err(RoutingError::NoDatacenters);
                }
                info!(datacenters = urls.len(), "routing service resolved data centers");
                Ok(urls
                    .iter()
                    .map(|u| Datacenter::from_dataselect_url(u))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWebService;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn filters() -> ChannelFilters {
        ChannelFilters {
            network: vec!["*".into()],
            station: vec!["*".into()],
            location: vec!["*".into()],
            channel: vec!["*".into()],
        }
    }

    fn resolver(service: Arc<MockWebService>) -> RoutingResolver {
        RoutingResolver::new(
            service,
            "http://www.orfeus-eu.org/eidaws/routing/1/query".into(),
            Duration::from_secs(120),
        )
    }

    #[test]
    fn test_station_url_derivation() {
        let dc = Datacenter::from_dataselect_url(
            "https://geofon.gfz-potsdam.de/fdsnws/dataselect/1/query",
        );
        assert_eq!(
            dc.station_url,
            "https://geofon.gfz-potsdam.de/fdsnws/station/1/query"
        );
    }

    #[tokio::test]
    async fn test_single_fdsn_source_skips_routing() {
        let service = Arc::new(MockWebService::new());
        let url = "https://service.iris.edu/fdsnws/dataselect/1/query";
        let centers = resolver(service.clone())
            .resolve(
                &DataSource::Fdsn(url.into()),
                &filters(),
                t("2011-01-01T00:00:00Z"),
                t("2011-12-31T00:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].dataselect_url, url);
        assert_eq!(service.recorded_requests().len(), 0);
    }

    #[tokio::test]
    async fn test_eida_source_queries_routing_service() {
        let service = Arc::new(MockWebService::new());
        service.enqueue(
            "eidaws/routing",
            200,
            b"https://geofon.gfz-potsdam.de/fdsnws/dataselect/1/query\nGE APE -- BHZ x y\n\nhttp://webservices.ingv.it/fdsnws/dataselect/1/query\nIV ACER -- HHZ x y\n".to_vec(),
        );
        let centers = resolver(service.clone())
            .resolve(
                &DataSource::Eida,
                &filters(),
                t("2011-01-01T00:00:00Z"),
                t("2011-12-31T00:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(centers.len(), 2);
        assert!(centers[1].station_url.contains("/station/"));
    }

    #[tokio::test]
    async fn test_empty_routing_is_an_error() {
        let service = Arc::new(MockWebService::new());
        service.enqueue("eidaws/routing", 204, Vec::new());
        let err = resolver(service)
            .resolve(
                &DataSource::Eida,
                &filters(),
                t("2011-01-01T00:00:00Z"),
                t("2011-12-31T00:00:00Z"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoDatacenters));
    }
}
