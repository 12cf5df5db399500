//! Graph acquisition
//!
//! [`GraphProvider`] is the boundary contract the expansion controller fetches
//! graphs through. The production implementation queries the Overpass API for
//! the street network inside a bounding box around the start point; tests and
//! alternative data sources implement the same trait. Fetches are the slow,
//! fallible part of planning; every failure is reported as
//! [`Error::GraphFetch`] so the controller can apply its shrink-and-retry
//! policy.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;

use crate::core::error::{Error, Result};
use crate::core::geo::{bbox_around, Coordinate};
use crate::core::graph::{OsmNetwork, OsmWay, RoutableGraph, TravelMode};

/// Global HTTP client shared by all collaborators
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(180)) // Overpass responses can be large
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
});

pub(crate) fn http_client() -> &'static Client {
    &GLOBAL_CLIENT
}

/// Endpoints and identification for the external collaborators
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Overpass API interpreter endpoint
    pub overpass_url: String,

    /// Nominatim base URL (the geocoder appends `/search`)
    pub nominatim_url: String,

    /// User agent sent with every request; the public endpoints require one
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("giro/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches a routable graph for a center point and radius.
///
/// The returned graph is owned exclusively by the caller until dropped;
/// providers must not retain references to it.
#[async_trait]
pub trait GraphProvider: Send + Sync {
    async fn fetch(
        &self,
        center: Coordinate,
        radius_m: f64,
        mode: TravelMode,
    ) -> Result<RoutableGraph>;
}

/// Production provider backed by the Overpass API
pub struct OverpassProvider {
    config: ProviderConfig,
}

impl Default for OverpassProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OverpassProvider {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::default(),
        }
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn build_query(center: Coordinate, radius_m: f64, mode: TravelMode) -> String {
        let bbox = bbox_around(center, radius_m);
        format!(
            r#"[out:json][timeout:120];
(
  way["highway"~"{}"]({},{},{},{});
);
(._;>;);
out body;"#,
            mode.highway_filter(),
            bbox.min_lat,
            bbox.min_lon,
            bbox.max_lat,
            bbox.max_lon
        )
    }
}

#[async_trait]
impl GraphProvider for OverpassProvider {
    async fn fetch(
        &self,
        center: Coordinate,
        radius_m: f64,
        mode: TravelMode,
    ) -> Result<RoutableGraph> {
        let query = Self::build_query(center, radius_m, mode);
        log::debug!("Overpass query for radius {radius_m:.0} m:\n{query}");

        let response = http_client()
            .post(&self.config.overpass_url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(query)
            .send()
            .await
            .map_err(|e| Error::GraphFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::GraphFetch(format!(
                "Overpass API returned status {}",
                response.status()
            )));
        }

        let parsed: OverpassResponse = response
            .json()
            .await
            .map_err(|e| Error::GraphFetch(format!("invalid Overpass response: {e}")))?;

        log::debug!("Overpass returned {} elements", parsed.elements.len());

        let network = parsed.into_network();
        let graph = RoutableGraph::from_network(&network, mode);
        if graph.node_count() == 0 {
            return Err(Error::GraphFetch(format!(
                "no routable {} network within {radius_m:.0} m of {center}",
                mode
            )));
        }

        log::info!(
            "Fetched graph at radius {radius_m:.0} m: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
struct OsmElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    nodes: Option<Vec<i64>>,
    tags: Option<OsmTags>,
}

#[derive(Debug, Deserialize, Default)]
struct OsmTags {
    oneway: Option<String>,
}

impl OverpassResponse {
    fn into_network(self) -> OsmNetwork {
        let mut network = OsmNetwork::default();
        for elem in self.elements {
            match elem.kind.as_str() {
                "node" => {
                    if let (Some(lat), Some(lon)) = (elem.lat, elem.lon) {
                        network.nodes.insert(elem.id, (lat, lon));
                    }
                }
                "way" => {
                    if let Some(nodes) = elem.nodes {
                        let oneway = elem
                            .tags
                            .as_ref()
                            .and_then(|t| t.oneway.as_deref())
                            .map(|v| matches!(v, "yes" | "1" | "true"))
                            .unwrap_or(false);
                        network.ways.push(OsmWay { nodes, oneway });
                    }
                }
                _ => {} // relations are not used for routing
            }
        }
        network
    }
}
