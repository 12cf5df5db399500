//! Address resolution
//!
//! Consumed once per planning call, before the expansion controller starts.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::error::{Error, Result};
use crate::core::geo::Coordinate;
use crate::core::provider::{http_client, ProviderConfig};

/// Resolves a free-form address to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Coordinate>;
}

/// Production geocoder backed by Nominatim
pub struct NominatimGeocoder {
    config: ProviderConfig,
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NominatimGeocoder {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::default(),
        }
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self { config }
    }
}

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Coordinate> {
        let url = format!("{}/search", self.config.nominatim_url);
        let response = http_client()
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "Nominatim returned status {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| Error::Geocode(address.to_string()))?;

        let lat: f64 = place
            .lat
            .parse()
            .map_err(|_| Error::Geocode(format!("{address}: bad latitude '{}'", place.lat)))?;
        let lon: f64 = place
            .lon
            .parse()
            .map_err(|_| Error::Geocode(format!("{address}: bad longitude '{}'", place.lon)))?;

        log::info!("Resolved '{address}' to ({lat:.5}, {lon:.5})");
        Ok(Coordinate::new(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_deserialization() {
        let places: Vec<NominatimPlace> =
            serde_json::from_str(r#"[{"lat": "45.07049", "lon": "7.68682", "display_name": "Torino"}]"#)
                .unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].lat, "45.07049");
    }

    #[test]
    fn test_empty_result_deserializes() {
        let places: Vec<NominatimPlace> = serde_json::from_str("[]").unwrap();
        assert!(places.is_empty());
    }
}
