//! Address to coordinates lookup.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::{Coordinates, Result, StoreError};

/// Environment variable holding the geocoding API key.
pub const GEOCODING_API_KEY_ENV: &str = "GOOGLE_PLACES_API_KEY";

/// Default geocoding service base URL.
pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://maps.googleapis.com";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service had no answer for this address.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}

/// Client for the Google geocoding API
#[derive(Clone)]
pub struct GoogleGeocoder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let address = address.trim();
        if address.is_empty() {
            warn!("Empty address provided for geocoding");
            return Ok(None);
        }

        let Some(api_key) = &self.api_key else {
            error!("Geocoding API key not configured (set {})", GEOCODING_API_KEY_ENV);
            return Ok(None);
        };

        debug!("Geocoding address: {}", address);
        let response = self
            .client
            .get(format!("{}/maps/api/geocode/json", self.base_url))
            .query(&[("address", address), ("key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Geocoding {
                message: e.to_string(),
            })?;

        let body: GeocodeResponse = response.json().await.map_err(|e| StoreError::Geocoding {
            message: e.to_string(),
        })?;

        Ok(body.first_location(address))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn first_location(self, address: &str) -> Option<Coordinates> {
        if self.status != "OK" {
            warn!("Geocoding failed for '{}': {}", address, self.status);
            return None;
        }
        let first = self.results.into_iter().next()?;
        Some(Coordinates::new(
            first.geometry.location.lat,
            first.geometry.location.lng,
        ))
    }
}
