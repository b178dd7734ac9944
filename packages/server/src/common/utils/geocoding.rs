use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::kernel::BaseGeocoder;

const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Google Geocoding API response (only the fields we read)
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
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

/// Geocoded location for a free-text address
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// Geocoder backed by the Google Geocoding API
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl BaseGeocoder for GoogleGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeocodedLocation> {
        let url = format!(
            "{}?address={}&key={}",
            GEOCODE_ENDPOINT,
            urlencoding::encode(address.trim()),
            urlencoding::encode(&self.api_key)
        );

        debug!("Geocoding address");

        let response: GeocodeResponse = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Geocoding API request failed");
                anyhow!("Geocoding API request failed: {}", e)
            })?
            .json()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to parse geocoding response");
                anyhow!("Failed to parse geocoding response: {}", e)
            })?;

        location_from_response(address, response)
    }
}

fn location_from_response(address: &str, response: GeocodeResponse) -> Result<GeocodedLocation> {
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => {
            warn!(address = %address, "Address not found by geocoding API");
            return Err(anyhow!("Address not found: {}", address));
        }
        status => {
            let detail = response.error_message.unwrap_or_default();
            error!(status = %status, detail = %detail, "Geocoding API returned an error");
            return Err(anyhow!("Geocoding API error {}: {}", status, detail));
        }
    }

    let result = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Address not found: {}", address))?;

    let LatLng { lat, lng } = result.geometry.location;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(anyhow!("Geocoder returned out-of-range coordinates ({}, {})", lat, lng));
    }

    Ok(GeocodedLocation {
        latitude: lat,
        longitude: lng,
        display_name: result.formatted_address,
    })
}

/// Calculate distance between two coordinates in kilometers
///
/// Uses the Haversine formula; matches the `haversine_km` SQL function.
pub fn calculate_distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
