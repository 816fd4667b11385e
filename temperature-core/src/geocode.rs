//! Postal code lookup and coordinate validation against a Google-style
//! geocoding API.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    error::{Result, TemperatureError},
    http::{RequestSpec, Transport},
    model::{Coordinate, PostalCodeLookup},
    source::{Numeric, decode, endpoint, ensure_success},
};

pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://maps.googleapis.com";

const NAME: &str = "geocoding";
const GEOCODE_PATH: &str = "maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    lat: Numeric,
    lng: Numeric,
}

#[derive(Debug, Deserialize)]
struct GeoGeometry {
    location: GeoLocation,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    geometry: GeoGeometry,
}

#[derive(Clone)]
pub struct GeocodingClient {
    api_key: String,
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for GeocodingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .finish()
    }
}

impl GeocodingClient {
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(api_key, DEFAULT_GEOCODING_BASE_URL, transport)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self { api_key: api_key.into(), base_url: base_url.into(), transport }
    }

    pub fn postal_code_request(&self, postal_code: &str) -> RequestSpec {
        RequestSpec::get(endpoint(&self.base_url, GEOCODE_PATH))
            .with_query("key", self.api_key.as_str())
            .with_query("components", format!("postal_code:{postal_code}"))
    }

    pub fn coordinates_request(&self, coordinate: Coordinate) -> RequestSpec {
        RequestSpec::get(endpoint(&self.base_url, GEOCODE_PATH))
            .with_query("key", self.api_key.as_str())
            .with_query("latlng", coordinate.to_pair_string())
    }

    /// Coordinates of `postal_code`, or `NotFound` when the service knows no
    /// such code. An ambiguous answer (several results) is an error.
    pub async fn resolve_postal_code(&self, postal_code: &str) -> Result<PostalCodeLookup> {
        let body = self.send(self.postal_code_request(postal_code)).await?;
        let results = results(&body)?;

        match results.as_slice() {
            [] => {
                tracing::debug!(postal_code, "postal code not found");
                Ok(PostalCodeLookup::NotFound)
            }
            [result] => {
                let result: GeoResult = serde_json::from_value(result.clone()).map_err(|e| {
                    TemperatureError::unexpected_response(NAME, format!("malformed result: {e}"), &body)
                })?;
                let location = result.geometry.location;
                let coordinate = Coordinate::new(
                    location.lat.to_f64(NAME, "lat", &body)?,
                    location.lng.to_f64(NAME, "lng", &body)?,
                );
                tracing::debug!(postal_code, %coordinate, "postal code resolved");
                Ok(PostalCodeLookup::Found(coordinate))
            }
            many => {
                tracing::error!(postal_code, results = many.len(), "could not find a single result for postal code");
                Err(TemperatureError::unexpected_response(
                    NAME,
                    format!("expected at most one result for postal code, found {}", many.len()),
                    &body,
                ))
            }
        }
    }

    /// Whether `coordinate` matches at least one known location.
    pub async fn check_coordinates(&self, coordinate: Coordinate) -> Result<bool> {
        let body = self.send(self.coordinates_request(coordinate)).await?;
        let valid = !results(&body)?.is_empty();
        if !valid {
            tracing::warn!(%coordinate, "coordinates do not match any location");
        }
        Ok(valid)
    }

    async fn send(&self, request: RequestSpec) -> Result<String> {
        let res = self
            .transport
            .execute(request)
            .await
            .map_err(|e| TemperatureError::connection(NAME, e.0))?;

        ensure_success(NAME, res.status, &res.body)?;
        Ok(res.body)
    }
}

fn results(body: &str) -> Result<Vec<serde_json::Value>> {
    let parsed: GeoResponse = decode(NAME, body)?;

    // The API reports quota and key problems inside a 200 body.
    match parsed.status.as_deref() {
        None | Some("OK") | Some("ZERO_RESULTS") => Ok(parsed.results),
        Some(other) => Err(TemperatureError::unexpected_response(
            NAME,
            format!("geocoding status {other}"),
            body,
        )),
    }
}
