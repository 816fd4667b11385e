use crate::{
    error::{Result, TemperatureError},
    http::{RequestSpec, Transport},
    model::{Coordinate, TemperatureReading},
    source::{accuweather::AccuWeatherSource, noaa::NoaaSource, weatherdotcom::WeatherDotComSource},
};
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc};

pub mod accuweather;
pub mod noaa;
pub mod weatherdotcom;

/// Only status accepted from any source.
pub const STATUS_CODE_SUCCESS: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    AccuWeather,
    Noaa,
    WeatherDotCom,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::AccuWeather => "accuweather",
            SourceId::Noaa => "noaa",
            SourceId::WeatherDotCom => "weather.com",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[SourceId::AccuWeather, SourceId::Noaa, SourceId::WeatherDotCom]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translates a coordinate into one provider's request, and its response
/// back into degrees Celsius.
pub trait TemperatureSource: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn build_request(&self, coordinate: Coordinate, base_url: &str) -> RequestSpec;

    /// Current temperature in Celsius, or `UnexpectedStatusCode` /
    /// `UnexpectedResponse`.
    fn parse_response(&self, status: u16, body: &str) -> Result<f64>;
}

pub fn source_from_id(id: SourceId) -> Arc<dyn TemperatureSource> {
    match id {
        SourceId::AccuWeather => Arc::new(AccuWeatherSource),
        SourceId::Noaa => Arc::new(NoaaSource),
        SourceId::WeatherDotCom => Arc::new(WeatherDotComSource),
    }
}

/// One attempt against one source: build, send, parse.
pub async fn fetch_temperature(
    source: &dyn TemperatureSource,
    transport: &dyn Transport,
    coordinate: Coordinate,
    base_url: &str,
) -> Result<TemperatureReading> {
    let request = source.build_request(coordinate, base_url);
    tracing::debug!(source = source.name(), url = %request.url, "requesting current temperature");

    let outcome = match transport.execute(request).await {
        Ok(res) => source.parse_response(res.status, &res.body),
        Err(e) => Err(TemperatureError::connection(source.name(), e.0)),
    };

    match outcome {
        Ok(celsius) => {
            tracing::debug!(source = source.name(), celsius, "temperature retrieved");
            Ok(TemperatureReading { source: source.name().to_string(), celsius })
        }
        Err(e) => {
            tracing::warn!(source = source.name(), kind = %e.kind(), "could not retrieve current temperature: {e}");
            Err(e)
        }
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

pub(crate) fn ensure_success(service: &str, status: u16, body: &str) -> Result<()> {
    if status == STATUS_CODE_SUCCESS {
        Ok(())
    } else {
        Err(TemperatureError::unexpected_status(service, status, body))
    }
}

pub(crate) fn decode<'a, T: Deserialize<'a>>(service: &str, body: &'a str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        TemperatureError::unexpected_response(service, format!("malformed payload: {e}"), body)
    })
}

/// Upstream payloads carry numbers as strings ("12"), sometimes as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub(crate) fn to_f64(&self, service: &str, field: &str, body: &str) -> Result<f64> {
        let value = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                TemperatureError::unexpected_response(
                    service,
                    format!("field '{field}' is not numeric: '{s}'"),
                    body,
                )
            })?,
        };

        if !value.is_finite() {
            return Err(TemperatureError::unexpected_response(
                service,
                format!("field '{field}' is not a finite number: {value}"),
                body,
            ));
        }
        Ok(value)
    }
}
