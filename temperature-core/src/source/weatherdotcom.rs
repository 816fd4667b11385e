use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{Result, TemperatureError},
    http::RequestSpec,
    model::Coordinate,
    source::{Numeric, decode, endpoint, ensure_success},
    units::TemperatureUnit,
};

use super::TemperatureSource;

const NAME: &str = "weather.com";

#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherDotComSource;

#[derive(Debug, Deserialize)]
struct WcUnits {
    temperature: String,
}

#[derive(Debug, Deserialize)]
struct WcCondition {
    temp: Numeric,
}

#[derive(Debug, Deserialize)]
struct WcChannel {
    units: WcUnits,
    condition: WcCondition,
}

#[derive(Debug, Deserialize)]
struct WcResults {
    channel: WcChannel,
}

#[derive(Debug, Deserialize)]
struct WcQuery {
    count: i64,
    // Absent when count is zero.
    results: Option<WcResults>,
}

#[derive(Debug, Deserialize)]
struct WcResponse {
    query: WcQuery,
}

impl TemperatureSource for WeatherDotComSource {
    fn name(&self) -> &str {
        NAME
    }

    fn build_request(&self, coordinate: Coordinate, base_url: &str) -> RequestSpec {
        RequestSpec::post(endpoint(base_url, "weatherdotcom"))
            .with_json(json!({ "lat": coordinate.latitude, "lon": coordinate.longitude }))
    }

    fn parse_response(&self, status: u16, body: &str) -> Result<f64> {
        ensure_success(NAME, status, body)?;

        let parsed: WcResponse = decode(NAME, body)?;
        let query = parsed.query;

        if query.count != 1 {
            return Err(TemperatureError::unexpected_response(
                NAME,
                format!("expected exactly one result, query count is {}", query.count),
                body,
            ));
        }

        let channel = query
            .results
            .ok_or_else(|| TemperatureError::unexpected_response(NAME, "missing query.results", body))?
            .channel;

        let temperature = channel.condition.temp.to_f64(NAME, "temp", body)?;
        let unit = TemperatureUnit::from_tag(&channel.units.temperature).ok_or_else(|| {
            TemperatureError::unexpected_response(
                NAME,
                format!("unknown temperature unit '{}'", channel.units.temperature),
                body,
            )
        })?;

        Ok(unit.to_celsius(temperature))
    }
}
