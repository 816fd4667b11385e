use serde::Deserialize;

use crate::{
    error::{Result, TemperatureError},
    http::RequestSpec,
    model::Coordinate,
    source::{Numeric, decode, endpoint, ensure_success},
};

use super::TemperatureSource;

const NAME: &str = "accuweather";

#[derive(Debug, Clone, Copy, Default)]
pub struct AccuWeatherSource;

#[derive(Debug, Deserialize)]
struct AwReading {
    celsius: Numeric,
}

#[derive(Debug, Deserialize)]
struct AwForecastDay {
    current: AwReading,
}

#[derive(Debug, Deserialize)]
struct AwSimpleForecast {
    forecastday: Vec<AwForecastDay>,
}

#[derive(Debug, Deserialize)]
struct AwResponse {
    simpleforecast: AwSimpleForecast,
}

impl TemperatureSource for AccuWeatherSource {
    fn name(&self) -> &str {
        NAME
    }

    fn build_request(&self, coordinate: Coordinate, base_url: &str) -> RequestSpec {
        RequestSpec::get(endpoint(base_url, "accuweather"))
            .with_query("latitude", coordinate.latitude.to_string())
            .with_query("longitude", coordinate.longitude.to_string())
    }

    fn parse_response(&self, status: u16, body: &str) -> Result<f64> {
        ensure_success(NAME, status, body)?;

        let parsed: AwResponse = decode(NAME, body)?;
        let days = parsed.simpleforecast.forecastday;

        // The current conditions live in the single forecast day returned.
        match days.as_slice() {
            [day] => day.current.celsius.to_f64(NAME, "celsius", body),
            _ => Err(TemperatureError::unexpected_response(
                NAME,
                format!("expected exactly one forecastday entry, found {}", days.len()),
                body,
            )),
        }
    }
}
