use serde::Deserialize;

use crate::{
    error::Result,
    http::RequestSpec,
    model::Coordinate,
    source::{Numeric, decode, endpoint, ensure_success},
};

use super::TemperatureSource;

const NAME: &str = "noaa";

#[derive(Debug, Clone, Copy, Default)]
pub struct NoaaSource;

#[derive(Debug, Deserialize)]
struct NoaaReading {
    celsius: Numeric,
}

#[derive(Debug, Deserialize)]
struct NoaaToday {
    current: NoaaReading,
}

#[derive(Debug, Deserialize)]
struct NoaaResponse {
    today: NoaaToday,
}

impl TemperatureSource for NoaaSource {
    fn name(&self) -> &str {
        NAME
    }

    fn build_request(&self, coordinate: Coordinate, base_url: &str) -> RequestSpec {
        RequestSpec::get(endpoint(base_url, "noaa")).with_query("latlon", coordinate.to_pair_string())
    }

    fn parse_response(&self, status: u16, body: &str) -> Result<f64> {
        ensure_success(NAME, status, body)?;

        let parsed: NoaaResponse = decode(NAME, body)?;
        parsed.today.current.celsius.to_f64(NAME, "celsius", body)
    }
}
