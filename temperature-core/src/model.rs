use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// "lat,lon" as several upstream APIs expect it.
    pub fn to_pair_string(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Normalized output of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub source: String,
    pub celsius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReport {
    /// Arithmetic mean of `readings`.
    pub celsius: f64,
    /// Sorted by source name.
    pub readings: Vec<TemperatureReading>,
    pub fetched_at: DateTime<Utc>,
}

impl TemperatureReport {
    pub fn envelope(&self) -> CelsiusEnvelope {
        CelsiusEnvelope { celsius: self.celsius }
    }
}

/// Public success payload: `{"celsius": <float>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CelsiusEnvelope {
    pub celsius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostalCodeLookup {
    Found(Coordinate),
    NotFound,
}
