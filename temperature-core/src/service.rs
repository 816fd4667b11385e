use std::sync::Arc;

use anyhow::Context;

use crate::{
    Config,
    aggregator::Aggregator,
    error::{Result, TemperatureError},
    geocode::{DEFAULT_GEOCODING_BASE_URL, GeocodingClient},
    http::{ReqwestTransport, Transport},
    model::{Coordinate, PostalCodeLookup, TemperatureReport},
    registry::SourceRegistry,
};

/// Entry points for callers: temperature by coordinates or by postal code.
#[derive(Debug, Clone)]
pub struct TemperatureService {
    aggregator: Aggregator,
    geocoder: Option<GeocodingClient>,
}

impl TemperatureService {
    pub fn new(aggregator: Aggregator, geocoder: Option<GeocodingClient>) -> Self {
        Self { aggregator, geocoder }
    }

    /// Wire the built-in sources and, when a key is configured, the geocoder.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport: Arc<dyn Transport> = match config.request_timeout() {
            Some(timeout) => Arc::new(
                ReqwestTransport::with_timeout(timeout).context("Failed to build HTTP client")?,
            ),
            None => Arc::new(ReqwestTransport::new()),
        };

        let registry = Arc::new(SourceRegistry::with_default_sources());
        let aggregator =
            Aggregator::new(registry, Arc::clone(&transport), config.sources_base_url.clone())
                .with_max_concurrency(config.max_concurrency);

        let geocoder = config.geocoding.as_ref().filter(|g| !g.api_key.is_empty()).map(|g| {
            let base_url = g.base_url.as_deref().unwrap_or(DEFAULT_GEOCODING_BASE_URL);
            GeocodingClient::with_base_url(g.api_key.clone(), base_url, Arc::clone(&transport))
        });

        Ok(Self::new(aggregator, geocoder))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn valid_sources(&self) -> Vec<&str> {
        self.aggregator.valid_sources()
    }

    /// Average temperature at `coordinate`. With `validate`, the geocoder must
    /// first confirm the coordinates belong to a real location.
    pub async fn by_coordinates<S: AsRef<str>>(
        &self,
        coordinate: Coordinate,
        filter: &[S],
        validate: bool,
    ) -> Result<TemperatureReport> {
        if validate && !self.geocoder()?.check_coordinates(coordinate).await? {
            return Err(TemperatureError::InvalidInput(format!(
                "coordinates {coordinate} do not match any known location"
            )));
        }

        self.aggregator.average(coordinate, filter).await
    }

    /// Resolve `postal_code`, then average the temperature there. An unknown
    /// code fails with `NotFound` before any source is queried.
    pub async fn by_postal_code<S: AsRef<str>>(
        &self,
        postal_code: &str,
        filter: &[S],
    ) -> Result<(Coordinate, TemperatureReport)> {
        let coordinate = match self.geocoder()?.resolve_postal_code(postal_code).await? {
            PostalCodeLookup::Found(coordinate) => coordinate,
            PostalCodeLookup::NotFound => {
                return Err(TemperatureError::NotFound { postal_code: postal_code.to_string() });
            }
        };

        let report = self.aggregator.average(coordinate, filter).await?;
        Ok((coordinate, report))
    }

    fn geocoder(&self) -> Result<&GeocodingClient> {
        self.geocoder.as_ref().ok_or_else(|| {
            TemperatureError::InvalidInput(
                "geocoding is not configured. Hint: run `avgtemp configure` and enter an API key"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GeocodingConfig, error::ErrorKind};

    #[tokio::test]
    async fn validation_without_geocoder_is_invalid_input() {
        let service = TemperatureService::from_config(&Config::default()).unwrap();
        let err = service
            .by_coordinates::<&str>(Coordinate::new(1.0, 2.0), &[], true)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("geocoding is not configured"));
    }

    #[tokio::test]
    async fn postal_lookup_without_geocoder_is_invalid_input() {
        let service = TemperatureService::from_config(&Config::default()).unwrap();
        let err = service.by_postal_code::<&str>("10001", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn empty_api_key_leaves_geocoder_unset() {
        let cfg = Config {
            geocoding: Some(GeocodingConfig { api_key: String::new(), base_url: None }),
            ..Config::default()
        };
        let service = TemperatureService::from_config(&cfg).unwrap();
        assert!(service.geocoder.is_none());
    }

    #[test]
    fn config_drives_concurrency_and_sources() {
        let cfg = Config { max_concurrency: 2, request_timeout_secs: Some(5), ..Config::default() };
        let service = TemperatureService::from_config(&cfg).unwrap();
        assert_eq!(service.aggregator().max_concurrency(), 2);
        assert_eq!(service.valid_sources(), vec!["accuweather", "noaa", "weather.com"]);

        let cfg = Config { max_concurrency: 100, ..Config::default() };
        let service = TemperatureService::from_config(&cfg).unwrap();
        assert_eq!(service.aggregator().max_concurrency(), 3);
        assert_eq!(service.valid_sources(), vec!["accuweather", "noaa", "weather.com"]);
    }
}
