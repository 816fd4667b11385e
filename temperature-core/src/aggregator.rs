//! Concurrent fan-out over the selected sources.
//!
//! Every selected source is queried once, at most [`MAX_CONCURRENT_REQUESTS`]
//! at a time. The result is all-or-nothing: one failing source fails the
//! whole call, because an average over the survivors would be misleading.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    error::{Result, TemperatureError},
    http::Transport,
    model::{Coordinate, TemperatureReading, TemperatureReport},
    registry::SourceRegistry,
    source::fetch_temperature,
};

pub const MAX_CONCURRENT_REQUESTS: usize = 3;

#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    transport: Arc<dyn Transport>,
    base_url: String,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            transport,
            base_url: base_url.into(),
            max_concurrency: MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Lower the cap on simultaneous source requests. Values are clamped to
    /// `1..=MAX_CONCURRENT_REQUESTS`.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.clamp(1, MAX_CONCURRENT_REQUESTS);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn valid_sources(&self) -> Vec<&str> {
        self.registry.all_sources()
    }

    /// Mean current temperature in Celsius over the sources selected by
    /// `filter` (empty means all of them).
    ///
    /// Unknown names in `filter` are ignored. Fails with `NoSourcesSelected`
    /// when nothing is left to query, and with the first source error
    /// otherwise.
    pub async fn average<S: AsRef<str>>(
        &self,
        coordinate: Coordinate,
        filter: &[S],
    ) -> Result<TemperatureReport> {
        let selected = self.registry.resolve(filter);
        if selected.is_empty() {
            return Err(TemperatureError::NoSourcesSelected {
                filter: filter.iter().map(|f| f.as_ref().to_string()).collect(),
            });
        }

        let workers = self.max_concurrency.min(selected.len());
        tracing::debug!(sources = selected.len(), workers, %coordinate, "querying temperature sources");

        let transport = self.transport.as_ref();
        let base_url = self.base_url.as_str();

        let mut in_flight = stream::iter(selected.iter())
            .map(|(name, source)| async move {
                let reading = fetch_temperature(source.as_ref(), transport, coordinate, base_url).await?;
                Ok::<_, TemperatureError>(TemperatureReading { source: name.clone(), ..reading })
            })
            .buffer_unordered(workers);

        let mut readings = Vec::with_capacity(selected.len());
        loop {
            match in_flight.try_next().await {
                Ok(Some(reading)) => readings.push(reading),
                Ok(None) => break,
                Err(e) => {
                    // Dropping the stream cancels whatever is still in flight.
                    tracing::warn!(kind = %e.kind(), "aborting temperature aggregation: {e}");
                    return Err(e);
                }
            }
        }

        readings.sort_by(|a, b| a.source.cmp(&b.source));
        let celsius = mean(&readings);
        tracing::info!(celsius, sources = readings.len(), "average temperature computed");

        Ok(TemperatureReport { celsius, readings, fetched_at: Utc::now() })
    }
}

// Callers guarantee a non-empty slice.
fn mean(readings: &[TemperatureReading]) -> f64 {
    readings.iter().map(|r| r.celsius).sum::<f64>() / readings.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        http::{RawResponse, RequestSpec, TransportError},
        source::noaa::NoaaSource,
    };
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    const BASE: &str = "http://sources.test";

    /// In-memory transport answering by URL path, recording traffic and the
    /// peak number of concurrent requests.
    #[derive(Debug, Default)]
    struct StubTransport {
        responses: HashMap<String, Result<RawResponse, TransportError>>,
        delay: Duration,
        route_delays: HashMap<String, Duration>,
        requested: Mutex<Vec<String>>,
        completed: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubTransport {
        fn respond(mut self, path: &str, response: Result<RawResponse, TransportError>) -> Self {
            self.responses.insert(format!("{BASE}/{path}"), response);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_route_delay(mut self, path: &str, delay: Duration) -> Self {
            self.route_delays.insert(format!("{BASE}/{path}"), delay);
            self
        }

        fn completed(&self) -> Vec<String> {
            self.completed.lock().unwrap().clone()
        }

        fn requested(&self) -> Vec<String> {
            let mut urls = self.requested.lock().unwrap().clone();
            urls.sort();
            urls
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, request: RequestSpec) -> Result<RawResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.requested.lock().unwrap().push(request.url.clone());

            let delay = self.route_delays.get(&request.url).copied().unwrap_or(self.delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.completed.lock().unwrap().push(request.url.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Err(TransportError(format!("no route to {}", request.url))))
        }
    }

    fn accuweather(celsius: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(
            200,
            format!(r#"{{"simpleforecast": {{"forecastday": [{{"current": {{"celsius": "{celsius}"}}}}]}}}}"#),
        ))
    }

    fn noaa(celsius: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(200, format!(r#"{{"today": {{"current": {{"celsius": "{celsius}"}}}}}}"#)))
    }

    fn weatherdotcom(unit: &str, temp: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(
            200,
            format!(
                r#"{{"query": {{"count": 1, "results": {{"channel": {{"units": {{"temperature": "{unit}"}}, "condition": {{"temp": "{temp}"}}}}}}}}}}"#
            ),
        ))
    }

    fn aggregator(transport: Arc<StubTransport>) -> Aggregator {
        Aggregator::new(Arc::new(SourceRegistry::with_default_sources()), transport, BASE)
    }

    fn all_healthy() -> StubTransport {
        StubTransport::default()
            .respond("accuweather", accuweather("12"))
            .respond("noaa", noaa("20"))
            .respond("weatherdotcom", weatherdotcom("C", "10"))
    }

    #[tokio::test]
    async fn averages_all_sources() {
        let transport = Arc::new(all_healthy());
        let report = aggregator(transport.clone())
            .average::<&str>(Coordinate::new(1.0, 2.0), &[])
            .await
            .unwrap();

        assert_eq!(report.celsius, 14.0);
        let sources: Vec<_> = report.readings.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["accuweather", "noaa", "weather.com"]);
        assert_eq!(transport.requested().len(), 3);
    }

    #[tokio::test]
    async fn fahrenheit_readings_are_normalized_before_averaging() {
        let transport = Arc::new(
            StubTransport::default()
                .respond("noaa", noaa("20"))
                .respond("weatherdotcom", weatherdotcom("F", "50")),
        );

        let report = aggregator(transport)
            .average(Coordinate::new(1.0, 2.0), &["noaa", "weather.com"])
            .await
            .unwrap();

        assert!((report.celsius - 15.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn mean_does_not_depend_on_completion_order() {
        let staggered = |first: &str, last: &str| {
            Arc::new(
                all_healthy()
                    .with_route_delay(first, Duration::ZERO)
                    .with_route_delay("noaa", Duration::from_millis(40))
                    .with_route_delay(last, Duration::from_millis(80)),
            )
        };
        let forward = staggered("accuweather", "weatherdotcom");
        let backward = staggered("weatherdotcom", "accuweather");

        let a = aggregator(forward.clone()).average::<&str>(Coordinate::new(0.0, 0.0), &[]).await.unwrap();
        let b = aggregator(backward.clone()).average::<&str>(Coordinate::new(0.0, 0.0), &[]).await.unwrap();

        let mut reversed = backward.completed();
        reversed.reverse();
        assert_eq!(forward.completed(), reversed);
        assert_eq!(forward.completed()[0], format!("{BASE}/accuweather"));

        assert_eq!(a.celsius, b.celsius);
        assert_eq!(a.readings, b.readings);
    }

    #[tokio::test]
    async fn only_known_filter_names_are_queried() {
        let transport = Arc::new(all_healthy());
        let report = aggregator(transport.clone())
            .average(Coordinate::new(1.0, 2.0), &["noaa", "bogus"])
            .await
            .unwrap();

        assert_eq!(report.celsius, 20.0);
        assert_eq!(transport.requested(), vec![format!("{BASE}/noaa")]);
    }

    #[tokio::test]
    async fn filter_of_unknown_names_selects_nothing() {
        let transport = Arc::new(all_healthy());
        let err = aggregator(transport.clone())
            .average(Coordinate::new(1.0, 2.0), &["bogus", "other"])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoSourcesSelected);
        assert!(transport.requested().is_empty());
    }

    #[tokio::test]
    async fn one_server_error_fails_the_whole_call() {
        let transport = Arc::new(
            all_healthy().respond("noaa", Ok(RawResponse::new(500, "Internal Server Error"))),
        );

        let err = aggregator(transport)
            .average::<&str>(Coordinate::new(1.0, 2.0), &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnexpectedStatusCode);
        assert_eq!(err.service(), Some("noaa"));
    }

    #[tokio::test]
    async fn one_unreachable_source_fails_the_whole_call() {
        let transport = Arc::new(
            all_healthy().respond("weatherdotcom", Err(TransportError("connection refused".into()))),
        );

        let err = aggregator(transport)
            .average::<&str>(Coordinate::new(1.0, 2.0), &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert_eq!(err.service(), Some("weather.com"));
    }

    #[tokio::test]
    async fn one_malformed_payload_fails_the_whole_call() {
        let transport = Arc::new(all_healthy().respond("accuweather", Ok(RawResponse::new(200, "{}"))));

        let err = aggregator(transport)
            .average::<&str>(Coordinate::new(1.0, 2.0), &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    }

    #[tokio::test]
    async fn concurrency_is_capped() {
        let mut registry = SourceRegistry::new();
        for i in 0..7 {
            registry.register(format!("noaa-{i}"), Arc::new(NoaaSource));
        }

        let transport = Arc::new(
            StubTransport::default().respond("noaa", noaa("8")).with_delay(Duration::from_millis(20)),
        );
        let aggregator = Aggregator::new(Arc::new(registry), transport.clone(), BASE);

        let report = aggregator.average::<&str>(Coordinate::new(1.0, 2.0), &[]).await.unwrap();

        assert_eq!(report.readings.len(), 7);
        assert_eq!(report.celsius, 8.0);
        assert_eq!(transport.peak.load(Ordering::SeqCst), MAX_CONCURRENT_REQUESTS);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_selected_sources() {
        let transport = Arc::new(all_healthy().with_delay(Duration::from_millis(10)));
        aggregator(transport.clone())
            .with_max_concurrency(10)
            .average(Coordinate::new(1.0, 2.0), &["noaa", "accuweather"])
            .await
            .unwrap();

        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn configured_concurrency_cannot_exceed_cap() {
        let mut registry = SourceRegistry::new();
        for i in 0..7 {
            registry.register(format!("noaa-{i}"), Arc::new(NoaaSource));
        }

        let transport = Arc::new(
            StubTransport::default().respond("noaa", noaa("8")).with_delay(Duration::from_millis(20)),
        );
        let aggregator =
            Aggregator::new(Arc::new(registry), transport.clone(), BASE).with_max_concurrency(7);

        assert_eq!(aggregator.max_concurrency(), MAX_CONCURRENT_REQUESTS);
        aggregator.average::<&str>(Coordinate::new(1.0, 2.0), &[]).await.unwrap();
        assert_eq!(transport.peak.load(Ordering::SeqCst), MAX_CONCURRENT_REQUESTS);
    }

    #[tokio::test]
    async fn lower_concurrency_is_honoured() {
        let transport = Arc::new(all_healthy().with_delay(Duration::from_millis(10)));
        aggregator(transport.clone())
            .with_max_concurrency(1)
            .average::<&str>(Coordinate::new(1.0, 2.0), &[])
            .await
            .unwrap();

        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let agg = aggregator(Arc::new(StubTransport::default())).with_max_concurrency(0);
        assert_eq!(agg.max_concurrency(), 1);
    }
}
