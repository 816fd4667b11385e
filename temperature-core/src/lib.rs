//! Core library for the `avgtemp` CLI.
//!
//! This crate defines:
//! - Adapters for each temperature source and the registry selecting them
//! - Concurrent aggregation of readings into a single Celsius average
//! - Postal code lookup and coordinate validation via a geocoding service
//! - Configuration & credentials handling
//!
//! It is used by `temperature-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod geocode;
pub mod http;
pub mod model;
pub mod registry;
pub mod service;
pub mod source;
pub mod units;

pub use aggregator::Aggregator;
pub use config::{Config, GeocodingConfig};
pub use error::{ErrorKind, TemperatureError};
pub use geocode::GeocodingClient;
pub use http::{RawResponse, ReqwestTransport, RequestSpec, Transport, TransportError};
pub use model::{CelsiusEnvelope, Coordinate, PostalCodeLookup, TemperatureReading, TemperatureReport};
pub use registry::SourceRegistry;
pub use service::TemperatureService;
pub use source::{SourceId, TemperatureSource};
