use std::{collections::BTreeMap, sync::Arc};

use crate::source::{SourceId, TemperatureSource, source_from_id};

/// Named set of temperature sources. Built once at startup, read-only after.
#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn TemperatureSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in source under its canonical name.
    pub fn with_default_sources() -> Self {
        let mut registry = Self::new();
        for id in SourceId::all() {
            registry.register(id.as_str(), source_from_id(*id));
        }
        registry
    }

    /// Add `source` under `name`. An already taken name keeps its first
    /// source; returns whether this one was added.
    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn TemperatureSource>) -> bool {
        let name = name.into();
        if self.sources.contains_key(&name) {
            tracing::warn!(source = %name, "already registered a temperature source with this name, skipping");
            return false;
        }
        self.sources.insert(name, source);
        true
    }

    pub fn all_sources(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Sources selected by `filter`, ordered by name.
    ///
    /// An empty filter selects everything. Names that are not registered are
    /// dropped without error, so the result may be empty.
    pub fn resolve<S: AsRef<str>>(&self, filter: &[S]) -> Vec<(String, Arc<dyn TemperatureSource>)> {
        self.sources
            .iter()
            .filter(|(name, _)| filter.is_empty() || filter.iter().any(|f| f.as_ref() == name.as_str()))
            .map(|(name, source)| (name.clone(), Arc::clone(source)))
            .collect()
    }

    /// Filter entries that name no registered source, in the order given.
    pub fn unknown_names<S: AsRef<str>>(&self, filter: &[S]) -> Vec<String> {
        let mut unknown: Vec<String> = Vec::new();
        for name in filter.iter().map(AsRef::as_ref) {
            if !self.contains(name) && !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }
        unknown
    }
}
