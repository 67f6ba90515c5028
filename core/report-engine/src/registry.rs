//! FILENAME: core/report-engine/src/registry.rs
//! PURPOSE: Lookup of data view and data source definitions by name.
//! CONTEXT: The generator only sees the `ConfigProvider` trait. `MemoryRegistry`
//! is the implementation filled by the config loader.

use crate::definition::{DataSourceDefinition, DataViewDefinition};
use std::collections::HashMap;
use std::sync::Arc;

pub trait ConfigProvider {
    fn data_view(&self, name: &str) -> Option<Arc<DataViewDefinition>>;
    fn data_source(&self, name: &str) -> Option<&DataSourceDefinition>;
}

/// Definitions held in memory. View definitions are reference counted so
/// every `DataView` built from them shares one copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    views: HashMap<String, Arc<DataViewDefinition>>,
    sources: HashMap<String, DataSourceDefinition>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a view definition.
    pub fn insert_view(&mut self, view: DataViewDefinition) {
        self.views.insert(view.name.clone(), Arc::new(view));
    }

    /// Adds or replaces a data source definition.
    pub fn insert_source(&mut self, source: DataSourceDefinition) {
        self.sources.insert(source.name.clone(), source);
    }

    /// Replaces every data source at once.
    pub fn set_sources(&mut self, sources: HashMap<String, DataSourceDefinition>) {
        self.sources = sources;
    }

    pub fn contains_view(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    pub fn contains_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &DataViewDefinition> {
        self.views.values().map(|v| v.as_ref())
    }

    pub fn sources(&self) -> impl Iterator<Item = &DataSourceDefinition> {
        self.sources.values()
    }
}

impl ConfigProvider for MemoryRegistry {
    fn data_view(&self, name: &str) -> Option<Arc<DataViewDefinition>> {
        self.views.get(name).cloned()
    }

    fn data_source(&self, name: &str) -> Option<&DataSourceDefinition> {
        self.sources.get(name)
    }
}
