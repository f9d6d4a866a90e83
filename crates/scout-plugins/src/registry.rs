use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::Resolver;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a plugin named `{0}` is already registered")]
    DuplicateName(String),
}

/// Name-unique map of resolvers.
///
/// Registration happens at startup; lookups afterwards are read-only.
/// Iteration order is the plugin name order, which makes matcher
/// tie-breaking deterministic.
#[derive(Default)]
pub struct Registry {
    plugins: BTreeMap<String, Arc<dyn Resolver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Resolver>) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Resolver>> {
        self.plugins.get(name)
    }

    /// Current snapshot, in name order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Resolver>> {
        self.plugins.values()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
