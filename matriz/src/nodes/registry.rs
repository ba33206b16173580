//! Name-based node lookup.

use super::Node;
use crate::errors::ResolveError;
use dashmap::DashMap;
use std::sync::Arc;

/// Resolves stage names to nodes.
#[cfg_attr(test, mockall::automock)]
pub trait NodeResolver: Send + Sync {
    /// Looks up the node registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when nothing is registered.
    fn resolve(&self, key: &str) -> Result<Arc<dyn Node>, ResolveError>;
}

/// In-memory registry of nodes keyed by stage name.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: DashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node, replacing any previous registration for `key`.
    pub fn register(&self, key: impl Into<String>, node: Arc<dyn Node>) {
        self.nodes.insert(key.into(), node);
    }

    /// Removes a registration. Returns true if one existed.
    pub fn unregister(&self, key: &str) -> bool {
        self.nodes.remove(key).is_some()
    }

    /// Checks if a key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Lists registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeResolver for NodeRegistry {
    fn resolve(&self, key: &str) -> Result<Arc<dyn Node>, ResolveError> {
        self.nodes
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ResolveError::not_found(key))
    }
}
