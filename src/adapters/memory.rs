use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use super::{location, Adapter, AdapterFactory, OpenHandles};
use crate::Result;

/// An in-process adapter backed by an ordered map.
///
/// Cloning is cheap and clones share the same map, so one store can
/// serve several facades.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    map: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryAdapter {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Adapter for MemoryAdapter {
    fn has(&self, key: String) -> bool {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&key).cloned())
    }

    fn set(&self, key: String, value: String) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: String) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(&key);
        Ok(())
    }

    /// Atomic: the whole prefix is dropped under a single write lock.
    fn clear(&self, prefix: String) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.keys().cloned().collect())
    }
}

/// Factory for `mem://<name>` connection strings.
///
/// Connections to the same `<name>` share one [`MemoryAdapter`] while
/// any of them is alive. Once the last one is dropped the store and its
/// data are released, and a later connect starts empty.
#[derive(Default)]
pub struct MemoryFactory {
    stores: OpenHandles<String, MemoryAdapter>,
}

impl MemoryFactory {
    /// Scheme this factory is registered under by default.
    pub const SCHEME: &'static str = "mem";
}

impl AdapterFactory for MemoryFactory {
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>> {
        let name = location(uri)?;
        let store = self.stores.get_or_open(name.to_owned(), || {
            debug!("Creating in-memory store {}", name);
            Ok(MemoryAdapter::new())
        })?;
        Ok(Box::new(store))
    }
}
