use std::path::PathBuf;

use log::warn;
use sled::Db;

use super::{canonical_dir, location, Adapter, AdapterFactory, OpenHandles};
use crate::{KeyvError, Result};

/// An adapter backed by the `sled` embedded database.
///
/// Every write is flushed before returning.
pub struct SledAdapter {
    db: Db,
}

impl SledAdapter {
    /// Creates a new `SledAdapter` from an already-opened sled `Db`.
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl Adapter for SledAdapter {
    fn has(&self, key: String) -> bool {
        match self.db.contains_key(key.as_bytes()) {
            Ok(found) => found,
            Err(e) => {
                warn!("sled lookup of {:?} failed: {}", key, e);
                false
            }
        }
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        Ok(self
            .db
            .get(key.as_bytes())?
            .map(|ivec| String::from_utf8(ivec.to_vec()))
            .transpose()?)
    }

    fn set(&self, key: String, value: String) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: String) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn clear(&self, prefix: String) -> Result<()> {
        for entry in self.db.scan_prefix(prefix.as_bytes()).keys() {
            self.db.remove(entry?)?;
        }
        self.db.flush()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.db
            .iter()
            .keys()
            .map(|key| Ok(String::from_utf8(key?.to_vec())?))
            .collect()
    }
}

/// Factory for `sled://<dir>` connection strings.
///
/// Connections to the same directory share one [`SledAdapter`] while any
/// of them is alive; sled itself refuses a second open of a directory.
#[derive(Default)]
pub struct SledFactory {
    open: OpenHandles<PathBuf, SledAdapter>,
}

impl SledFactory {
    /// Scheme this factory is registered under by default.
    pub const SCHEME: &'static str = "sled";
}

impl AdapterFactory for SledFactory {
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>> {
        let dir = canonical_dir(uri, location(uri)?)?;
        let adapter = self.open.get_or_open(dir.clone(), || {
            let db = sled::open(dir).map_err(|e| KeyvError::connection_failed(uri, e))?;
            Ok(SledAdapter::new(db))
        })?;
        Ok(Box::new(adapter))
    }
}
