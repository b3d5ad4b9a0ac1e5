//! Storage adapters and the capability traits they implement.

use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once, PoisonError, Weak};

use log::{debug, warn};

use crate::Result;

/// Raw string storage a backend provides to the [`Keyv`](crate::Keyv) facade.
///
/// Adapters have no notion of namespaces: every key they see is already
/// fully qualified. Implementors own all physical storage concerns.
///
/// Adapters must be shareable across threads so a single backend can
/// sit behind several facades or a [`KeyvServer`](crate::KeyvServer).
pub trait Adapter: Send + Sync {
    /// Returns whether `key` is currently stored.
    ///
    /// Backends that cannot determine existence must still answer.
    fn has(&self, key: String) -> bool;

    /// Gets the raw value stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    fn get(&self, key: String) -> Result<Option<String>>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, key: String, value: String) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: String) -> Result<()>;

    /// Removes every stored key that starts with `prefix`.
    ///
    /// If the backend removes keys one at a time and fails midway, the
    /// error is returned and keys already removed stay removed.
    fn clear(&self, prefix: String) -> Result<()>;

    /// Lists every key stored by this backend, across all namespaces.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Turns a connection string into a ready-to-use [`Adapter`].
///
/// Exactly one factory is registered per scheme name, see
/// [`register`](crate::register).
pub trait AdapterFactory: Send + Sync {
    /// Connects to the backend described by `uri`.
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&str) -> Result<Box<dyn Adapter>> + Send + Sync,
{
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>> {
        self(uri)
    }
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn has(&self, key: String) -> bool {
        (**self).has(key)
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: String, value: String) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: String) -> Result<()> {
        (**self).remove(key)
    }

    fn clear(&self, prefix: String) -> Result<()> {
        (**self).clear(prefix)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

mod file;
mod memory;
mod remote;
mod sled_adapter;

pub use self::file::{FileAdapter, FileFactory};
pub use self::memory::{MemoryAdapter, MemoryFactory};
pub use self::remote::{RemoteAdapter, RemoteFactory};
pub use self::sled_adapter::{SledAdapter, SledFactory};

static BUILTINS: Once = Once::new();

/// Registers the adapters shipped with this crate: `mem`, `file`,
/// `sled` and `tcp`.
///
/// Only the first call registers anything. A scheme the application
/// already registered itself is left alone.
pub fn register_builtin_adapters() {
    BUILTINS.call_once(|| {
        report(
            MemoryFactory::SCHEME,
            crate::register(MemoryFactory::SCHEME, MemoryFactory::default()),
        );
        report(
            FileFactory::SCHEME,
            crate::register(FileFactory::SCHEME, FileFactory::default()),
        );
        report(
            SledFactory::SCHEME,
            crate::register(SledFactory::SCHEME, SledFactory::default()),
        );
        report(
            RemoteFactory::SCHEME,
            crate::register(RemoteFactory::SCHEME, RemoteFactory),
        );
    });
}

fn report(scheme: &str, result: Result<()>) {
    match result {
        Ok(()) => debug!("Registered built-in adapter {}", scheme),
        Err(e) => warn!("Skipping built-in adapter {}: {}", scheme, e),
    }
}

/// Returns the part of `uri` following the first `"://"`, whatever
/// scheme the factory was registered under.
///
/// Built-in factories reject an empty location.
fn location(uri: &str) -> Result<&str> {
    match uri.split_once("://") {
        Some((_, rest)) if !rest.is_empty() => Ok(rest),
        _ => Err(crate::KeyvError::connection_failed(
            uri,
            "expected <scheme>://<location>",
        )),
    }
}

/// Creates `dir` if needed and returns its canonical form, so different
/// spellings of one directory map to one backend.
fn canonical_dir(uri: &str, dir: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .and_then(|()| fs::canonicalize(dir))
        .map_err(|e| crate::KeyvError::connection_failed(uri, e))
}

/// Backends a factory has open, keyed by location.
///
/// Connecting twice to one location yields the same adapter, so two
/// facades never hold independent handles on one store. Entries are
/// weak: a backend is closed once its last facade is dropped, and dead
/// entries are pruned on the next connect.
struct OpenHandles<K, T> {
    open: Mutex<HashMap<K, Weak<T>>>,
}

impl<K: Eq + Hash, T> Default for OpenHandles<K, T> {
    fn default() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, T> OpenHandles<K, T> {
    /// Returns the live handle for `key`, or stores the one `open` creates.
    fn get_or_open(&self, key: K, open: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let mut handles = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|_, handle| handle.strong_count() > 0);
        if let Some(live) = handles.get(&key).and_then(Weak::upgrade) {
            return Ok(live);
        }
        let handle = Arc::new(open()?);
        handles.insert(key, Arc::downgrade(&handle));
        Ok(handle)
    }
}
