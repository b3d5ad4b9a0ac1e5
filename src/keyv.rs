use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapters::{Adapter, AdapterFactory};
use crate::{registry, KeyvError, Result};

/// Namespace used when the caller supplies an empty one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Leading component of every qualified key.
pub const KEY_PREFIX: &str = "keyv";

/// Builds the key an adapter sees for `key` in `namespace`:
/// `"keyv:<namespace>:<key>"`.
///
/// Keys are concatenated as given, not escaped or validated.
pub fn qualify(namespace: &str, key: &str) -> String {
    format!("{KEY_PREFIX}:{namespace}:{key}")
}

/// Returns the scheme of `uri`, i.e. everything before the first `"://"`.
/// A string without `"://"` is its own scheme.
fn scheme(uri: &str) -> &str {
    uri.split_once("://").map_or(uri, |(scheme, _)| scheme)
}

fn normalize(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// A namespaced key-value store over a pluggable [`Adapter`].
///
/// Values are stored as JSON under `"keyv:<namespace>:<key>"`, so
/// facades with different namespaces can share one backend without
/// seeing each other's keys.
///
/// Clones share the adapter. The facade adds no locking of its own: it
/// is as safe for concurrent use as its adapter, and read-modify-write
/// sequences need external coordination.
#[derive(Clone)]
pub struct Keyv {
    adapter_name: String,
    adapter: Arc<dyn Adapter>,
    uri: String,
    namespace: String,
    /// `"keyv:<namespace>:"`, shared by every key in the namespace.
    prefix: String,
}

impl Keyv {
    /// Connects to the backend registered for the scheme of `uri`.
    ///
    /// An empty `namespace` becomes [`DEFAULT_NAMESPACE`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyvError::AdapterNotFound`] if no adapter is registered
    /// for the scheme. Errors from the adapter factory are returned
    /// unchanged.
    pub fn new(uri: &str, namespace: &str) -> Result<Self> {
        let adapter_name = scheme(uri);
        let factory: Arc<dyn AdapterFactory> = registry::lookup(adapter_name)
            .ok_or_else(|| KeyvError::AdapterNotFound(adapter_name.to_owned()))?;
        let adapter = factory.connect(uri)?;

        let namespace = normalize(namespace);
        debug!("Connected {} with namespace {}", uri, namespace);

        Ok(Self {
            adapter_name: adapter_name.to_owned(),
            adapter: Arc::from(adapter),
            uri: uri.to_owned(),
            namespace: namespace.to_owned(),
            prefix: qualify(namespace, ""),
        })
    }

    /// Returns a facade over the same adapter in another namespace.
    ///
    /// The registry is not consulted again. An empty `namespace` becomes
    /// [`DEFAULT_NAMESPACE`].
    pub fn namespaced(&self, namespace: &str) -> Self {
        let namespace = normalize(namespace);
        Self {
            adapter_name: self.adapter_name.clone(),
            adapter: Arc::clone(&self.adapter),
            uri: self.uri.clone(),
            namespace: namespace.to_owned(),
            prefix: qualify(namespace, ""),
        }
    }

    /// Scheme the adapter was resolved from.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// The connection string this facade was created from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The namespace qualifying every key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn qualify(&self, key: &str) -> String {
        qualify(&self.namespace, key)
    }

    /// Returns whether `key` is stored in this namespace.
    pub fn has(&self, key: &str) -> bool {
        self.adapter.has(self.qualify(key))
    }

    /// Fetches `key` and decodes it as `T`.
    ///
    /// # Errors
    ///
    /// [`KeyvError::KeyNotFound`] if the key is absent,
    /// [`KeyvError::Deserialization`] if the stored value is not a valid
    /// `T`, or whatever the adapter reports.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let key = self.qualify(key);
        if !self.adapter.has(key.clone()) {
            return Err(KeyvError::KeyNotFound);
        }
        let raw = self.adapter.get(key)?.ok_or(KeyvError::KeyNotFound)?;
        serde_json::from_str(&raw).map_err(KeyvError::Deserialization)
    }

    /// Fetches `key` into `dest`. On any error `dest` is left untouched.
    pub fn get_into<T: DeserializeOwned>(&self, key: &str, dest: &mut T) -> Result<()> {
        *dest = self.get(key)?;
        Ok(())
    }

    /// Fetches a string value.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Fetches a signed integer value.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Fetches an unsigned integer value.
    pub fn get_uint(&self, key: &str) -> Result<u64> {
        self.get(key)
    }

    /// Fetches a floating point value.
    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    /// Fetches a boolean value.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Encodes `value` as JSON and stores it under `key`, replacing any
    /// previous value.
    ///
    /// # Errors
    ///
    /// [`KeyvError::Serialization`] if `value` cannot be encoded, or
    /// whatever the adapter reports.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(KeyvError::Serialization)?;
        self.adapter.set(self.qualify(key), raw)
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.adapter.remove(self.qualify(key))
    }

    /// Lists the keys stored in this namespace, without their prefix,
    /// in sorted order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .adapter
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_owned))
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    /// Removes every key in this namespace.
    ///
    /// If the adapter fails partway the error is returned; keys removed
    /// before the failure are not restored.
    pub fn clear(&self) -> Result<()> {
        self.adapter.clear(self.prefix.clone())
    }
}

impl fmt::Debug for Keyv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyv")
            .field("adapter_name", &self.adapter_name)
            .field("uri", &self.uri)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
