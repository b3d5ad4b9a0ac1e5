use std::sync::{Mutex, PoisonError};

use log::{debug, warn};

use super::{location, Adapter, AdapterFactory};
use crate::{KeyvClient, KeyvError, Result};

/// An adapter that forwards every call to a remote
/// [`KeyvServer`](crate::KeyvServer).
///
/// Calls share one connection and are serialized by a mutex. Nothing is
/// retried: a failed call returns its error. After a transport failure
/// (an IO or framing error) the stream may be mid-frame, so the
/// connection is dropped and the next call reconnects.
pub struct RemoteAdapter {
    addr: String,
    client: Mutex<Option<KeyvClient>>,
}

impl RemoteAdapter {
    /// Connects to the server at `addr` (`host:port`).
    pub fn connect(addr: &str) -> Result<Self> {
        let client = KeyvClient::connect(addr)?;
        debug!("Connected to keyv server at {}", addr);
        Ok(Self {
            addr: addr.to_owned(),
            client: Mutex::new(Some(client)),
        })
    }

    fn with_client<T>(&self, f: impl FnOnce(&mut KeyvClient) -> Result<T>) -> Result<T> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        let mut client = match slot.take() {
            Some(client) => client,
            None => {
                debug!("Reconnecting to keyv server at {}", self.addr);
                KeyvClient::connect(self.addr.as_str())?
            }
        };
        let result = f(&mut client);
        match &result {
            Err(e @ (KeyvError::Io(_) | KeyvError::Protocol(_))) => {
                warn!("Dropping connection to {}: {}", self.addr, e);
            }
            _ => *slot = Some(client),
        }
        result
    }
}

impl Adapter for RemoteAdapter {
    fn has(&self, key: String) -> bool {
        match self.with_client(|client| client.has(key)) {
            Ok(found) => found,
            Err(e) => {
                warn!("Remote existence check failed: {}", e);
                false
            }
        }
    }

    fn get(&self, key: String) -> Result<Option<String>> {
        self.with_client(|client| client.get(key))
    }

    fn set(&self, key: String, value: String) -> Result<()> {
        self.with_client(|client| client.set(key, value))
    }

    fn remove(&self, key: String) -> Result<()> {
        self.with_client(|client| client.remove(key))
    }

    fn clear(&self, prefix: String) -> Result<()> {
        self.with_client(|client| client.clear(prefix))
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_client(KeyvClient::keys)
    }
}

/// Factory for `tcp://<host:port>` connection strings.
pub struct RemoteFactory;

impl RemoteFactory {
    /// Scheme this factory is registered under by default.
    pub const SCHEME: &'static str = "tcp";
}

impl AdapterFactory for RemoteFactory {
    fn connect(&self, uri: &str) -> Result<Box<dyn Adapter>> {
        let addr = location(uri)?;
        let adapter =
            RemoteAdapter::connect(addr).map_err(|e| KeyvError::connection_failed(uri, e))?;
        Ok(Box::new(adapter))
    }
}
