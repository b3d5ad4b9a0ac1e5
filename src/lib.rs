#![deny(missing_docs)]

//! A storage-agnostic key-value facade.
//!
//! Values are stored as JSON under namespaced string keys. Persistence
//! is supplied by pluggable adapters, selected at runtime by the scheme
//! of a connection string (`mem://`, `file://`, `sled://`, `tcp://`, or
//! any scheme registered by the application).
//!
//! ```no_run
//! keyv::register_builtin_adapters();
//!
//! let store = keyv::Keyv::new("file:///tmp/keyv", "settings")?;
//! store.set("retries", &3)?;
//! assert_eq!(store.get_int("retries")?, 3);
//! # Ok::<(), keyv::KeyvError>(())
//! ```

pub mod adapters;
mod client;
mod common;
mod error;
mod keyv;
mod registry;
mod server;
/// Thread pool implementations for concurrent request handling.
pub mod thread_pool;

pub use adapters::{register_builtin_adapters, Adapter, AdapterFactory};
pub use client::KeyvClient;
pub use common::{Request, Response};
pub use error::{KeyvError, Result};
pub use keyv::{qualify, Keyv, DEFAULT_NAMESPACE, KEY_PREFIX};
pub use registry::register;
pub use server::KeyvServer;
pub use thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};
