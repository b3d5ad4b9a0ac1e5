//! Process-wide table from scheme name to [`AdapterFactory`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::debug;

use crate::adapters::AdapterFactory;
use crate::{KeyvError, Result};

type FactoryMap = HashMap<String, Arc<dyn AdapterFactory>>;

static REGISTRY: OnceLock<RwLock<FactoryMap>> = OnceLock::new();

fn registry() -> &'static RwLock<FactoryMap> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers `factory` as the backend for connection strings whose
/// scheme is `name`.
///
/// Registration is first-writer-wins and permanent. It is meant to
/// happen once per backend at process start, before any
/// [`Keyv::new`](crate::Keyv::new) relies on the scheme.
///
/// # Errors
///
/// Returns [`KeyvError::AdapterAlreadyRegistered`] if `name` is taken.
/// The existing registration is unaffected.
pub fn register(name: impl Into<String>, factory: impl AdapterFactory + 'static) -> Result<()> {
    let name = name.into();
    let mut factories = registry().write().unwrap_or_else(PoisonError::into_inner);
    if factories.contains_key(&name) {
        return Err(KeyvError::AdapterAlreadyRegistered(name));
    }
    debug!("Registering adapter {}", name);
    factories.insert(name, Arc::new(factory));
    Ok(())
}

/// Finds the factory registered for `name`.
pub(crate) fn lookup(name: &str) -> Option<Arc<dyn AdapterFactory>> {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}
