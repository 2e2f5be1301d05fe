//! Lazily-populated cache of backend client handles.
//!
//! Backend clients (HBase, ZooKeeper-backed stores) are expensive to
//! connect, so they are built once per endpoint and reused by every
//! request that targets it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          KeyedConnectionPool             │
//! │  ┌────────────────────────────────────┐  │
//! │  │ zk1:/hbase   → Arc<Client 1>       │  │
//! │  │ zk2:/tiles   → Arc<Client 2>       │  │
//! │  └────────────────────────────────────┘  │
//! │      lookup + insert under one lock      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Handles are never evicted or health-checked. Callers that see a broken
//! handle retry at their own level.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Builds a client for a key. Runs inside the pool's critical section and
/// must not call back into the pool.
type Factory<K, H> = Box<dyn Fn(&K) -> Result<H> + Send + Sync>;

// ============================================================================
// KeyedConnectionPool
// ============================================================================

/// Cache mapping a composite key to a shared client handle.
///
/// At most one handle is ever constructed per key.
pub struct KeyedConnectionPool<K, H> {
    /// Constructed handles by key.
    clients: Mutex<FxHashMap<K, Arc<H>>>,
    /// Client constructor.
    factory: Factory<K, H>,
}

impl<K, H> KeyedConnectionPool<K, H>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// Creates an empty pool using `factory` to build missing handles.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&K) -> Result<H> + Send + Sync + 'static,
    {
        Self {
            clients: Mutex::new(FxHashMap::default()),
            factory: Box::new(factory),
        }
    }

    /// Returns the handle for `key`, constructing it on first use.
    ///
    /// Lookup and insert happen under the same lock, so racing callers
    /// for one key always share a single handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolConstruction`] if the factory fails. Failures
    /// are not cached; the next call tries again.
    pub fn get_or_create(&self, key: &K) -> Result<Arc<H>> {
        let mut clients = self.clients.lock();

        if let Some(client) = clients.get(key) {
            return Ok(Arc::clone(client));
        }

        debug!(%key, "Connecting pooled client");

        let client = (self.factory)(key).map_err(|e| {
            warn!(%key, error = %e, "Pooled client construction failed");
            match e {
                e @ Error::PoolConstruction { .. } => e,
                other => Error::pool_construction(key.to_string(), other.to_string()),
            }
        })?;

        let client = Arc::new(client);
        clients.insert(key.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Returns `true` if a handle exists for `key`.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.clients.lock().contains_key(key)
    }

    /// Returns the number of constructed handles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Returns `true` if no handle has been constructed yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl<K, H> fmt::Debug for KeyedConnectionPool<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedConnectionPool")
            .field("clients", &self.clients.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
