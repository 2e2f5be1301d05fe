//! Deterministic in-process backend.
//!
//! [`LocalBackend`] stands in for an external generation library. It
//! resolves each store identifier to a [`StoreKey`], reuses one pooled
//! [`StoreClient`] per key, and produces a small deterministic payload on
//! the blocking worker pool.
//!
//! # Request Parameters
//!
//! | Param | Effect |
//! |-------|--------|
//! | `delay_ms` | Sleep on the worker before producing output |
//! | `fail` | Resolve with a generation error (string value becomes the message) |
//!
//! Each client keeps at most [`DEFAULT_MEMO_CAPACITY`] outputs, evicting the
//! least recently used.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::{FxBuildHasher, FxHasher};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::promise::Promise;
use crate::protocol::{GenerationRequest, Payload};
use crate::registry::KeyedConnectionPool;

use super::{GenerationBackend, GenerationError, GenerationResult};

// ============================================================================
// Types
// ============================================================================

/// Pool of store clients keyed by endpoint.
pub type StorePool = KeyedConnectionPool<StoreKey, StoreClient>;

/// Outputs memoised per store client unless configured otherwise.
pub const DEFAULT_MEMO_CAPACITY: usize = 1024;

// ============================================================================
// StoreKey
// ============================================================================

/// Composite store endpoint: a host plus a root path.
///
/// Parsed from `host` or `host/root/...`; the root defaults to `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// Host (may include a port).
    pub host: String,
    /// Root path, always starting with `/`.
    pub root: String,
}

impl StoreKey {
    /// Parses a store identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidStore`] for an empty host or one
    /// containing whitespace.
    pub fn parse(store: &str) -> Result<Self, GenerationError> {
        let (host, root) = match store.split_once('/') {
            Some((host, rest)) => (host, format!("/{rest}")),
            None => (store, "/".to_string()),
        };

        if host.is_empty() {
            return Err(GenerationError::invalid_store(store, "missing host"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(GenerationError::invalid_store(store, "host contains whitespace"));
        }

        Ok(Self {
            host: host.to_string(),
            root,
        })
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.root)
    }
}

// ============================================================================
// StoreClient
// ============================================================================

/// Long-lived client for one store endpoint.
///
/// Memoises recent output so repeated requests are served from the
/// store instead of being regenerated.
pub struct StoreClient {
    key: StoreKey,
    memo: Mutex<LruCache<String, Payload, FxBuildHasher>>,
}

impl StoreClient {
    /// Creates a client for `key` holding [`DEFAULT_MEMO_CAPACITY`] outputs.
    #[must_use]
    pub fn new(key: StoreKey) -> Self {
        Self::with_capacity(key, DEFAULT_MEMO_CAPACITY)
    }

    /// Creates a client for `key` holding at most `capacity` outputs
    /// (at least one).
    #[must_use]
    pub fn with_capacity(key: StoreKey, capacity: usize) -> Self {
        debug!(%key, capacity, "Connecting to store");
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            key,
            memo: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher)),
        }
    }

    /// Returns the endpoint this client talks to.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Returns the number of memoised outputs.
    #[inline]
    #[must_use]
    pub fn stored(&self) -> usize {
        self.memo.lock().len()
    }

    /// Generates (or fetches) the output for `request`. Blocking.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Failed`] when the request asks to fail.
    pub fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        if let Some(reason) = request.params().get("fail") {
            let message = reason.as_str().unwrap_or("generation failed");
            return Err(GenerationError::failed(message));
        }

        if let Some(delay) = request.delay() {
            thread::sleep(delay);
        }

        let id = request.cache_id();
        if let Some(mut cached) = self.memo.lock().get(&id).cloned() {
            trace!(store = %self.key, id = %id, "Serving stored output");
            cached.insert("cached".into(), Value::Bool(true));
            return Ok(cached);
        }

        let payload = self.render(request, &id);
        self.memo.lock().put(id, payload.clone());
        Ok(payload)
    }

    fn render(&self, request: &GenerationRequest, id: &str) -> Payload {
        let mut hasher = FxHasher::default();
        hasher.write(self.key.to_string().as_bytes());
        hasher.write(id.as_bytes());
        let digest = Base64Standard.encode(hasher.finish().to_be_bytes());

        let mut payload = Payload::new();
        payload.insert("digest".into(), json!(digest));
        payload.insert("cached".into(), json!(false));
        if let GenerationRequest::Tile(tile) = request {
            payload.insert("row".into(), json!(tile.coord.row_key()));
        }
        payload
    }
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memo = self.memo.lock();
        f.debug_struct("StoreClient")
            .field("key", &self.key)
            .field("stored", &memo.len())
            .field("capacity", &memo.cap())
            .finish()
    }
}

// ============================================================================
// LocalBackend
// ============================================================================

/// Backend generating on the blocking pool with pooled store clients.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    stores: Arc<StorePool>,
}

impl LocalBackend {
    /// Creates a backend sharing `stores` with any other backend given it.
    #[inline]
    #[must_use]
    pub fn new(stores: Arc<StorePool>) -> Self {
        Self { stores }
    }

    /// Creates an empty store pool whose clients connect on first use.
    #[must_use]
    pub fn store_pool() -> Arc<StorePool> {
        Arc::new(StorePool::new(|key: &StoreKey| Ok(StoreClient::new(key.clone()))))
    }

    /// Returns the store pool.
    #[inline]
    #[must_use]
    pub fn stores(&self) -> &Arc<StorePool> {
        &self.stores
    }
}

impl GenerationBackend for LocalBackend {
    fn generate(&self, request: &GenerationRequest) -> Promise<GenerationResult> {
        let key = match StoreKey::parse(request.store()) {
            Ok(key) => key,
            Err(e) => return Promise::resolved(Err(e)),
        };

        let client = match self.stores.get_or_create(&key) {
            Ok(client) => client,
            Err(e) => {
                return Promise::resolved(Err(GenerationError::store_unavailable(
                    request.store(),
                    e.to_string(),
                )));
            }
        };

        let request = request.clone();
        trace!(%key, kind = %request.kind(), "Scheduling generation");
        Promise::spawn_blocking(move || client.generate(&request))
    }
}

// ============================================================================
// Tests
// ============================================================================
