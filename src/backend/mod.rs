//! Generation backends.
//!
//! The gateway never computes tiles itself. It hands each parsed request
//! to a [`GenerationBackend`] and gets a [`Promise`] back; the backend is
//! free to run the work on its own schedule.
//!
//! # Contract
//!
//! - [`GenerationBackend::generate`] returns immediately.
//! - The returned promise is resolved exactly once, with
//!   `Err(GenerationError)` on failure rather than panicking.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `local` | Deterministic in-process backend over pooled store clients |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::promise::Promise;
use crate::protocol::{GenerationRequest, Payload};

// ============================================================================
// Submodules
// ============================================================================

/// In-process reference backend.
pub mod local;

// ============================================================================
// Re-exports
// ============================================================================

pub use local::{LocalBackend, StoreClient, StoreKey, StorePool};

// ============================================================================
// Types
// ============================================================================

/// Outcome a backend resolves its promise with.
pub type GenerationResult = StdResult<Payload, GenerationError>;

/// Failure reported by a backend. Never connection-fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The store identifier does not name a usable store.
    #[error("Invalid store '{store}': {message}")]
    InvalidStore {
        /// Store identifier as sent by the client (after unaliasing).
        store: String,
        /// Why it is invalid.
        message: String,
    },

    /// No client could be obtained for the store.
    #[error("Store '{store}' unavailable: {message}")]
    StoreUnavailable {
        /// Store identifier.
        store: String,
        /// Underlying connection failure.
        message: String,
    },

    /// Generation itself failed.
    #[error("Generation failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl GenerationError {
    /// Creates an invalid store error.
    #[inline]
    pub fn invalid_store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStore {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Creates a store unavailable error.
    #[inline]
    pub fn store_unavailable(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Creates a generation failure.
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

// ============================================================================
// GenerationBackend
// ============================================================================

/// Asynchronous tile/meta generator.
pub trait GenerationBackend: Send + Sync + 'static {
    /// Starts generating `request` and returns a promise of the outcome.
    ///
    /// Must not block. Called from inside a tokio runtime.
    fn generate(&self, request: &GenerationRequest) -> Promise<GenerationResult>;
}

// ============================================================================
// Tests
// ============================================================================
