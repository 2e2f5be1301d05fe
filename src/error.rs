//! Error types for the gateway.
//!
//! One error enum covers every failure the gateway reports. Backend
//! generation failures are separate (`backend::GenerationError`) because
//! they travel inside responses instead of ending operations.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tilegate::{Error, Result};
//!
//! async fn example(dispatcher: &Dispatcher) -> Result<()> {
//!     dispatcher.send_response(&serde_json::json!({ "success": true })).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Alias`] |
//! | Connection | [`Error::Handshake`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::WriteTimeout`] |
//! | Protocol | [`Error::Protocol`], [`Error::PipelineNotFound`] |
//! | Completion | [`Error::PromiseAbandoned`], [`Error::PoolConstruction`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when gateway options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Alias table error.
    ///
    /// Returned when an alias would break the one-to-one mapping.
    #[error("Alias error: {message}")]
    Alias {
        /// Description of the conflicting alias.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket upgrade handshake failed.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Transport failure on an established connection.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Peer closed the connection, or it was closed locally.
    ///
    /// This is the normal "connection ended" signal of the read loop.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A response write exceeded its deadline.
    #[error("Write timed out after {timeout_ms}ms")]
    WriteTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// No backend registered under the requested pipeline name.
    #[error("Pipeline not found: {pipeline}")]
    PipelineNotFound {
        /// The missing pipeline name.
        pipeline: String,
    },

    // ========================================================================
    // Completion Errors
    // ========================================================================
    /// The producer dropped its resolver without resolving.
    #[error("Promise abandoned before it was resolved")]
    PromiseAbandoned,

    /// A keyed pool factory failed to build a handle.
    #[error("Failed to create pooled client for '{key}': {message}")]
    PoolConstruction {
        /// Display form of the pool key.
        key: String,
        /// Description of the factory failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an alias error.
    #[inline]
    pub fn alias(message: impl Into<String>) -> Self {
        Self::Alias {
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a write timeout error.
    #[inline]
    pub fn write_timeout(timeout_ms: u64) -> Self {
        Self::WriteTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a pipeline not found error.
    #[inline]
    pub fn pipeline_not_found(pipeline: impl Into<String>) -> Self {
        Self::PipelineNotFound {
            pipeline: pipeline.into(),
        }
    }

    /// Creates a pool construction error.
    #[inline]
    pub fn pool_construction(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PoolConstruction {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WriteTimeout { .. })
    }

    /// Returns `true` if the error means the transport can no longer be used.
    ///
    /// Parse, generation and pool errors are never connection-fatal.
    #[inline]
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WriteTimeout { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if this is the orderly end of a connection.
    #[inline]
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::WebSocket(e) => matches!(
                e,
                WsError::ConnectionClosed | WsError::AlreadyClosed
            ),
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
