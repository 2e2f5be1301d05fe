//! Tilegate - WebSocket gateway for tile and metadata generation.
//!
//! Clients open a WebSocket session and stream generation requests over
//! it. Every request is handled concurrently and answered as soon as its
//! backend finishes, so one slow tile never delays the rest.
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──► Gateway ──route──► Dispatcher ──frame──► GenerationHandler
//!                                       ▲                        │
//!                                       │                  GenerationBackend
//!                                       │                        │ Promise
//!                                       └──── send_response ◄────┘
//! ```
//!
//! Key design principles:
//!
//! - One [`Dispatcher`](transport::Dispatcher) per session; one task per request
//! - Responses are whole frames written under a lock, in completion order
//! - A session closes only after every in-flight request has been answered
//! - Shared state lives in an explicitly built [`Registry`](registry::Registry)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tilegate::{Gateway, Result};
//! use tilegate::backend::LocalBackend;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let stores = LocalBackend::store_pool();
//!
//!     let gateway = Gateway::builder()
//!         .port(8080)
//!         .alias("s1=zk1:2181/hbase")
//!         .pipeline("heat", Arc::new(LocalBackend::new(stores)))
//!         .bind()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     gateway.shutdown(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | Generation backend trait and the local backend |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`gateway`] | Listener, routing and configuration |
//! | [`handler`] | Tile and metadata request handlers |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`promise`] | Single-shot completion cell |
//! | [`protocol`] | Request and response message types |
//! | [`registry`] | Aliases, pipelines and client pools |
//! | [`transport`] | Per-session WebSocket dispatcher |

// ============================================================================
// Modules
// ============================================================================

/// Generation backends.
pub mod backend;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// WebSocket gateway server.
pub mod gateway;

/// Tile and metadata request handlers.
pub mod handler;

/// Type-safe identifiers.
pub mod identifiers;

/// Single-shot completion cell.
pub mod promise;

/// Request and response message types.
pub mod protocol;

/// Shared gateway state.
pub mod registry;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Backend types
pub use backend::{GenerationBackend, GenerationError, GenerationResult, LocalBackend};

// Error types
pub use error::{Error, Result};

// Gateway types
pub use gateway::{Gateway, GatewayBuilder, GatewayOptions, Route};

// Handler types
pub use handler::GenerationHandler;

// Identifier types
pub use identifiers::ConnectionId;

// Promise types
pub use promise::{Promise, Resolver};

// Protocol types
pub use protocol::{GenerationRequest, Payload, RequestKind, Response};

// Registry types
pub use registry::{AliasTable, KeyedConnectionPool, Registry};

// Transport types
pub use transport::{Dispatcher, DispatcherOptions, RequestHandler};
