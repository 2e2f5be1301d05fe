//! WebSocket gateway server.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Gateway`] | Listener, accept loop and session supervisor |
//! | [`GatewayBuilder`] | Fluent configuration builder |
//! | [`GatewayOptions`] | Listener and session settings |
//! | [`Route`] | Upgrade path to request kind and pipeline |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tilegate::Gateway;
//! use tilegate::backend::LocalBackend;
//!
//! # async fn example() -> tilegate::Result<()> {
//! let gateway = Gateway::builder()
//!     .host("0.0.0.0")
//!     .port(8080)
//!     .pipeline("heat", Arc::new(LocalBackend::new(LocalBackend::store_pool())))
//!     .bind()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for gateway configuration.
pub mod builder;

/// Listener and session supervisor.
pub mod core;

/// Listener and session settings.
pub mod options;

/// Upgrade path routing.
pub mod routes;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::GatewayBuilder;
pub use core::Gateway;
pub use options::GatewayOptions;
pub use routes::Route;
