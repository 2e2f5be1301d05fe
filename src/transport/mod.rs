//! WebSocket transport layer.
//!
//! Each upgraded client connection gets one [`Dispatcher`]. Frames are
//! opaque bytes here; meaning is given by the [`RequestHandler`] the
//! upgrade path selected.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐                 ┌──────────────────────────────┐
//! │  Client      │    WebSocket    │  Dispatcher                  │
//! │              │────────────────►│  read loop ──spawn──► handler │
//! │              │◄────────────────│  send_response ◄───── handler │
//! └──────────────┘   (one frame    │  (write lock)                │
//!                     per reply)   └──────────────────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `Dispatcher::accept` - Upgrade and route by path
//! 2. `Dispatcher::listen_and_respond` - Dispatch frames until the peer leaves
//! 3. `Dispatcher::close` - Drain in-flight handlers, send close frame
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Read loop, response writer, handler trait |
//! | `pending` | Outstanding work counter |

// ============================================================================
// Submodules
// ============================================================================

/// Per-connection dispatcher.
pub mod dispatcher;

/// Outstanding work counter.
pub mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{Dispatcher, DispatcherOptions, Frame, RequestHandler, handler_fn};
pub use pending::{InFlight, PendingGuard};
