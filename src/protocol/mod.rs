//! WebSocket protocol message types.
//!
//! Frames are opaque bytes to the transport. This module gives them
//! meaning for the generation handlers.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `TileRequest` | Client → Gateway | Generate one tile |
//! | `MetaRequest` | Client → Gateway | Generate metadata |
//! | `Response` | Gateway → Client | Echoed request + outcome |
//!
//! Responses arrive in completion order, not request order. Clients match
//! them to requests by the echoed fields (`type`, `coord`, `store`, ...).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Request types and parsing |
//! | `response` | Response envelope and error sanitizing |

// ============================================================================
// Submodules
// ============================================================================

/// Request message types.
pub mod request;

/// Response envelope.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::{GenerationRequest, MetaRequest, RequestKind, TileCoord, TileRequest};
pub use response::{Payload, Response, sanitize};
