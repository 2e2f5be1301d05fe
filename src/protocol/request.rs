//! Generation request message types.
//!
//! Each inbound frame on a tile or meta session carries one JSON request.
//! Requests are echoed back verbatim in their response so the peer can
//! correlate out-of-order replies.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::response::ENVELOPE_KEYS;

// ============================================================================
// Constants
// ============================================================================

/// Longest slice of an unparseable frame quoted back in the error message.
const MAX_QUOTED_FRAME: usize = 256;

// ============================================================================
// TileCoord
// ============================================================================

/// Tile address in a z/x/y pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Zoom level.
    pub z: u32,
}

impl TileCoord {
    /// Creates a coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Returns the store row key for this tile.
    ///
    /// Format: `zz,xxx,yyy` where x and y are zero-padded to the number of
    /// decimal digits in `2^z`, so keys of one zoom level sort spatially.
    #[must_use]
    pub fn row_key(&self) -> String {
        let width = digits(1_u128 << self.z.min(127));
        format!(
            "{:02},{:0width$},{:0width$}",
            self.z,
            self.x,
            self.y,
            width = width
        )
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of decimal digits in `n`.
fn digits(mut n: u128) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

// ============================================================================
// TileRequest
// ============================================================================

/// A request to generate one tile.
///
/// # Format
///
/// ```json
/// {
///   "type": "heatmap",
///   "coord": { "x": 1, "y": 2, "z": 3 },
///   "store": "s1",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRequest {
    /// Tile generation type.
    #[serde(rename = "type")]
    pub tile_type: String,

    /// Tile coordinate.
    pub coord: TileCoord,

    /// Target store identifier (may be an alias).
    pub store: String,

    /// Source data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Free-form generation parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,

    /// Any other fields the client sent, echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// MetaRequest
// ============================================================================

/// A request to generate metadata for a data source.
///
/// # Format
///
/// ```json
/// {
///   "type": "default",
///   "store": "s1",
///   "index": "tweets"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRequest {
    /// Meta generation type.
    #[serde(rename = "type")]
    pub meta_type: String,

    /// Target store identifier (may be an alias).
    pub store: String,

    /// Source index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    /// Free-form generation parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,

    /// Any other fields the client sent, echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// RequestKind
// ============================================================================

/// Which domain a session serves. Chosen by the upgrade path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Tile generation.
    Tile,
    /// Metadata generation.
    Meta,
}

impl RequestKind {
    /// Parses a frame into a request of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a valid request.
    /// The message quotes (a prefix of) the frame.
    ///
    /// Unknown top-level fields are kept for the echo, except `success`
    /// and `error`, which belong to the response envelope.
    pub fn parse(self, frame: &[u8]) -> Result<GenerationRequest> {
        let request = match self {
            Self::Tile => serde_json::from_slice(frame).map(GenerationRequest::Tile),
            Self::Meta => serde_json::from_slice(frame).map(GenerationRequest::Meta),
        };

        match request {
            Ok(request) if request.domain_type().is_empty() => Err(self.parse_error(frame, "empty type")),
            Ok(request) if request.store().is_empty() => Err(self.parse_error(frame, "empty store")),
            Ok(mut request) => {
                request.extra_mut().retain(|key, _| !ENVELOPE_KEYS.contains(&key.as_str()));
                Ok(request)
            }
            Err(e) => Err(self.parse_error(frame, &e.to_string())),
        }
    }

    fn parse_error(self, frame: &[u8], reason: &str) -> Error {
        let text = String::from_utf8_lossy(frame);
        let quoted: String = text.chars().take(MAX_QUOTED_FRAME).collect();
        Error::protocol(format!(
            "unable to parse {self} request message: {quoted} ({reason})"
        ))
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tile => f.write_str("tile"),
            Self::Meta => f.write_str("meta"),
        }
    }
}

// ============================================================================
// GenerationRequest
// ============================================================================

/// A parsed tile or meta request.
///
/// Serializes to the same object the client sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerationRequest {
    /// Tile request.
    Tile(TileRequest),
    /// Meta request.
    Meta(MetaRequest),
}

impl GenerationRequest {
    /// Returns the domain of this request.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Tile(_) => RequestKind::Tile,
            Self::Meta(_) => RequestKind::Meta,
        }
    }

    /// Returns the generation type (`"type"` field).
    #[inline]
    #[must_use]
    pub fn domain_type(&self) -> &str {
        match self {
            Self::Tile(req) => &req.tile_type,
            Self::Meta(req) => &req.meta_type,
        }
    }

    /// Returns the target store identifier.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &str {
        match self {
            Self::Tile(req) => &req.store,
            Self::Meta(req) => &req.store,
        }
    }

    /// Returns the free-form parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        match self {
            Self::Tile(req) => &req.params,
            Self::Meta(req) => &req.params,
        }
    }

    /// Returns the unrecognised fields carried for the echo.
    #[inline]
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        match self {
            Self::Tile(req) => &req.extra,
            Self::Meta(req) => &req.extra,
        }
    }

    fn extra_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::Tile(req) => &mut req.extra,
            Self::Meta(req) => &mut req.extra,
        }
    }

    /// Returns a copy targeting a different store.
    #[must_use]
    pub fn with_store(&self, store: impl Into<String>) -> Self {
        let mut request = self.clone();
        match &mut request {
            Self::Tile(req) => req.store = store.into(),
            Self::Meta(req) => req.store = store.into(),
        }
        request
    }

    /// Returns the `delay_ms` parameter, if any.
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        self.params()
            .get("delay_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
    }

    /// Returns a stable identifier for memoising generated output.
    #[must_use]
    pub fn cache_id(&self) -> String {
        match self {
            Self::Tile(req) => format!(
                "tile/{}/{}/{}",
                req.tile_type,
                req.coord.row_key(),
                Value::Object(req.params.clone())
            ),
            Self::Meta(req) => format!(
                "meta/{}/{}",
                req.meta_type,
                req.index.as_deref().unwrap_or_default()
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
