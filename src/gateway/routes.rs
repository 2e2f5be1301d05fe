//! Upgrade path routing.
//!
//! | Path | Kind | Pipeline |
//! |------|------|----------|
//! | `/ws/tile/{pipeline}` | tile | named |
//! | `/ws/meta/{pipeline}` | meta | named |
//! | `/tile-dispatch` | tile | default |
//! | `/meta-dispatch` | meta | default |
//!
//! Pipeline segments are percent-decoded.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::protocol::RequestKind;

// ============================================================================
// Constants
// ============================================================================

const TILE_PREFIX: &str = "/ws/tile/";
const META_PREFIX: &str = "/ws/meta/";
const TILE_DEFAULT: &str = "/tile-dispatch";
const META_DEFAULT: &str = "/meta-dispatch";

// ============================================================================
// Route
// ============================================================================

/// Request kind and pipeline selected by an upgrade path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Request kind served on the session.
    pub kind: RequestKind,
    /// Named pipeline; `None` selects the default.
    pub pipeline: Option<String>,
}

impl Route {
    /// Route for `kind` on the default pipeline.
    #[inline]
    #[must_use]
    pub fn default_pipeline(kind: RequestKind) -> Self {
        Self {
            kind,
            pipeline: None,
        }
    }

    /// Route for `kind` on the pipeline called `name`.
    #[inline]
    #[must_use]
    pub fn named(kind: RequestKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            pipeline: Some(name.into()),
        }
    }

    /// Parses an upgrade request path. Returns `None` for unknown paths.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        match path {
            TILE_DEFAULT => return Some(Self::default_pipeline(RequestKind::Tile)),
            META_DEFAULT => return Some(Self::default_pipeline(RequestKind::Meta)),
            _ => {}
        }

        let (kind, segment) = if let Some(rest) = path.strip_prefix(TILE_PREFIX) {
            (RequestKind::Tile, rest)
        } else if let Some(rest) = path.strip_prefix(META_PREFIX) {
            (RequestKind::Meta, rest)
        } else {
            return None;
        };

        if segment.is_empty() || segment.contains('/') {
            return None;
        }

        let name = urlencoding::decode(segment).ok()?;
        if name.is_empty() {
            return None;
        }
        Some(Self::named(kind, name.into_owned()))
    }

    /// Returns the canonical path for this route.
    #[must_use]
    pub fn path(&self) -> String {
        match (&self.pipeline, self.kind) {
            (None, RequestKind::Tile) => TILE_DEFAULT.to_string(),
            (None, RequestKind::Meta) => META_DEFAULT.to_string(),
            (Some(name), RequestKind::Tile) => format!("{TILE_PREFIX}{}", urlencoding::encode(name)),
            (Some(name), RequestKind::Meta) => format!("{META_PREFIX}{}", urlencoding::encode(name)),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        assert_eq!(
            Route::parse("/tile-dispatch"),
            Some(Route::default_pipeline(RequestKind::Tile))
        );
        assert_eq!(
            Route::parse("/meta-dispatch"),
            Some(Route::default_pipeline(RequestKind::Meta))
        );
    }

    #[test]
    fn test_named_routes() {
        assert_eq!(
            Route::parse("/ws/tile/heat"),
            Some(Route::named(RequestKind::Tile, "heat"))
        );
        assert_eq!(
            Route::parse("/ws/meta/heat"),
            Some(Route::named(RequestKind::Meta, "heat"))
        );
    }

    #[test]
    fn test_pipeline_is_percent_decoded() {
        let route = Route::parse("/ws/tile/heat%20map").expect("known route");
        assert_eq!(route.pipeline.as_deref(), Some("heat map"));
        assert_eq!(route.path(), "/ws/tile/heat%20map");
    }

    #[test]
    fn test_unknown_paths() {
        for path in [
            "/",
            "/ws",
            "/ws/tile",
            "/ws/tile/",
            "/ws/tile/a/b",
            "/ws/other/heat",
            "/tile-dispatch/",
            "/tile",
        ] {
            assert_eq!(Route::parse(path), None, "{path}");
        }
    }

    #[test]
    fn test_one_shot_http_paths_are_not_routed() {
        for path in ["/tile/heat", "/meta/heat"] {
            assert_eq!(Route::parse(path), None, "{path}");
        }
    }

    #[test]
    fn test_path_round_trips() {
        for route in [
            Route::default_pipeline(RequestKind::Tile),
            Route::default_pipeline(RequestKind::Meta),
            Route::named(RequestKind::Tile, "heat"),
            Route::named(RequestKind::Meta, "a/b"),
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route.clone()));
        }
    }
}
