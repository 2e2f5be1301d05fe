//! Response envelope sent back over a session.
//!
//! # Format
//!
//! Success:
//! ```json
//! {
//!   "type": "heat",
//!   "coord": { "x": 1, "y": 2, "z": 3 },
//!   "store": "s1",
//!   "success": true,
//!   "row": "03,1,2"
//! }
//! ```
//!
//! Failure:
//! ```json
//! {
//!   "type": "heat",
//!   "coord": { "x": 1, "y": 2, "z": 3 },
//!   "store": "s1",
//!   "success": false,
//!   "error": "store 's1' unavailable"
//! }
//! ```
//!
//! The request fields are echoed first, then the envelope fields, then
//! the backend payload. Payload keys that collide with either are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::GenerationResult;

use super::GenerationRequest;

// ============================================================================
// Types
// ============================================================================

/// Backend output merged into a success response.
pub type Payload = Map<String, Value>;

/// Envelope keys that payloads and client fields may not override.
pub(super) const ENVELOPE_KEYS: [&str; 2] = ["success", "error"];

/// Terminal control sequences: CSI (colours, cursor), OSC and two-byte escapes.
static TERMINAL_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-Z\\-_])")
        .expect("terminal escape pattern is valid")
});

// ============================================================================
// Response
// ============================================================================

/// Response to one generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Echoed request. Absent when the frame could not be parsed.
    #[serde(flatten)]
    pub request: Option<GenerationRequest>,

    /// `true` exactly when `error` is absent.
    pub success: bool,

    /// Sanitized error text (failures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Backend output (successes only).
    #[serde(flatten)]
    pub payload: Payload,
}

impl Response {
    /// Creates a success response carrying `payload`.
    #[must_use]
    pub fn success(request: GenerationRequest, mut payload: Payload) -> Self {
        let echoed = serde_json::to_value(&request).ok();
        payload.retain(|key, _| {
            !ENVELOPE_KEYS.contains(&key.as_str())
                && !echoed
                    .as_ref()
                    .and_then(Value::as_object)
                    .is_some_and(|fields| fields.contains_key(key))
        });

        Self {
            request: Some(request),
            success: true,
            error: None,
            payload,
        }
    }

    /// Creates a failure response. Terminal escapes are stripped from the
    /// error text.
    #[must_use]
    pub fn failure(request: Option<GenerationRequest>, error: &impl Display) -> Self {
        Self {
            request,
            success: false,
            error: Some(sanitize(&error.to_string())),
            payload: Payload::new(),
        }
    }

    /// Creates the response for a finished generation.
    #[must_use]
    pub fn from_outcome(request: GenerationRequest, outcome: GenerationResult) -> Self {
        match outcome {
            Ok(payload) => Self::success(request, payload),
            Err(e) => Self::failure(Some(request), &e),
        }
    }

    /// Returns `true` for a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }
}

// ============================================================================
// Sanitizing
// ============================================================================

/// Removes terminal colour and control escape sequences from `text`.
#[must_use]
pub fn sanitize(text: &str) -> String {
    TERMINAL_ESCAPE.replace_all(text, "").into_owned()
}

// ============================================================================
// Tests
// ============================================================================
