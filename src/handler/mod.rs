//! Tile and metadata request handlers.
//!
//! A [`GenerationHandler`] is the [`RequestHandler`] behind every session:
//! it decodes a frame, maps the store alias back to the real store, asks
//! the pipeline's backend for a result and writes the response envelope.
//!
//! # Flow
//!
//! ```text
//! frame ─► parse ─► unalias store ─► backend.generate ─► await promise ─► send_response
//!            │                                                  │
//!            └──── failure response (connection stays open) ◄───┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{GenerationBackend, GenerationError, GenerationResult};
use crate::protocol::{RequestKind, Response};
use crate::registry::AliasTable;
use crate::transport::{Dispatcher, Frame, RequestHandler};

// ============================================================================
// GenerationHandler
// ============================================================================

/// Serves one request kind on one pipeline.
pub struct GenerationHandler {
    kind: RequestKind,
    pipeline: String,
    backend: Arc<dyn GenerationBackend>,
    aliases: Arc<AliasTable>,
}

impl GenerationHandler {
    /// Creates a handler for `kind` requests on `pipeline`.
    #[must_use]
    pub fn new(
        kind: RequestKind,
        pipeline: impl Into<String>,
        backend: Arc<dyn GenerationBackend>,
        aliases: Arc<AliasTable>,
    ) -> Self {
        Self {
            kind,
            pipeline: pipeline.into(),
            backend,
            aliases,
        }
    }

    /// Returns the request kind served.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Returns the pipeline name.
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Computes the response for one frame.
    ///
    /// Never fails: every problem becomes a failure response.
    pub async fn respond(&self, frame: &[u8]) -> Response {
        let request = match self.kind.parse(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!(kind = %self.kind, error = %e, "Rejecting malformed request");
                return Response::failure(None, &e);
            }
        };

        let store = self.aliases.unalias(request.store());
        let target = request.with_store(store);

        let outcome: GenerationResult = match self.backend.generate(&target).wait().await {
            Ok(outcome) => outcome,
            Err(e) => Err(GenerationError::failed(e.to_string())),
        };

        if let Err(e) = &outcome {
            warn!(
                pipeline = %self.pipeline,
                kind = %self.kind,
                store = target.store(),
                error = %e,
                "Generation failed"
            );
        }

        Response::from_outcome(request, outcome)
    }
}

#[async_trait]
impl RequestHandler for GenerationHandler {
    async fn handle(&self, dispatcher: &Dispatcher, frame: Frame) {
        let response = self.respond(&frame).await;

        match dispatcher.send_response(&response).await {
            Ok(()) => {}
            Err(e) if e.is_connection_fatal() => warn!(
                id = %dispatcher.id(),
                pipeline = %self.pipeline,
                error = %e,
                "Response dropped, session lost"
            ),
            Err(e) => warn!(
                id = %dispatcher.id(),
                pipeline = %self.pipeline,
                error = %e,
                "Failed to deliver response"
            ),
        }
    }
}

impl fmt::Debug for GenerationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationHandler")
            .field("kind", &self.kind)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
