//! Builder pattern for gateway configuration.
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
//! let stores = LocalBackend::store_pool();
//! let gateway = Gateway::builder()
//!     .port(8080)
//!     .alias("s1=zk1:2181/hbase")
//!     .pipeline("heat", Arc::new(LocalBackend::new(stores)))
//!     .bind()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::backend::GenerationBackend;
use crate::error::{Error, Result};
use crate::registry::{AliasTable, Registry};

use super::core::Gateway;
use super::options::GatewayOptions;

// ============================================================================
// GatewayBuilder
// ============================================================================

/// Builder for configuring a [`Gateway`].
///
/// Use [`Gateway::builder()`] to create a new builder.
#[derive(Default)]
pub struct GatewayBuilder {
    /// Listener and session settings.
    options: GatewayOptions,
    /// Raw `alias=value` arguments.
    aliases: Vec<String>,
    /// Pipelines in registration order.
    pipelines: Vec<(String, Arc<dyn GenerationBackend>)>,
    /// Explicit default pipeline.
    default_pipeline: Option<String>,
}

// ============================================================================
// GatewayBuilder Implementation
// ============================================================================

impl GatewayBuilder {
    /// Creates a builder listening on `127.0.0.1:8080` with no pipelines.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options = self.options.with_host(host);
        self
    }

    /// Sets the listen port (0 for random).
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options = self.options.with_port(port);
        self
    }

    /// Adds a store alias in `alias=value` form.
    ///
    /// Validated by [`bind`](Self::bind).
    #[inline]
    #[must_use]
    pub fn alias(mut self, arg: impl Into<String>) -> Self {
        self.aliases.push(arg.into());
        self
    }

    /// Registers a backend under `name`.
    ///
    /// The first pipeline registered is the default unless
    /// [`default_pipeline`](Self::default_pipeline) says otherwise.
    #[inline]
    #[must_use]
    pub fn pipeline(mut self, name: impl Into<String>, backend: Arc<dyn GenerationBackend>) -> Self {
        self.pipelines.push((name.into(), backend));
        self
    }

    /// Selects the pipeline served on `/tile-dispatch` and `/meta-dispatch`.
    #[inline]
    #[must_use]
    pub fn default_pipeline(mut self, name: impl Into<String>) -> Self {
        self.default_pipeline = Some(name.into());
        self
    }

    /// Sets the maximum inbound frame size in bytes.
    #[inline]
    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.options = self.options.with_max_frame_size(bytes);
        self
    }

    /// Sets the deadline for writing one response.
    #[inline]
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_write_timeout(timeout);
        self
    }

    /// Sets how long a client may take to finish the upgrade handshake.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_handshake_timeout(timeout);
        self
    }

    /// Sets how many handlers may run at once per session.
    #[inline]
    #[must_use]
    pub fn max_in_flight(mut self, handlers: usize) -> Self {
        self.options = self.options.with_max_in_flight(handlers);
        self
    }

    /// Validates the configuration, binds the listener and starts
    /// accepting sessions.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no pipeline is registered, a name repeats, or a limit is zero
    /// - [`Error::Alias`] if an alias is malformed or not one-to-one
    /// - [`Error::PipelineNotFound`] if the default pipeline is unknown
    /// - [`Error::Io`] if binding fails
    pub async fn bind(self) -> Result<Gateway> {
        let (registry, options) = self.into_parts()?;
        Gateway::bind(registry, options).await
    }
}

// ============================================================================
// Validation
// ============================================================================

impl GatewayBuilder {
    /// Builds the registry and checks the limits.
    fn into_parts(self) -> Result<(Registry, GatewayOptions)> {
        if self.pipelines.is_empty() {
            return Err(Error::config(
                "At least one pipeline is required. Use .pipeline() to add one.\n\
                 Example: Gateway::builder().pipeline(\"heat\", backend)",
            ));
        }

        Self::validate_limits(&self.options)?;

        let mut registry = Registry::new(AliasTable::parse(&self.aliases)?);
        for (name, backend) in self.pipelines {
            registry.register(name, backend)?;
        }
        if let Some(name) = &self.default_pipeline {
            registry.set_default_pipeline(name)?;
        }

        Ok((registry, self.options))
    }

    fn validate_limits(options: &GatewayOptions) -> Result<()> {
        let limits = &options.dispatcher;

        if limits.max_frame_size == 0 {
            return Err(Error::config("max_frame_size must be greater than zero"));
        }
        if limits.write_timeout.is_zero() {
            return Err(Error::config("write_timeout must be greater than zero"));
        }
        if limits.handshake_timeout.is_zero() {
            return Err(Error::config("handshake_timeout must be greater than zero"));
        }
        if limits.max_in_flight == 0 || limits.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(Error::config(format!(
                "max_in_flight must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pipelines: Vec<_> = self.pipelines.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("GatewayBuilder")
            .field("options", &self.options)
            .field("aliases", &self.aliases)
            .field("pipelines", &pipelines)
            .field("default_pipeline", &self.default_pipeline)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
