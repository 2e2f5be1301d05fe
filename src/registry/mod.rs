//! Shared, explicitly constructed gateway state.
//!
//! Everything request handlers need beyond their own connection lives in
//! a [`Registry`] that is built once at startup and passed down as an
//! `Arc`. There are no process-wide singletons, so tests can build as many
//! isolated registries as they like.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AliasTable`] | Bijective store-name aliases |
//! | [`KeyedConnectionPool`] | Lazily populated client cache |
//! | [`Registry`] | Aliases plus named generation pipelines |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::backend::GenerationBackend;
use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Bijective alias table.
pub mod alias;

/// Keyed client cache.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use alias::{AliasTable, parse_alias};
pub use pool::KeyedConnectionPool;

// ============================================================================
// Registry
// ============================================================================

/// Aliases and generation pipelines shared by every session.
pub struct Registry {
    /// Store-name aliases.
    aliases: Arc<AliasTable>,
    /// Backends by pipeline name.
    pipelines: FxHashMap<String, Arc<dyn GenerationBackend>>,
    /// Pipeline served by the routes without a pipeline segment.
    default_pipeline: Option<String>,
}

impl Registry {
    /// Creates a registry with no pipelines.
    #[must_use]
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases: Arc::new(aliases),
            pipelines: FxHashMap::default(),
            default_pipeline: None,
        }
    }

    /// Registers a backend under `name`.
    ///
    /// The first registered pipeline becomes the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is empty or already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::config("pipeline name must not be empty"));
        }
        if self.pipelines.contains_key(&name) {
            return Err(Error::config(format!(
                "pipeline '{name}' is already registered"
            )));
        }

        if self.default_pipeline.is_none() {
            self.default_pipeline = Some(name.clone());
        }
        self.pipelines.insert(name, backend);
        Ok(())
    }

    /// Makes `name` the default pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineNotFound`] if no such pipeline exists.
    pub fn set_default_pipeline(&mut self, name: &str) -> Result<()> {
        if !self.pipelines.contains_key(name) {
            return Err(Error::pipeline_not_found(name));
        }
        self.default_pipeline = Some(name.to_string());
        Ok(())
    }

    /// Looks up a pipeline; `None` selects the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineNotFound`] if the pipeline does not exist.
    pub fn pipeline(&self, name: Option<&str>) -> Result<(&str, Arc<dyn GenerationBackend>)> {
        let name = name
            .or(self.default_pipeline.as_deref())
            .ok_or_else(|| Error::pipeline_not_found("<default>"))?;

        self.pipelines
            .get_key_value(name)
            .map(|(name, backend)| (name.as_str(), Arc::clone(backend)))
            .ok_or_else(|| Error::pipeline_not_found(name))
    }

    /// Returns the alias table.
    #[inline]
    #[must_use]
    pub fn aliases(&self) -> &Arc<AliasTable> {
        &self.aliases
    }

    /// Returns the default pipeline name, if any pipeline is registered.
    #[inline]
    #[must_use]
    pub fn default_pipeline(&self) -> Option<&str> {
        self.default_pipeline.as_deref()
    }

    /// Returns the registered pipeline names, sorted.
    #[must_use]
    pub fn pipeline_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("aliases", &self.aliases.len())
            .field("pipelines", &self.pipeline_names())
            .field("default_pipeline", &self.default_pipeline)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
