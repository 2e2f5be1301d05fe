//! Bijective alias table.
//!
//! Clients may refer to long store identifiers (ZooKeeper hosts, table
//! names) by short aliases. The table is checked for one-to-one mapping
//! when it is built, so lookups are total and never fail.
//!
//! # Example
//!
//! ```
//! use tilegate::registry::AliasTable;
//!
//! let table = AliasTable::parse(["prod=zk1.internal:2181/hbase"]).unwrap();
//! assert_eq!(table.unalias("prod"), "zk1.internal:2181/hbase");
//! assert_eq!(table.alias("zk1.internal:2181/hbase"), "prod");
//! assert_eq!(table.unalias("other"), "other");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

// ============================================================================
// AliasTable
// ============================================================================

/// One-to-one mapping between aliases and the values they stand for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    /// alias -> value
    forward: FxHashMap<String, String>,
    /// value -> alias
    inverse: FxHashMap<String, String>,
}

impl AliasTable {
    /// Creates an empty table. Every lookup is the identity.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(alias, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Alias`] on a duplicate alias or a duplicate value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::new();
        for (alias, value) in pairs {
            table.insert(alias, value)?;
        }
        Ok(table)
    }

    /// Builds a table from `alias=value` arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Alias`] if an argument is malformed or the mapping
    /// is not one-to-one.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = args
            .into_iter()
            .map(|arg| parse_alias(arg.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_pairs(pairs)
    }

    /// Adds one alias.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Alias`] if `alias` is already mapped or `value`
    /// already has an alias. The table is left unchanged.
    pub fn insert(&mut self, alias: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let alias = alias.into();
        let value = value.into();

        if self.forward.contains_key(&alias) {
            return Err(Error::alias(format!(
                "key '{alias}' has already been aliased, duplicate aliases are not supported"
            )));
        }
        if let Some(existing) = self.inverse.get(&value) {
            return Err(Error::alias(format!(
                "value '{value}' has already been aliased under '{existing}', \
                 duplicate alias mappings are not supported"
            )));
        }

        self.inverse.insert(value.clone(), alias.clone());
        self.forward.insert(alias, value);
        Ok(())
    }

    /// Resolves an alias to its value, or returns `name` unchanged.
    #[inline]
    #[must_use]
    pub fn unalias<'a>(&'a self, name: &'a str) -> &'a str {
        self.forward.get(name).map_or(name, String::as_str)
    }

    /// Finds the alias of a value, or returns `value` unchanged.
    #[inline]
    #[must_use]
    pub fn alias<'a>(&'a self, value: &'a str) -> &'a str {
        self.inverse.get(value).map_or(value, String::as_str)
    }

    /// Returns the number of aliases.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no aliases are defined.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Iterates over `(alias, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for AliasTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable();

        for (i, (alias, value)) in pairs.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{alias}: {value}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Splits an `alias=value` argument.
///
/// Only the first `=` separates; the value may itself contain `=`.
///
/// # Errors
///
/// Returns [`Error::Alias`] if there is no `=` or either side is empty.
pub fn parse_alias(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((alias, value)) if !alias.is_empty() && !value.is_empty() => {
            Ok((alias.to_string(), value.to_string()))
        }
        _ => Err(Error::alias(format!(
            "invalid alias '{arg}', expected 'alias=value'"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
