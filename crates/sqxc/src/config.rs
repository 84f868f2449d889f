// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chain configuration - single source of truth for limits and defaults.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (depth limit, buffer sizes)
//! - **Level 2 (Per run)**: [`ChainConfig`], handed to every node on READY
//! - **Level 3 (Shared)**: [`SharedConfig`], lock-free defaults chains snapshot at READY
//!   (see `Chain::with_shared`)
//!
//! # Example
//!
//! ```
//! use sqxc::config::{ChainConfig, SharedConfig, UnknownFieldPolicy};
//!
//! let shared = SharedConfig::default();
//! shared.update(|cfg| cfg.unknown_field = UnknownFieldPolicy::Abort).unwrap();
//!
//! let snapshot = shared.load();
//! assert_eq!(snapshot.unknown_field, UnknownFieldPolicy::Abort);
//! ```

use crate::chain::BlobEncoding;
use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::Arc;

#[cfg(feature = "config-loaders")]
use serde::Deserialize;

/// Maximum number of simultaneously open containers.
///
/// Protects every node against adversarial deeply nested input.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard ceiling accepted by [`ChainConfig::validate`].
pub const MAX_DEPTH_LIMIT: usize = 4096;

/// Initial capacity of adapter scratch buffers (bytes).
///
/// Buffers grow on demand and are never shrunk during a run.
pub const SCRATCH_INITIAL_CAPACITY: usize = 256;

/// Indentation width used by pretty JSON output.
pub const DEFAULT_JSON_INDENT: usize = 2;

/// What the value materializer does with an unknown field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(rename_all = "lowercase"))]
pub enum UnknownFieldPolicy {
    /// Record an `EntryNotFound` warning and skip the value (or the whole container).
    #[default]
    Skip,
    /// Fail the operation.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct JsonOptions {
    pub pretty: bool,
    pub indent: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: DEFAULT_JSON_INDENT,
        }
    }
}

/// Settings for one chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct ChainConfig {
    pub max_depth: usize,
    pub unknown_field: UnknownFieldPolicy,
    /// Forces one textual encoding for byte fields when set.
    pub blob_encoding: Option<BlobEncoding>,
    pub json: JsonOptions,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_field: UnknownFieldPolicy::Skip,
            blob_encoding: None,
            json: JsonOptions::default(),
        }
    }
}

impl ChainConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_unknown_field(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_field = policy;
        self
    }

    pub fn with_blob_encoding(mut self, encoding: BlobEncoding) -> Self {
        self.blob_encoding = Some(encoding);
        self
    }

    pub fn pretty(mut self) -> Self {
        self.json.pretty = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_LIMIT {
            return Err(Error::Config(format!(
                "max_depth must be within 1..={}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        if self.json.indent > 16 {
            return Err(Error::Config(format!(
                "json.indent must be at most 16, got {}",
                self.json.indent
            )));
        }
        Ok(())
    }

    /// Parse and validate a YAML document.
    ///
    /// ```yaml
    /// max_depth: 32
    /// unknown_field: abort
    /// blob_encoding: base64
    /// json:
    ///   pretty: true
    /// ```
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: ChainConfig =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        log::debug!("[config] loaded chain config: {:?}", config);
        Ok(config)
    }

    #[cfg(feature = "config-loaders")]
    pub fn load_yaml(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("[config] reading {}", path.display());
        Self::from_yaml_str(&text)
    }
}

/// Process-wide defaults swapped atomically.
///
/// Readers take a cheap snapshot (`load`); writers replace the whole value.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    current: Arc<ArcSwap<ChainConfig>>,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl SharedConfig {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn load(&self) -> Arc<ChainConfig> {
        self.current.load_full()
    }

    pub fn store(&self, config: ChainConfig) -> Result<()> {
        config.validate()?;
        self.current.store(Arc::new(config));
        Ok(())
    }

    /// Copy-modify-store. Concurrent updates may overwrite each other.
    ///
    /// An invalid result is refused and the current config kept.
    pub fn update(&self, f: impl FnOnce(&mut ChainConfig)) -> Result<()> {
        let mut next = ChainConfig::clone(&self.current.load());
        f(&mut next);
        self.store(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.unknown_field, UnknownFieldPolicy::Skip);
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let err = ChainConfig::default().with_max_depth(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_from_yaml() {
        let yaml = "max_depth: 8\nunknown_field: abort\nblob_encoding: pghex\njson:\n  pretty: true\n";
        let config = ChainConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.unknown_field, UnknownFieldPolicy::Abort);
        assert_eq!(config.blob_encoding, Some(BlobEncoding::PgHex));
        assert!(config.json.pretty);
        assert_eq!(config.json.indent, DEFAULT_JSON_INDENT);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_from_yaml_rejects_invalid() {
        assert!(ChainConfig::from_yaml_str("max_depth: 0").is_err());
        assert!(ChainConfig::from_yaml_str("max_depth: [").is_err());
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_load_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth: 16\njson:\n  indent: 4").unwrap();
        let config = ChainConfig::load_yaml(file.path()).unwrap();
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.json.indent, 4);
        assert!(!config.json.pretty);

        assert!(matches!(
            ChainConfig::load_yaml(file.path().with_extension("missing")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_shared_config_swap() {
        let shared = SharedConfig::default();
        let before = shared.load();
        shared.store(ChainConfig::default().with_max_depth(3)).unwrap();
        assert_eq!(before.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(shared.load().max_depth, 3);
        assert!(shared.store(ChainConfig::default().with_max_depth(0)).is_err());
    }

    #[test]
    fn test_shared_update_validates() {
        let shared = SharedConfig::default();
        shared.update(|cfg| cfg.json.indent = 4).unwrap();
        let err = shared.update(|cfg| cfg.json.indent = 64).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(shared.load().json.indent, 4);
    }
}
