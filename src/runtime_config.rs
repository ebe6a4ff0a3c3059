//! # Runtime Configuration Module
//!
//! Limits applied while decoding request bodies, loaded from environment
//! variables or a YAML document.
//!
//! ## Environment Variables
//!
//! Every size accepts decimal (`1048576`) or hexadecimal (`0x100000`) values.
//!
//! ### `REQBIND_MAX_BODY_SIZE`
//!
//! Largest body accepted, in bytes. Larger bodies fail with HTTP 413 before
//! any decoding happens. Default: `0x100000` (1 MiB).
//!
//! ### `REQBIND_SPOOL_THRESHOLD`
//!
//! Uploaded files larger than this many bytes are written to an anonymous
//! temporary file instead of being held in memory. Default: `0x10000` (64 KiB).
//!
//! ### `REQBIND_MAX_FORM_PARTS`
//!
//! Maximum number of entries in a urlencoded or multipart form. Default: `128`.
//!
//! ## Usage
//!
//! ```rust
//! use reqbind::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Max body: {} bytes", config.max_body_size);
//!
//! let yaml = RuntimeConfig::from_yaml_str("max_body_size: 0x2000\n").unwrap();
//! assert_eq!(yaml.max_body_size, 8192);
//! assert_eq!(yaml.max_form_parts, 128);
//! ```

use anyhow::Context;
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::Path;

pub const DEFAULT_MAX_BODY_SIZE: usize = 0x10_0000;
pub const DEFAULT_SPOOL_THRESHOLD: usize = 0x1_0000;
pub const DEFAULT_MAX_FORM_PARTS: usize = 128;

/// Body decoding limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Largest request body in bytes (default: 1 MiB)
    #[serde(deserialize_with = "size_value")]
    pub max_body_size: usize,
    /// Uploads above this size spool to disk (default: 64 KiB)
    #[serde(deserialize_with = "size_value")]
    pub spool_threshold: usize,
    /// Maximum number of form entries (default: 128)
    #[serde(deserialize_with = "size_value")]
    pub max_form_parts: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            max_form_parts: DEFAULT_MAX_FORM_PARTS,
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal size.
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn env_size(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(val) => parse_size(&val).unwrap_or(default),
        Err(_) => default,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(usize),
    Text(String),
}

fn size_value<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::Text(s) => {
            parse_size(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid size '{}'", s)))
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables, falling back to defaults
    /// for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        RuntimeConfig {
            max_body_size: env_size("REQBIND_MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE),
            spool_threshold: env_size("REQBIND_SPOOL_THRESHOLD", DEFAULT_SPOOL_THRESHOLD),
            max_form_parts: env_size("REQBIND_MAX_FORM_PARTS", DEFAULT_MAX_FORM_PARTS),
        }
    }

    /// Parse a YAML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or an unparsable size.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("invalid runtime configuration")
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime configuration from {}", path.display()))?;
        Self::from_yaml_str(&text)
    }
}
