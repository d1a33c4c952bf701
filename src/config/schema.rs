//! Configuration schema definitions.
//!
//! The supervisor only understands the `log` section. Every other top-level
//! key is carried through untouched so that the supervised service can pull
//! its own sections out with [`Options::section`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root options value produced by parsing (and merging) config fragments.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Logging settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogOptions>,

    /// All remaining top-level sections, opaque to the supervisor.
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogOptions {
    /// Disable logging entirely.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Output path; stderr when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Emit timestamps.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timestamp: bool,

    /// Strip ANSI colours from log output.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_color: bool,
}

impl Options {
    /// Force colourless log output, creating the `log` section if needed.
    pub fn force_disable_color(&mut self) {
        self.log.get_or_insert_with(LogOptions::default).disable_color = true;
    }

    /// Decode a top-level section by key.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.sections
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }
}
