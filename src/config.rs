//! Configuration for the probe pipeline.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the standard behaviour: PE, then ELF32, then ELF64.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProbeError, Result};
use crate::formats::Format;

/// Default ceiling for files we agree to map (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Master configuration for probing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Limits applied while mapping the input.
    pub io: IoLimits,
    /// Candidate order and malformed-input policy.
    pub probe: ProbeSettings,
}

/// Resource limits for the mapped input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoLimits {
    /// The absolute maximum file size that can be mapped.
    pub max_file_size: u64,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// What to do when a backend recognizes the container but fails to parse it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Stop probing and report the backend's error.
    #[default]
    Abort,
    /// Treat the failure as a decline and try the next candidate.
    FallThrough,
}

/// Prober settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Backends to try, in order. Least permissive recognizer first.
    pub candidates: Vec<Format>,
    pub on_malformed: MalformedPolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            candidates: vec![Format::Pe, Format::Elf32, Format::Elf64],
            on_malformed: MalformedPolicy::default(),
        }
    }
}

impl ProbeConfig {
    /// Decode a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and decode a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProbeError::Io {
            op: "config",
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
