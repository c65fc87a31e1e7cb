//! Error types for executable probing.
//!
//! Every failure the pipeline can surface is a variant of [`ProbeError`]. The
//! rendered message always starts with the operation that failed so a caller
//! can print it as a single diagnostic line.

use std::path::PathBuf;
use thiserror::Error;

use crate::formats::Format;

/// Why a file could not be mapped.
#[derive(Debug, Error)]
pub enum MapFailure {
    /// Zero-length files cannot be mapped.
    #[error("file is empty")]
    EmptyFile,

    /// The file exceeds the configured size limit.
    #[error("file size of {found} bytes exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64, found: u64 },

    /// The operating system refused the mapping.
    #[error("{0}")]
    Os(#[source] std::io::Error),
}

/// Main error type for probing operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The file could not be opened or its size queried.
    #[error("{op}: {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mapping request failed.
    #[error("map: {}: {reason}", .path.display())]
    Map { path: PathBuf, reason: MapFailure },

    /// No candidate backend recognized the input.
    #[error("probe: no known executable format (tried {})", format_list(.tried))]
    NoFormatMatch { tried: Vec<Format> },

    /// A section index or handle outside `[0, count)`.
    #[error("{op}: section index {index} out of range (count {count})")]
    Index {
        op: &'static str,
        index: usize,
        count: usize,
    },

    /// A backend recognized the input but could not parse it.
    #[error("{format}: {message}")]
    Backend { format: Format, message: String },

    /// An operation was attempted on an object that was already released.
    #[error("{op}: object already released")]
    Released { op: &'static str },

    /// Configuration document could not be decoded.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ProbeError {
    /// Short name of the step that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            ProbeError::Io { op, .. } => *op,
            ProbeError::Map { .. } => "map",
            ProbeError::NoFormatMatch { .. } => "probe",
            ProbeError::Index { op, .. } => *op,
            ProbeError::Backend { .. } => "parse",
            ProbeError::Released { op } => *op,
            ProbeError::Config(_) => "config",
        }
    }

    pub(crate) fn backend(format: Format, message: impl Into<String>) -> Self {
        ProbeError::Backend {
            format,
            message: message.into(),
        }
    }
}

fn format_list(formats: &[Format]) -> String {
    if formats.is_empty() {
        return "nothing".to_string();
    }
    formats
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for probing operations
pub type Result<T> = std::result::Result<T, ProbeError>;
