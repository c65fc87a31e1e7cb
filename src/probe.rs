//! Format probing.
//!
//! The prober tries its backends strictly in list order and returns the first
//! match. It never reorders or scores candidates: callers curate the list from
//! least to most permissive recognizer.

use tracing::debug;

use crate::config::{MalformedPolicy, ProbeSettings};
use crate::error::{ProbeError, Result};
use crate::formats::{Format, FormatBackend, Object};
use crate::io::MappedInput;

/// An ordered list of format backends.
pub struct Prober {
    backends: Vec<Box<dyn FormatBackend>>,
    policy: MalformedPolicy,
}

impl Default for Prober {
    /// PE, then ELF32, then ELF64.
    fn default() -> Self {
        Self::from_settings(&ProbeSettings::default())
    }
}

impl Prober {
    /// A prober with no backends; every probe fails with `NoFormatMatch`.
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
            policy: MalformedPolicy::default(),
        }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self {
            backends: settings
                .candidates
                .iter()
                .map(|format| format.backend())
                .collect(),
            policy: settings.on_malformed,
        }
    }

    /// Append a backend after the existing candidates.
    pub fn with_backend(mut self, backend: Box<dyn FormatBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Candidate formats in probe order.
    pub fn formats(&self) -> Vec<Format> {
        self.backends.iter().map(|b| b.format()).collect()
    }

    pub fn policy(&self) -> MalformedPolicy {
        self.policy
    }

    /// Probe `data` against each backend in order.
    ///
    /// A backend that declines passes the input on to the next one. A backend
    /// that recognizes the input but fails to parse it ends probing with its
    /// error under [`MalformedPolicy::Abort`], and counts as a decline under
    /// [`MalformedPolicy::FallThrough`].
    pub fn probe<'data>(&self, data: &'data [u8]) -> Result<Object<'data>> {
        for backend in &self.backends {
            let format = backend.format();
            match backend.recognize_and_parse(data) {
                Ok(Some(handle)) => {
                    debug!(%format, sections = handle.section_count(), "Format matched");
                    return Ok(Object::new(format, handle));
                }
                Ok(None) => debug!(%format, "Backend declined"),
                Err(e) => match self.policy {
                    MalformedPolicy::Abort => {
                        debug!(%format, error = %e, "Backend failed to parse recognized input");
                        return Err(e);
                    }
                    MalformedPolicy::FallThrough => {
                        debug!(%format, error = %e, "Backend failed, trying next candidate");
                    }
                },
            }
        }
        Err(ProbeError::NoFormatMatch {
            tried: self.formats(),
        })
    }

    /// Probe the bytes of a mapped input.
    pub fn probe_input<'a>(&self, input: &'a MappedInput) -> Result<Object<'a>> {
        self.probe(input.as_bytes())
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("formats", &self.formats())
            .field("policy", &self.policy)
            .finish()
    }
}
