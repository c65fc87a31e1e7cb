//! Identify the container format of an executable (PE, ELF32 or ELF64) and
//! enumerate its sections through one format-independent interface.
//!
//! ```no_run
//! use exeprobe::{inspect_path, ProbeConfig};
//!
//! let summary = inspect_path("/bin/true", &ProbeConfig::default(), |section| {
//!     println!("{section}");
//!     Ok(())
//! })?;
//! eprintln!("{}", summary.info);
//! # Ok::<(), exeprobe::ProbeError>(())
//! ```

/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Format backends and the polymorphic object
pub mod formats;
/// End-to-end pipeline
pub mod inspect;
/// Memory-mapped input
pub mod io;
/// Logging and tracing setup
pub mod logging;
/// Format probing
pub mod probe;
/// Section enumeration and flag rendering
pub mod sections;

pub use config::{IoLimits, MalformedPolicy, ProbeConfig, ProbeSettings};
pub use error::{MapFailure, ProbeError, Result};
pub use formats::{
    Elf32Backend, Elf64Backend, ExeInfo, Format, FormatBackend, Object, PeBackend, SectionHandle,
    SectionOps,
};
pub use inspect::{inspect_mapped, inspect_path, Inspection};
pub use io::MappedInput;
pub use probe::Prober;
pub use sections::{
    collect_sections, enumerate, SectionFlags, SectionRecord, SectionRow, Sections,
};
