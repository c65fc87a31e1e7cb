//! Container format backends and the uniform section-query surface.
//!
//! A backend recognizes one container format and, on success, hands back a
//! boxed [`SectionOps`] implementation. The trait object's vtable is the
//! operation table: callers never learn which backend produced it. The
//! [`Object`] wrapper owns that handle and guarantees it is released once.

pub mod elf;
pub mod pe;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::{ProbeError, Result};
use crate::sections::SectionFlags;

pub use elf::{Elf32Backend, Elf64Backend};
pub use pe::PeBackend;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pe,
    Elf32,
    Elf64,
}

impl Format {
    /// The stock backend for this format.
    pub fn backend(self) -> Box<dyn FormatBackend> {
        match self {
            Format::Pe => Box::new(PeBackend),
            Format::Elf32 => Box::new(Elf32Backend),
            Format::Elf64 => Box::new(Elf64Backend),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Pe => "PE",
            Format::Elf32 => "ELF32",
            Format::Elf64 => "ELF64",
        };
        f.write_str(name)
    }
}

/// Coarse target description of a parsed container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExeInfo {
    pub format: Format,
    pub os: String,
    pub arch: String,
    pub bits: u8,
}

impl fmt::Display for ExeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: os={}, arch={}, bits={}",
            self.format, self.os, self.arch, self.bits
        )
    }
}

/// Opaque reference to one section of a parsed container.
///
/// Only [`SectionOps::section_at`] creates handles. They stay meaningful for
/// as long as the owning [`Object`] is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHandle {
    index: usize,
}

impl SectionHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    pub(crate) fn index(self) -> usize {
        self.index
    }
}

/// The operation table every backend implements.
///
/// Indices and handles outside `[0, section_count)` are rejected with
/// [`ProbeError::Index`]. Dropping the implementation frees it.
pub trait SectionOps<'data> {
    fn section_count(&self) -> usize;

    fn section_at(&self, index: usize) -> Result<SectionHandle>;

    fn section_name_at(&self, index: usize) -> Result<&'data str>;

    fn flags_of(&self, section: SectionHandle) -> Result<SectionFlags>;

    fn size_of(&self, section: SectionHandle) -> Result<u64>;

    fn offset_of(&self, section: SectionHandle) -> Result<u64>;

    /// File bytes backing the section; empty for sections with no file data.
    fn section_data(&self, section: SectionHandle) -> Result<&'data [u8]>;

    fn info(&self) -> ExeInfo;
}

/// A container format recognizer.
pub trait FormatBackend: Send + Sync {
    fn format(&self) -> Format;

    /// Try to recognize and parse `data`.
    ///
    /// `Ok(None)` means the input is not this format. An `Err` means the
    /// input looked like this format but could not be parsed.
    fn recognize_and_parse<'data>(
        &self,
        data: &'data [u8],
    ) -> Result<Option<Box<dyn SectionOps<'data> + 'data>>>;
}

/// Check `index` against `count` for operation `op`.
pub(crate) fn check_index(op: &'static str, index: usize, count: usize) -> Result<usize> {
    if index < count {
        Ok(index)
    } else {
        Err(ProbeError::Index { op, index, count })
    }
}

/// Bounded slice of `data`, or a backend error naming the section.
pub(crate) fn file_slice<'data>(
    format: Format,
    data: &'data [u8],
    offset: u64,
    size: u64,
) -> Result<&'data [u8]> {
    let start = usize::try_from(offset).ok();
    let end = start.zip(usize::try_from(size).ok()).and_then(|(s, n)| s.checked_add(n));
    match (start, end) {
        (Some(start), Some(end)) if end <= data.len() => Ok(&data[start..end]),
        _ => Err(ProbeError::backend(
            format,
            format!(
                "section data {offset:#x}+{size:#x} exceeds file size {:#x}",
                data.len()
            ),
        )),
    }
}

/// A parsed container: a backend handle paired with its operation table.
///
/// The handle is released exactly once, either by [`Object::release`] or on
/// drop. Every accessor on a released object fails with
/// [`ProbeError::Released`].
pub struct Object<'data> {
    format: Format,
    handle: Option<Box<dyn SectionOps<'data> + 'data>>,
}

impl<'data> Object<'data> {
    pub(crate) fn new(format: Format, handle: Box<dyn SectionOps<'data> + 'data>) -> Self {
        Self {
            format,
            handle: Some(handle),
        }
    }

    /// The format of the backend that matched.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Free the backend handle. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            drop(handle);
            trace!(format = %self.format, "Released object");
        }
    }

    fn ops(&self, op: &'static str) -> Result<&(dyn SectionOps<'data> + 'data)> {
        self.handle
            .as_deref()
            .ok_or(ProbeError::Released { op })
    }

    pub fn section_count(&self) -> Result<usize> {
        Ok(self.ops("section_count")?.section_count())
    }

    pub fn section_at(&self, index: usize) -> Result<SectionHandle> {
        self.ops("section_at")?.section_at(index)
    }

    pub fn section_name_at(&self, index: usize) -> Result<&'data str> {
        self.ops("section_name_at")?.section_name_at(index)
    }

    pub fn flags_of(&self, section: SectionHandle) -> Result<SectionFlags> {
        self.ops("flags_of")?.flags_of(section)
    }

    pub fn size_of(&self, section: SectionHandle) -> Result<u64> {
        self.ops("size_of")?.size_of(section)
    }

    pub fn offset_of(&self, section: SectionHandle) -> Result<u64> {
        self.ops("offset_of")?.offset_of(section)
    }

    pub fn section_data(&self, section: SectionHandle) -> Result<&'data [u8]> {
        self.ops("section_data")?.section_data(section)
    }

    pub fn info(&self) -> Result<ExeInfo> {
        Ok(self.ops("info")?.info())
    }
}

impl Drop for Object<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("format", &self.format)
            .field("released", &self.is_released())
            .finish()
    }
}
