//! Read-only memory-mapped input.
//!
//! [`MappedInput`] owns the open descriptor and the mapping created from it.
//! Both are held until [`MappedInput::release`] (or drop), which unmaps first
//! and closes the descriptor second. Releasing twice is a no-op.

use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::IoLimits;
use crate::error::{MapFailure, ProbeError, Result};

/// A read-only, fixed-size byte view of a file.
#[derive(Debug)]
pub struct MappedInput {
    path: PathBuf,
    // Dropped before `file`; `None` once released.
    mmap: Option<Mmap>,
    file: Option<File>,
    len: u64,
}

impl MappedInput {
    /// Open and map `path` with default limits.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::acquire_with(path, &IoLimits::default())
    }

    /// Open `path`, query its size and map it read-only.
    ///
    /// Fails with [`ProbeError::Io`] if the file cannot be opened or sized,
    /// and with [`ProbeError::Map`] for empty or oversized files or when the
    /// mapping itself is refused.
    pub fn acquire_with<P: AsRef<Path>>(path: P, limits: &IoLimits) -> Result<Self> {
        let path = path.as_ref();
        let io_err = |op: &'static str| {
            move |source| ProbeError::Io {
                op,
                path: path.to_path_buf(),
                source,
            }
        };
        let map_err = |reason| ProbeError::Map {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(io_err("open"))?;
        let len = file.metadata().map_err(io_err("stat"))?.len();

        debug!(
            path = %path.display(),
            size = len,
            limits.max_file_size = limits.max_file_size,
            "Mapping input"
        );

        if len == 0 {
            return Err(map_err(MapFailure::EmptyFile));
        }
        if len > limits.max_file_size {
            debug!(
                path = %path.display(),
                size = len,
                limit = limits.max_file_size,
                "File is too large"
            );
            return Err(map_err(MapFailure::TooLarge {
                limit: limits.max_file_size,
                found: len,
            }));
        }

        // Safety: read-only map of a regular file; the bytes are never
        // exposed mutably and the map is dropped before the descriptor.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| map_err(MapFailure::Os(e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            mmap: Some(mmap),
            file: Some(file),
            len,
        })
    }

    /// The mapped bytes, or an empty slice once released.
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Size of the mapping in bytes; zero once released.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the file when it was acquired.
    pub fn file_size(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.mmap.is_none() && self.file.is_none()
    }

    /// Unmap, then close the descriptor.
    pub fn release(&mut self) {
        if let Some(mmap) = self.mmap.take() {
            drop(mmap);
            trace!(path = %self.path.display(), "Unmapped input");
        }
        if let Some(file) = self.file.take() {
            drop(file);
            trace!(path = %self.path.display(), "Closed descriptor");
        }
    }
}

impl Drop for MappedInput {
    fn drop(&mut self) {
        self.release();
    }
}
