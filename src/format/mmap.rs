//! Memory-mapped, read-only access to .qnms files.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::types::error::{QnmsError, QnmsResult};
use crate::types::MIN_FILE_SIZE;

use super::envelope::{self, FileInfo};

/// A .qnms file mapped into memory.
pub struct MappedFile {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedFile {
    /// Map a file for reading. Files shorter than the smallest valid
    /// document are rejected before mapping.
    pub fn open(path: &Path) -> QnmsResult<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() < MIN_FILE_SIZE {
            return Err(QnmsError::Truncated);
        }
        // Safety: the mapping is read-only and dropped before the load returns.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Envelope facts without touching the data block.
    pub fn info(&self) -> QnmsResult<FileInfo> {
        envelope::inspect(&self.mmap)
    }
}
