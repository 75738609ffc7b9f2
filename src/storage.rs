//! # Blob storage backends
//!
//! The vector store persists its entire state as one opaque blob. This module
//! defines the [`BlobStore`] seam it writes through, plus the two
//! implementations the crate ships: durable files with atomic replacement,
//! and an in-memory variant for tests and throwaway stores.
//!
//! Writes must be all-or-nothing: a crash mid-write may never leave a reader
//! observing half of a new snapshot. [`FileStore`] gets this from
//! write-to-temp-then-rename on the same filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

/// Durable blob storage with atomic replace semantics.
///
/// `read` distinguishes "nothing persisted yet" (`Ok(None)`) from an I/O
/// failure, so a first run starts empty while a truncated disk read surfaces
/// as an error.
pub trait BlobStore: Send + Sync {
    /// The persisted blob, or `None` if nothing has been written yet.
    fn read(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the persisted blob atomically.
    fn write(&self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed [`BlobStore`].
///
/// Writes go to a temporary file in the destination directory and are renamed
/// into place, so the file at `path` always holds either the previous or the
/// fully-written new snapshot.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileStore {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        // Temp file must live in the destination directory so the rename
        // stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        (**self).read()
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }
}

/// In-memory [`BlobStore`] for tests and ephemeral stores.
///
/// Holds the last written blob behind a mutex; reads hand back a copy.
#[derive(Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.bytes.lock().unwrap().clone())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        *self.bytes.lock().unwrap() = Some(bytes.to_vec());
        Ok(())
    }
}
