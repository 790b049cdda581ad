//! Proof-file storage.
//!
//! Proof uploads live outside the relational store, under
//! `<data dir>/proofs/`, and tasks reference them by an opaque file name.
//! Only PDFs up to the configured size are accepted. Writes use the
//! temp-file-plus-rename pattern under an flock so concurrent writers never
//! leave a partial file behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Subdirectory of the data dir holding proof files
pub const PROOFS_DIR: &str = "proofs";

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_RETRY_INTERVAL_MS: u64 = 50;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Store for proof uploads rooted at a data directory.
pub struct ProofStore {
    root: PathBuf,
    max_bytes: u64,
}

impl ProofStore {
    pub fn new(data_dir: &Path, max_bytes: u64) -> Self {
        Self {
            root: data_dir.join(PROOFS_DIR),
            max_bytes,
        }
    }

    /// Validate and store PDF bytes; returns the opaque file name the task
    /// record should reference.
    pub fn store(&self, bytes: &[u8]) -> Result<String> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::Validation(format!(
                "proof file exceeds the {} byte limit ({} bytes)",
                self.max_bytes,
                bytes.len()
            )));
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(Error::Validation(
                "proof file must be a PDF".to_string(),
            ));
        }

        let name = format!("{}.pdf", Uuid::new_v4());
        let path = self.root.join(&name);
        let lock_path = self.root.join(format!("{name}.lock"));
        let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;
        write_atomic(&path, bytes)?;
        let _ = fs::remove_file(&lock_path);
        Ok(name)
    }

    /// Read a proof from disk by copying it from `source`.
    pub fn store_from(&self, source: &Path) -> Result<String> {
        let bytes = fs::read(source)?;
        self.store(&bytes)
    }

    /// Absolute path for a stored proof reference. File names are opaque
    /// UUIDs assigned by `store`; path segments are rejected.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        if reference.contains('/') || reference.contains('\\') || reference.contains("..") {
            return Err(Error::Validation(format!(
                "invalid proof reference '{reference}'"
            )));
        }
        let path = self.root.join(reference);
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "proof file missing: {reference}"
            )));
        }
        Ok(path)
    }
}

/// A file lock guard that releases the lock when dropped.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock with a timeout, creating the lock file if
    /// it does not exist.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Write data via temp file + rename so readers never observe a partial
/// file.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}
