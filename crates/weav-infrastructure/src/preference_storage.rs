//! File-backed preference storage with atomic writes.
//!
//! The preference payload is a single JSON document rewritten on every
//! mutation. Writes go through a temporary file plus atomic rename, with an
//! exclusive lock held for the duration, so a crash mid-write never leaves a
//! half-written file behind. Concurrent writers from separate processes are
//! not coordinated beyond that: last write wins.

use crate::paths::WeavPaths;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use weav_core::preferences::PreferenceStorage;
use weav_core::{Result, WeavError};

/// Durable [`PreferenceStorage`] backed by one JSON file.
pub struct FilePreferenceStorage {
    path: PathBuf,
}

impl FilePreferenceStorage {
    /// Creates a storage handle over an explicit file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a storage handle over the default preference file location.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(WeavPaths::preferences_file()?))
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| WeavError::io("preference path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| WeavError::io("preference path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

impl PreferenceStorage for FilePreferenceStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(content))
    }

    fn save(&self, payload: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let _lock = FileLock::acquire(&self.path)?;

        // Write to a temporary file in the same directory, then rename
        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(payload.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// A file lock guard that releases the lock when dropped.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| WeavError::io(format!("failed to acquire preference lock: {e}")))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock is automatic when the file handle is dropped
        let _ = fs::remove_file(&self.lock_path);
    }
}
