//! File access for the command-line caller.
//!
//! The crypto core never touches the filesystem; reading sources, writing
//! outputs and the overwrite policy all live here.

use anyhow::{Context, Result, anyhow};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("input file '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("input '{}' is a directory, expected a file", .0.display())]
    SourceIsDirectory(PathBuf),

    #[error("output '{}' is a directory, expected a file", .0.display())]
    DestinationIsDirectory(PathBuf),

    #[error("output file '{}' already exists; pass --overwrite to replace it", .0.display())]
    DestinationExists(PathBuf),
}

/// A file read from or written to by the CLI.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if something exists at the path.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A file to read from must exist and must not be a directory.
    pub fn check_source(&self) -> Result<(), StorageError> {
        if !self.exists() {
            return Err(StorageError::SourceMissing(self.path.clone()));
        }
        if self.is_dir() {
            return Err(StorageError::SourceIsDirectory(self.path.clone()));
        }
        Ok(())
    }

    /// A file to write to must not be a directory, and may only already
    /// exist when `overwrite` is set.
    pub fn check_destination(&self, overwrite: bool) -> Result<(), StorageError> {
        if self.is_dir() {
            return Err(StorageError::DestinationIsDirectory(self.path.clone()));
        }
        if self.exists() && !overwrite {
            return Err(StorageError::DestinationExists(self.path.clone()));
        }
        Ok(())
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read '{}'", self.path.display()))
    }

    /// Saves data using an atomic write.
    ///
    /// Data goes to a randomly named temporary file in the same directory,
    /// is synced to disk, then renamed over the target, so a crash leaves
    /// either the old file or the new one. Parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        self.save_with(|file| {
            file.write_all(data)?;
            file.sync_all()
        })
    }

    /// Runs `write` against a fresh temporary file, then swaps it into place.
    /// The temporary file never outlives a failure.
    fn save_with(&self, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        // fail if the temporary name is taken
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        let written = write(&mut tmp_file);
        drop(tmp_file);

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("failed to write temporary file");
        }

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        self.sync_parent_dir()
    }

    /// Persists the rename itself.
    #[cfg(not(target_os = "windows"))]
    fn sync_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.parent_dir() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    /// `REPLACEFILE_WRITE_THROUGH` already flushed the replacement.
    #[cfg(target_os = "windows")]
    fn sync_parent_dir(&self) -> Result<()> {
        Ok(())
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// `<name>.tmp.<16 hex chars>` next to the target.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|_| anyhow!("OS random generator unavailable"))?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("'{}' does not name a file", self.path.display()))?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Replaces the target with `ReplaceFileW`, which requires the target to
    /// exist; a fresh target is a plain rename.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// `rename()` is atomic on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}
