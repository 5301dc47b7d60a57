// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Storage abstraction consumed by the core
//!
//! The core calls into [`Directory`] for all file access and assumes nothing
//! beyond these operations. Implementations may be filesystem, mmap, or
//! in-memory.

mod fs;
mod memory;

pub use fs::FsDirectory;
pub use memory::MemoryDirectory;

use crate::Result;

/// I/O context hint passed to directory operations
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum IoContext {
    /// General-purpose I/O
    #[default]
    Default,

    /// Data written once and then read many times (published segments)
    ReadMostly,
}

/// Write handle for a single file
///
/// Outputs are owned by a single writer; they are not shareable.
pub trait IndexOutput: std::io::Write + Send {
    /// Current write position (bytes written so far).
    fn file_pointer(&self) -> u64;

    /// Flushes buffered bytes to the underlying storage.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn finish(&mut self) -> Result<()>;
}

/// Read handle for a single file
///
/// Inputs are *not* shareable between threads; each reader obtains an
/// independent clone with its own file pointer via [`IndexInput::clone_input`].
pub trait IndexInput: std::io::Read + Send {
    /// Total file length in bytes.
    fn length(&self) -> u64;

    /// Current read position.
    fn position(&self) -> u64;

    /// Moves the read position.
    ///
    /// # Errors
    ///
    /// Returns an error if `pos` is beyond the end of the file.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Creates an independent handle over the same file with its own position.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn clone_input(&self) -> Result<Box<dyn IndexInput>>;

    /// Reads the remaining bytes into a vector.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn read_to_end_vec(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(self, &mut buf)?;
        Ok(buf)
    }
}

/// Exclusive lock handle; released on drop
pub struct DirectoryLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DirectoryLock {
    pub(crate) fn new(release: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            release: Some(release),
        }
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for DirectoryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DirectoryLock")
    }
}

/// Abstract interface for storing index files
pub trait Directory: Send + Sync {
    /// Lists all file names (sorted).
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn list(&self) -> Result<Vec<String>>;

    /// Deletes a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or on I/O failure.
    fn delete(&self, name: &str) -> Result<()>;

    /// Byte length of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or on I/O failure.
    fn file_length(&self, name: &str) -> Result<u64>;

    /// Creates a new file for writing. The file must not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists or on I/O failure.
    fn create_output(&self, name: &str, ctx: IoContext) -> Result<Box<dyn IndexOutput>>;

    /// Creates a uniquely-named temporary file for writing.
    ///
    /// Returns the generated name together with the output.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn create_temp_output(&self, prefix: &str, suffix: &str)
        -> Result<(String, Box<dyn IndexOutput>)>;

    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or on I/O failure.
    fn open_input(&self, name: &str, ctx: IoContext) -> Result<Box<dyn IndexInput>>;

    /// Renames `src` to `dst`; atomic when `dst` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if `dst` exists or on I/O failure.
    fn rename(&self, src: &str, dst: &str) -> Result<()>;

    /// Ensures the named files are durable.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn sync(&self, names: &[&str]) -> Result<()>;

    /// Ensures directory metadata (renames, deletes) is durable.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn sync_metadata(&self) -> Result<()>;

    /// Obtains an exclusive lock; fails if the lock is already held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held or on I/O failure.
    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock>;

    /// Releases resources held by the directory.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn exercise(dir: &dyn Directory) -> Result<()> {
        let mut out = dir.create_output("a.bin", IoContext::Default)?;
        std::io::Write::write_all(&mut out, b"hello world")?;
        assert_eq!(11, out.file_pointer());
        out.finish()?;
        drop(out);

        assert_eq!(11, dir.file_length("a.bin")?);
        assert!(dir.create_output("a.bin", IoContext::Default).is_err());

        let mut input = dir.open_input("a.bin", IoContext::ReadMostly)?;
        assert_eq!(11, input.length());

        let mut cloned = input.clone_input()?;
        let mut buf = [0u8; 5];
        std::io::Read::read_exact(&mut input, &mut buf)?;
        assert_eq!(b"hello", &buf);

        // The clone has its own position
        std::io::Read::read_exact(&mut cloned, &mut buf)?;
        assert_eq!(b"hello", &buf);

        input.seek(6)?;
        assert_eq!(6, input.position());
        std::io::Read::read_exact(&mut input, &mut buf)?;
        assert_eq!(b"world", &buf);

        dir.rename("a.bin", "b.bin")?;
        assert!(dir.file_length("a.bin").is_err());
        assert_eq!(11, dir.file_length("b.bin")?);

        let names = dir.list()?;
        assert!(names.contains(&"b.bin".to_string()));

        dir.sync(&["b.bin"])?;
        dir.sync_metadata()?;

        let lock = dir.obtain_lock("write.lock")?;
        assert!(dir.obtain_lock("write.lock").is_err());
        drop(lock);
        let relock = dir.obtain_lock("write.lock")?;
        drop(relock);

        dir.delete("b.bin")?;
        assert!(dir.file_length("b.bin").is_err());

        Ok(())
    }

    #[test]
    fn memory_directory_contract() -> Result<()> {
        exercise(&MemoryDirectory::default())
    }

    #[test]
    fn fs_directory_contract() -> Result<()> {
        let folder = tempfile::tempdir()?;
        exercise(&FsDirectory::open(folder.path())?)
    }
}
