// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Directory, DirectoryLock, IndexInput, IndexOutput, IoContext};
use crate::Result;
use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

/// Filesystem-backed [`Directory`]
pub struct FsDirectory {
    path: PathBuf,
    locks: Arc<Mutex<Vec<String>>>,
    temp_counter: AtomicU64,
}

impl FsDirectory {
    /// Opens (and creates if needed) a directory at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().into(),
            locks: Arc::new(Mutex::new(Vec::new())),
            temp_counter: AtomicU64::new(0),
        })
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Directory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = vec![];
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        Ok(std::fs::metadata(self.resolve(name))?.len())
    }

    fn create_output(&self, name: &str, _ctx: IoContext) -> Result<Box<dyn IndexOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(name))?;

        Ok(Box::new(FsIndexOutput {
            writer: BufWriter::new(file),
            written: 0,
        }))
    }

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<(String, Box<dyn IndexOutput>)> {
        // Counter + pid keeps names unique within the directory lifetime
        let id = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("{prefix}_{}_{id}.{suffix}.tmp", std::process::id());
        let output = self.create_output(&name, IoContext::Default)?;
        Ok((name, output))
    }

    fn open_input(&self, name: &str, _ctx: IoContext) -> Result<Box<dyn IndexInput>> {
        FsIndexInput::open(self.resolve(name)).map(|input| Box::new(input) as Box<dyn IndexInput>)
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let dst_path = self.resolve(dst);
        if dst_path.exists() {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("rename target {dst:?} exists"),
            )));
        }
        std::fs::rename(self.resolve(src), dst_path)?;
        Ok(())
    }

    fn sync(&self, names: &[&str]) -> Result<()> {
        for name in names {
            File::open(self.resolve(name))?.sync_all()?;
        }
        Ok(())
    }

    fn sync_metadata(&self) -> Result<()> {
        // Fsync the directory itself so renames and deletes are durable
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock> {
        let lock_path = self.resolve(name);

        {
            #[allow(clippy::expect_used)]
            let mut held = self.locks.lock().expect("lock is poisoned");
            if held.iter().any(|n| n == name) {
                return Err(crate::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("lock {name:?} already held"),
                )));
            }
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .map_err(|_| {
                    crate::Error::Io(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("lock {name:?} already held"),
                    ))
                })?;
            held.push(name.to_string());
        }

        let locks = self.locks.clone();
        let name = name.to_string();
        Ok(DirectoryLock::new(Box::new(move || {
            let _ = std::fs::remove_file(&lock_path);
            #[allow(clippy::expect_used)]
            locks
                .lock()
                .expect("lock is poisoned")
                .retain(|n| *n != name);
        })))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FsIndexOutput {
    writer: BufWriter<File>,
    written: u64,
}

impl Write for FsIndexOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl IndexOutput for FsIndexOutput {
    fn file_pointer(&self) -> u64 {
        self.written
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

struct FsIndexInput {
    reader: BufReader<File>,
    path: PathBuf,
    len: u64,
    pos: u64,
}

impl FsIndexInput {
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            path,
            len,
            pos: 0,
        })
    }
}

impl std::io::Read for FsIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl IndexInput for FsIndexInput {
    fn length(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("seek to {pos} beyond file length {}", self.len),
            )));
        }
        self.reader.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn clone_input(&self) -> Result<Box<dyn IndexInput>> {
        // Clones open their own handle so file pointers never race
        Ok(Box::new(Self::open(self.path.clone())?))
    }
}
