// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Directory, DirectoryLock, IndexInput, IndexOutput, IoContext};
use crate::Result;
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

type FileMap = Arc<RwLock<FxHashMap<String, Arc<Vec<u8>>>>>;

fn not_found(name: &str) -> crate::Error {
    crate::Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no such file: {name:?}"),
    ))
}

/// In-memory [`Directory`] for tests and RAM-resident (HOT) segments
#[derive(Default)]
pub struct MemoryDirectory {
    files: FileMap,
    locks: Arc<RwLock<Vec<String>>>,
    temp_counter: AtomicU64,
}

impl Directory for MemoryDirectory {
    fn list(&self) -> Result<Vec<String>> {
        #[allow(clippy::expect_used)]
        let mut names: Vec<String> = self
            .files
            .read()
            .expect("lock is poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        #[allow(clippy::expect_used)]
        let mut files = self.files.write().expect("lock is poisoned");
        files.remove(name).ok_or_else(|| not_found(name))?;
        Ok(())
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        #[allow(clippy::expect_used)]
        let files = self.files.read().expect("lock is poisoned");
        files
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn create_output(&self, name: &str, _ctx: IoContext) -> Result<Box<dyn IndexOutput>> {
        {
            #[allow(clippy::expect_used)]
            let files = self.files.read().expect("lock is poisoned");
            if files.contains_key(name) {
                return Err(crate::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("file {name:?} exists"),
                )));
            }
        }

        // Reserve the name so concurrent creates collide
        #[allow(clippy::expect_used)]
        self.files
            .write()
            .expect("lock is poisoned")
            .insert(name.to_string(), Arc::new(Vec::new()));

        Ok(Box::new(MemoryIndexOutput {
            files: self.files.clone(),
            name: name.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn create_temp_output(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<(String, Box<dyn IndexOutput>)> {
        let id = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("{prefix}_{id}.{suffix}.tmp");
        let output = self.create_output(&name, IoContext::Default)?;
        Ok((name, output))
    }

    fn open_input(&self, name: &str, _ctx: IoContext) -> Result<Box<dyn IndexInput>> {
        #[allow(clippy::expect_used)]
        let files = self.files.read().expect("lock is poisoned");
        let data = files.get(name).ok_or_else(|| not_found(name))?.clone();
        Ok(Box::new(MemoryIndexInput { data, pos: 0 }))
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        #[allow(clippy::expect_used)]
        let mut files = self.files.write().expect("lock is poisoned");
        if files.contains_key(dst) {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("rename target {dst:?} exists"),
            )));
        }
        let data = files.remove(src).ok_or_else(|| not_found(src))?;
        files.insert(dst.to_string(), data);
        Ok(())
    }

    fn sync(&self, _names: &[&str]) -> Result<()> {
        Ok(())
    }

    fn sync_metadata(&self) -> Result<()> {
        Ok(())
    }

    fn obtain_lock(&self, name: &str) -> Result<DirectoryLock> {
        {
            #[allow(clippy::expect_used)]
            let mut held = self.locks.write().expect("lock is poisoned");
            if held.iter().any(|n| n == name) {
                return Err(crate::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("lock {name:?} already held"),
                )));
            }
            held.push(name.to_string());
        }

        let locks = self.locks.clone();
        let name = name.to_string();
        Ok(DirectoryLock::new(Box::new(move || {
            #[allow(clippy::expect_used)]
            locks
                .write()
                .expect("lock is poisoned")
                .retain(|n| *n != name);
        })))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryIndexOutput {
    files: FileMap,
    name: String,
    buffer: Vec<u8>,
}

impl std::io::Write for MemoryIndexOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl MemoryIndexOutput {
    fn publish(&mut self) {
        #[allow(clippy::expect_used)]
        self.files
            .write()
            .expect("lock is poisoned")
            .insert(self.name.clone(), Arc::new(std::mem::take(&mut self.buffer)));
    }
}

impl IndexOutput for MemoryIndexOutput {
    fn file_pointer(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn finish(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryIndexOutput {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            self.publish();
        }
    }
}

struct MemoryIndexInput {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl std::io::Read for MemoryIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl IndexInput for MemoryIndexInput {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("seek to {pos} beyond file length {}", self.data.len()),
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            self.pos = pos as usize;
        }
        Ok(())
    }

    fn clone_input(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(Self {
            data: self.data.clone(),
            pos: 0,
        }))
    }
}
