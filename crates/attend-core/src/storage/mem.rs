use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use thiserror_no_std::Error;

use super::Storage;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemStorageError {
    #[error("file not found")]
    NotFound,
    #[error("injected fault (simulated power loss)")]
    Injected,
}

/// In-memory [`Storage`] with fault injection
///
/// Used by host tests to simulate power loss: after
/// [`fail_after_writes`](Self::fail_after_writes) mutating calls succeed,
/// every further mutation fails without being applied, as if the device died
/// at that point. [`clear_fault`](Self::clear_fault) "reboots" it with the
/// files exactly as they were left.
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    files: BTreeMap<String, Vec<u8>>,
    writes: usize,
    fail_after: Option<usize>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file with raw contents (does not count as a write).
    pub fn with_file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files.insert(name.to_string(), contents.to_vec());
        self
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Contents of a file as text, for assertions.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.file(name).and_then(|bytes| core::str::from_utf8(bytes).ok())
    }

    /// Number of mutating calls applied so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Let `n` more mutations through, then fail every mutation.
    pub fn fail_after_writes(&mut self, n: usize) {
        self.fail_after = Some(self.writes + n);
    }

    pub fn clear_fault(&mut self) {
        self.fail_after = None;
    }

    fn begin_write(&mut self) -> Result<(), MemStorageError> {
        if let Some(limit) = self.fail_after {
            if self.writes >= limit {
                return Err(MemStorageError::Injected);
            }
        }
        self.writes += 1;
        Ok(())
    }
}

impl Storage for MemStorage {
    type Error = MemStorageError;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.files.contains_key(name))
    }

    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let data = self.files.get(name).ok_or(MemStorageError::NotFound)?;
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.begin_write()?;
        self.files
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn truncate(&mut self, name: &str) -> Result<(), Self::Error> {
        self.begin_write()?;
        self.files.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        if !self.files.contains_key(name) {
            return Ok(());
        }
        self.begin_write()?;
        self.files.remove(name);
        Ok(())
    }
}
