//! Byte-file storage abstraction
//!
//! The device keeps its state in a handful of small named files on a FAT
//! volume (SD card on the firmware, a directory on the simulator). FAT via
//! `embedded-sdmmc` has no rename, so the trait only exposes the primitives
//! every backend has; the ledger builds its atomic swap on top of them.

pub mod mem;

pub use mem::{MemStorage, MemStorageError};

/// Flat namespace of named byte files.
///
/// Names are FAT 8.3 compatible (`ATTEND.CSV`). Every mutating call must be
/// durable (flushed and closed) before it returns.
pub trait Storage {
    type Error: core::fmt::Debug;

    /// Whether the file exists.
    fn exists(&mut self, name: &str) -> Result<bool, Self::Error>;

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns `0` at end of file. Reading a missing file is an error.
    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Append `data`, creating the file if needed.
    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Create the file, or cut an existing one to zero length.
    fn truncate(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Delete the file. Removing a missing file is not an error.
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    type Error = S::Error;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        (**self).exists(name)
    }

    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read_at(name, offset, buf)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        (**self).append(name, data)
    }

    fn truncate(&mut self, name: &str) -> Result<(), Self::Error> {
        (**self).truncate(name)
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        (**self).remove(name)
    }
}
