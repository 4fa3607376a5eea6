//! [`Storage`] over a plain directory, standing in for the SD card.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use attend_core::storage::Storage;

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Use `root` as the volume, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for FsStorage {
    type Error = io::Error;

    fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        self.path(name).try_exists()
    }

    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut file = File::open(self.path(name))?;
        file.seek(SeekFrom::Start(u64::from(offset)))?;
        file.read(buf)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn truncate(&mut self, name: &str) -> Result<(), Self::Error> {
        File::create(self.path(name))?.sync_all()
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
