//! Chunked line reading over [`Storage`]

use alloc::string::String;
use alloc::vec::Vec;

use super::LedgerError;
use crate::storage::Storage;

/// Bytes pulled from storage per read call
const READ_CHUNK: usize = 64;

/// Resumable line reader over one file.
///
/// Holds no borrow of the storage between calls, so a caller can read one
/// file while appending to another with the same storage handle.
pub(crate) struct LineCursor {
    file: &'static str,
    offset: u32,
    chunk: [u8; READ_CHUNK],
    chunk_len: usize,
    chunk_pos: usize,
    partial: Vec<u8>,
    eof: bool,
}

impl LineCursor {
    pub(crate) fn new(file: &'static str) -> Self {
        Self {
            file,
            offset: 0,
            chunk: [0; READ_CHUNK],
            chunk_len: 0,
            chunk_pos: 0,
            partial: Vec::new(),
            eof: false,
        }
    }

    /// Next non-blank line with its terminator (and any `\r`) stripped.
    pub(crate) fn next_line<S: Storage>(
        &mut self,
        storage: &mut S,
    ) -> Result<Option<String>, LedgerError> {
        loop {
            if self.chunk_pos < self.chunk_len {
                let window = &self.chunk[self.chunk_pos..self.chunk_len];
                match window.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        self.partial.extend_from_slice(&window[..end]);
                        self.chunk_pos += end + 1;
                        if let Some(line) = self.take_line() {
                            return Ok(Some(line));
                        }
                        continue;
                    }
                    None => {
                        self.partial.extend_from_slice(window);
                        self.chunk_pos = self.chunk_len;
                    }
                }
            }

            if self.eof {
                // A final line without terminator still counts
                return Ok(self.take_line());
            }

            let n = storage
                .read_at(self.file, self.offset, &mut self.chunk)
                .map_err(|e| {
                    self.eof = true;
                    super::io_error("read", self.file, e)
                })?;
            if n == 0 {
                self.eof = true;
            }
            self.offset += n as u32;
            self.chunk_len = n;
            self.chunk_pos = 0;
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let bytes = core::mem::take(&mut self.partial);
        let line = String::from_utf8_lossy(&bytes);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            None
        } else {
            Some(String::from(line))
        }
    }
}

/// Lazy sequence of raw ledger lines, header first
///
/// Created by [`AttendanceLedger::scan_all`](super::AttendanceLedger::scan_all).
/// After the first error the iterator is exhausted.
pub struct LedgerLines<'a, S: Storage> {
    storage: &'a mut S,
    cursor: LineCursor,
    failed: Option<LedgerError>,
    done: bool,
}

impl<'a, S: Storage> LedgerLines<'a, S> {
    pub(crate) fn new(storage: &'a mut S, file: &'static str) -> Self {
        Self {
            storage,
            cursor: LineCursor::new(file),
            failed: None,
            done: false,
        }
    }

    pub(crate) fn failed(storage: &'a mut S, file: &'static str, error: LedgerError) -> Self {
        Self {
            failed: Some(error),
            ..Self::new(storage, file)
        }
    }
}

impl<S: Storage> Iterator for LedgerLines<'_, S> {
    type Item = Result<String, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(error) = self.failed.take() {
            self.done = true;
            return Some(Err(error));
        }

        match self.cursor.next_line(&mut *self.storage) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
