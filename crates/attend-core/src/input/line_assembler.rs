use alloc::string::String;
use alloc::vec::Vec;

use log::warn;

use super::{Command, InputError, Transport};

const TERMINATOR: u8 = b'\n';

/// Accumulates raw bytes from one transport into lines
///
/// Lines are bounded: bytes past `max_line_len` are dropped and the whole
/// line is rejected when its terminator arrives.
#[derive(Debug)]
pub struct LineAssembler {
    transport: Transport,
    buffer: Vec<u8>,
    max_line_len: usize,
    /// Bytes seen for the current line, including any that were dropped
    seen: usize,
}

impl LineAssembler {
    pub fn new(transport: Transport, max_line_len: usize) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
            max_line_len,
            seen: 0,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Feed one byte. Returns a command when `byte` completes a non-empty line.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Command>, InputError> {
        if byte != TERMINATOR {
            self.seen += 1;
            if self.buffer.len() < self.max_line_len {
                self.buffer.push(byte);
            }
            return Ok(None);
        }

        let len = core::mem::take(&mut self.seen);
        let bytes = core::mem::take(&mut self.buffer);
        if len > self.max_line_len {
            warn!("Discarding {} byte {} line", len, self.transport);
            return Err(InputError::LineTooLong {
                transport: self.transport,
                len,
            });
        }

        Ok(Command::new(&String::from_utf8_lossy(&bytes)))
    }

    /// Forget the partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.seen = 0;
    }

    /// Feed a slice, collecting completed commands and errors in arrival order.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Result<Command, InputError>> {
        bytes
            .iter()
            .filter_map(|&b| self.feed(b).transpose())
            .collect()
    }
}
