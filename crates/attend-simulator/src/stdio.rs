//! Terminal as the serial console.
//!
//! Stdin is read on its own thread so the main loop can poll without
//! blocking, the same way the firmware polls the UART receive buffer.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use attend_core::transport::SerialPort;
use log::{debug, warn};

pub struct StdioSerial {
    lines: Receiver<Vec<u8>>,
    /// Part of a line that did not fit the last read
    pending: Vec<u8>,
}

impl StdioSerial {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(mut line) = line else {
                        warn!("stdin read failed, console input stopped");
                        return;
                    };
                    line.push('\n');
                    if tx.send(line.into_bytes()).is_err() {
                        return;
                    }
                }
                debug!("stdin closed");
            })
            .map(|_| ())
            .unwrap_or_else(|e| warn!("Could not start stdin reader: {}", e));

        Self::from_receiver(rx)
    }

    pub fn from_receiver(lines: Receiver<Vec<u8>>) -> Self {
        Self {
            lines,
            pending: Vec::new(),
        }
    }
}

impl SerialPort for StdioSerial {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        if self.pending.is_empty() {
            match self.lines.try_recv() {
                Ok(bytes) => self.pending = bytes,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return 0,
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }

    fn write_line(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}
