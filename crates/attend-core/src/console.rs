//! Operator console spanning both transports
//!
//! Every operator-visible message is written to the serial port and, when a
//! wireless client is connected, to the wireless link as well, so both sides
//! see identical output.

use alloc::format;

use log::debug;

use crate::input::{Command, CommandMux};
use crate::transport::{NOTIFY_CHUNK, SerialPort, WirelessTransport};

const READ_CHUNK: usize = 64;
/// Reads per transport per poll, so a flooding peer cannot stall the loop
const MAX_READS_PER_POLL: usize = 16;

pub struct Console<S, W> {
    serial: S,
    wireless: W,
    mux: CommandMux,
}

impl<S: SerialPort, W: WirelessTransport> Console<S, W> {
    pub fn new(serial: S, wireless: W, max_line_len: usize) -> Self {
        Self {
            serial,
            wireless,
            mux: CommandMux::new(max_line_len),
        }
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn wireless_mut(&mut self) -> &mut W {
        &mut self.wireless
    }

    /// Drain both transports into the mux and return the next command.
    ///
    /// Overlong lines are reported to the operator and dropped.
    pub fn poll_command(&mut self) -> Option<Command> {
        let mut buf = [0u8; READ_CHUNK];

        if self.wireless.take_session_ended() {
            debug!("Wireless session ended, dropping its partial input");
            self.mux.reset_wireless();
        }

        for _ in 0..MAX_READS_PER_POLL {
            let n = self.wireless.read_available(&mut buf);
            if n == 0 {
                break;
            }
            for e in self.mux.feed_wireless(&buf[..n]) {
                self.println(&format!("Input rejected: {e}"));
            }
        }

        for _ in 0..MAX_READS_PER_POLL {
            let n = self.serial.read_available(&mut buf);
            if n == 0 {
                break;
            }
            for e in self.mux.feed_serial(&buf[..n]) {
                self.println(&format!("Input rejected: {e}"));
            }
        }

        let command = self.mux.poll_command();
        if let Some(command) = &command {
            debug!("Command: {}", command);
        }
        command
    }

    /// Forget queued commands (typed ahead of a prompt that has gone away).
    pub fn discard_pending(&mut self) {
        self.mux.discard_pending();
    }

    /// Write one line to every active transport.
    pub fn println(&mut self, message: &str) {
        self.serial.write_line(message);

        if self.wireless.is_client_connected() {
            for chunk in message.as_bytes().chunks(NOTIFY_CHUNK) {
                self.wireless.notify(chunk);
            }
            self.wireless.notify(b"\n");
        }
    }

    /// Print each line of a multi-line block.
    pub fn print_block(&mut self, block: &str) {
        for line in block.lines() {
            self.println(line);
        }
    }
}
