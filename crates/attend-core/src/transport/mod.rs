//! Byte transports the operator talks to the device through
//!
//! The serial console is polled directly. The wireless link (BLE on the
//! device, a TCP socket in the simulator) runs in its own task and exchanges
//! chunks with the main loop through [`LinkChannels`].

mod link;

pub use link::{ChannelLink, LinkChannels};

/// Largest payload of one wireless notification
pub const NOTIFY_CHUNK: usize = 20;

/// Wired console (UART / stdin)
pub trait SerialPort {
    /// Copy whatever bytes are already buffered into `buf`. Never blocks.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Write `line` followed by a line break.
    fn write_line(&mut self, line: &str);
}

/// Wireless command channel
pub trait WirelessTransport {
    fn is_client_connected(&self) -> bool;

    /// Copy whatever bytes have arrived into `buf`. Never blocks.
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Send one notification of at most [`NOTIFY_CHUNK`] bytes.
    fn notify(&mut self, chunk: &[u8]);

    /// Whether a client session ended since the last call.
    fn take_session_ended(&mut self) -> bool {
        false
    }
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_available(buf)
    }

    fn write_line(&mut self, line: &str) {
        (**self).write_line(line)
    }
}

impl<T: WirelessTransport + ?Sized> WirelessTransport for &mut T {
    fn is_client_connected(&self) -> bool {
        (**self).is_client_connected()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_available(buf)
    }

    fn notify(&mut self, chunk: &[u8]) {
        (**self).notify(chunk)
    }

    fn take_session_ended(&mut self) -> bool {
        (**self).take_session_ended()
    }
}
