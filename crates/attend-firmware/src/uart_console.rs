//! UART0 as the wired operator console.

use embedded_io::Write;
use esp_hal::Blocking;
use esp_hal::uart::Uart;
use log::warn;

use attend_core::transport::SerialPort;

pub struct UartConsole<'d> {
    uart: Uart<'d, Blocking>,
}

impl<'d> UartConsole<'d> {
    pub fn new(uart: Uart<'d, Blocking>) -> Self {
        Self { uart }
    }
}

impl SerialPort for UartConsole<'_> {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        match self.uart.read_buffered(buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("Console read error: {:?}", e);
                0
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        let written = self
            .uart
            .write_all(line.as_bytes())
            .and_then(|()| self.uart.write_all(b"\r\n"))
            .and_then(|()| self.uart.flush());
        if let Err(e) = written {
            warn!("Console write error: {:?}", e);
        }
    }
}
