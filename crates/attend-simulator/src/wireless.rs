//! TCP socket standing in for the BLE UART service.
//!
//! One client at a time, e.g. `nc 127.0.0.1 7878`. Bytes the client sends
//! go to the inbound channel; notifications from the main loop are written
//! back to it. Disconnecting clears both queues, as on the device.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use attend_core::transport::LinkChannels;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

/// Depth of each direction of the link
pub const LINK_DEPTH: usize = 32;

pub type SimLink = LinkChannels<CriticalSectionRawMutex, LINK_DEPTH>;

pub static LINK: SimLink = LinkChannels::new();

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Accept clients on `addr` in a background thread.
pub fn spawn(addr: &str, link: &'static SimLink) -> io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!("Wireless link listening on {}", listener.local_addr()?);

    thread::Builder::new()
        .name("wireless".into())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => serve(stream, link),
                    Err(e) => warn!("Wireless accept failed: {}", e),
                }
            }
        })?;
    Ok(())
}

fn serve(mut stream: TcpStream, link: &SimLink) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();
    if let Err(e) = stream.set_read_timeout(Some(POLL_INTERVAL)) {
        warn!("Wireless client {} rejected: {}", peer, e);
        return;
    }

    info!("Wireless client connected: {}", peer);
    link.set_connected(true);

    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let mut sent = 0;
                while sent < n {
                    sent += link.push_inbound(&buf[sent..n]);
                    if sent < n {
                        thread::sleep(POLL_INTERVAL);
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                warn!("Wireless read failed: {}", e);
                break;
            }
        }

        while let Ok(chunk) = link.outbound.try_receive() {
            if let Err(e) = stream.write_all(&chunk) {
                warn!("Wireless write failed: {}", e);
                link.set_connected(false);
                return;
            }
        }
    }

    link.set_connected(false);
    info!("Wireless client disconnected: {}", peer);
}
