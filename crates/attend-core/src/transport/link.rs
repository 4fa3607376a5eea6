use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

use super::{NOTIFY_CHUNK, WirelessTransport};

pub type Chunk = Vec<u8, NOTIFY_CHUNK>;

/// Channels shared between the wireless task and the main loop
///
/// Meant to live in a `static`:
///
/// ```ignore
/// static LINK: LinkChannels<CriticalSectionRawMutex, 32> = LinkChannels::new();
/// ```
pub struct LinkChannels<M: RawMutex, const N: usize> {
    /// Client writes, radio side to loop
    pub inbound: Channel<M, Chunk, N>,
    /// Notifications, loop to radio side
    pub outbound: Channel<M, Chunk, N>,
    connected: AtomicBool,
    /// Bumped on every disconnect
    sessions_ended: AtomicU32,
}

impl<M: RawMutex, const N: usize> LinkChannels<M, N> {
    pub const fn new() -> Self {
        Self {
            inbound: Channel::new(),
            outbound: Channel::new(),
            connected: AtomicBool::new(false),
            sessions_ended: AtomicU32::new(0),
        }
    }

    /// Called by the radio task on connect and disconnect.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        if !connected {
            self.outbound.clear();
            self.inbound.clear();
            self.sessions_ended.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn sessions_ended(&self) -> u32 {
        self.sessions_ended.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Radio side: queue bytes written by the client, split into chunks.
    ///
    /// Returns the number of bytes accepted.
    pub fn push_inbound(&self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for piece in bytes.chunks(NOTIFY_CHUNK) {
            let Ok(chunk) = Chunk::from_slice(piece) else {
                break;
            };
            if self.inbound.try_send(chunk).is_err() {
                warn!("Wireless inbound queue full, dropping input");
                break;
            }
            accepted += piece.len();
        }
        accepted
    }
}

impl<M: RawMutex, const N: usize> Default for LinkChannels<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-loop end of a [`LinkChannels`] pair
pub struct ChannelLink<'a, M: RawMutex, const N: usize> {
    channels: &'a LinkChannels<M, N>,
    /// Tail of an inbound chunk that did not fit the caller's buffer
    carry: Chunk,
    seen_sessions: u32,
}

impl<'a, M: RawMutex, const N: usize> ChannelLink<'a, M, N> {
    pub fn new(channels: &'a LinkChannels<M, N>) -> Self {
        Self {
            channels,
            carry: Chunk::new(),
            seen_sessions: channels.sessions_ended(),
        }
    }
}

impl<M: RawMutex, const N: usize> WirelessTransport for ChannelLink<'_, M, N> {
    fn is_client_connected(&self) -> bool {
        self.channels.is_connected()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        loop {
            if self.carry.is_empty() {
                match self.channels.inbound.try_receive() {
                    Ok(chunk) => self.carry = chunk,
                    Err(_) => break,
                }
            }
            let take = self.carry.len().min(buf.len() - n);
            if take == 0 {
                break;
            }
            buf[n..n + take].copy_from_slice(&self.carry[..take]);
            n += take;

            let rest = Chunk::from_slice(&self.carry[take..]).unwrap_or_default();
            self.carry = rest;
        }
        n
    }

    fn notify(&mut self, chunk: &[u8]) {
        if !self.is_client_connected() {
            return;
        }
        for piece in chunk.chunks(NOTIFY_CHUNK) {
            let Ok(piece) = Chunk::from_slice(piece) else {
                return;
            };
            if self.channels.outbound.try_send(piece).is_err() {
                warn!("Wireless notify queue full, dropping output");
                return;
            }
        }
    }

    fn take_session_ended(&mut self) -> bool {
        let ended = self.channels.sessions_ended();
        if ended == self.seen_sessions {
            return false;
        }
        self.seen_sessions = ended;
        self.carry.clear();
        true
    }
}
