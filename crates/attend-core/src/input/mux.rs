use heapless::Deque;
use log::warn;

use super::{Command, InputError, LineAssembler, Transport};

/// Completed lines buffered per transport
pub const QUEUE_DEPTH: usize = 8;

/// Merges the serial and wireless line streams into one command stream
///
/// Order within a transport follows byte arrival. Across transports this is a
/// priority merge: a queued wireless command is always returned before any
/// serial one.
pub struct CommandMux {
    serial: LineAssembler,
    wireless: LineAssembler,
    serial_queue: Deque<Command, QUEUE_DEPTH>,
    wireless_queue: Deque<Command, QUEUE_DEPTH>,
}

impl CommandMux {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            serial: LineAssembler::new(Transport::Serial, max_line_len),
            wireless: LineAssembler::new(Transport::Wireless, max_line_len),
            serial_queue: Deque::new(),
            wireless_queue: Deque::new(),
        }
    }

    pub fn feed_serial(&mut self, bytes: &[u8]) -> heapless::Vec<InputError, QUEUE_DEPTH> {
        Self::feed(&mut self.serial, &mut self.serial_queue, bytes)
    }

    pub fn feed_wireless(&mut self, bytes: &[u8]) -> heapless::Vec<InputError, QUEUE_DEPTH> {
        Self::feed(&mut self.wireless, &mut self.wireless_queue, bytes)
    }

    /// Next command, wireless first. Never blocks.
    pub fn poll_command(&mut self) -> Option<Command> {
        self.wireless_queue
            .pop_front()
            .or_else(|| self.serial_queue.pop_front())
    }

    pub fn pending(&self) -> usize {
        self.serial_queue.len() + self.wireless_queue.len()
    }

    /// Drop everything queued, e.g. stale input left over from a timed-out
    /// prompt. Partial lines are kept.
    pub fn discard_pending(&mut self) {
        self.serial_queue.clear();
        self.wireless_queue.clear();
    }

    /// Forget all wireless input, queued or half-typed. Called when the
    /// wireless client goes away so the next one starts clean.
    pub fn reset_wireless(&mut self) {
        self.wireless.reset();
        self.wireless_queue.clear();
    }

    fn feed(
        assembler: &mut LineAssembler,
        queue: &mut Deque<Command, QUEUE_DEPTH>,
        bytes: &[u8],
    ) -> heapless::Vec<InputError, QUEUE_DEPTH> {
        let mut errors = heapless::Vec::new();
        for &byte in bytes {
            match assembler.feed(byte) {
                Ok(Some(command)) => {
                    if queue.is_full() {
                        if let Some(dropped) = queue.pop_front() {
                            warn!(
                                "{} command queue full, dropping '{}'",
                                assembler.transport(),
                                dropped
                            );
                        }
                    }
                    // Room was made above
                    let _ = queue.push_back(command);
                }
                Ok(None) => {}
                Err(e) => {
                    // Past QUEUE_DEPTH errors in one chunk only the first are reported
                    let _ = errors.push(e);
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(mux: &mut CommandMux) -> Option<alloc::string::String> {
        mux.poll_command().map(Command::into_string)
    }

    #[test]
    fn test_wireless_has_priority() {
        let mut mux = CommandMux::new(128);
        mux.feed_serial(b"1\n");
        mux.feed_wireless(b"2\n");

        assert_eq!(poll(&mut mux).as_deref(), Some("2"));
        assert_eq!(poll(&mut mux).as_deref(), Some("1"));
        assert_eq!(poll(&mut mux), None);
    }

    #[test]
    fn test_order_within_transport_is_preserved() {
        let mut mux = CommandMux::new(128);
        mux.feed_serial(b"a\nb");
        mux.feed_serial(b"\nc\n");
        assert_eq!(poll(&mut mux).as_deref(), Some("a"));
        assert_eq!(poll(&mut mux).as_deref(), Some("b"));
        assert_eq!(poll(&mut mux).as_deref(), Some("c"));
    }

    #[test]
    fn test_reset_wireless_forgets_half_typed_line() {
        let mut mux = CommandMux::new(128);
        mux.feed_serial(b"1");
        mux.feed_wireless(b"9\n4");
        mux.reset_wireless();

        mux.feed_wireless(b"2\n");
        mux.feed_serial(b"\n");
        assert_eq!(poll(&mut mux).as_deref(), Some("2"));
        assert_eq!(poll(&mut mux).as_deref(), Some("1"));
        assert_eq!(poll(&mut mux), None);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut mux = CommandMux::new(128);
        for i in 0..QUEUE_DEPTH + 2 {
            mux.feed_serial(alloc::format!("{i}\n").as_bytes());
        }
        assert_eq!(mux.pending(), QUEUE_DEPTH);
        assert_eq!(poll(&mut mux).as_deref(), Some("2"));
    }

    #[test]
    fn test_errors_are_returned_per_transport() {
        let mut mux = CommandMux::new(3);
        let errors = mux.feed_wireless(b"toolong\nok\n");
        assert_eq!(
            errors.as_slice(),
            &[InputError::LineTooLong {
                transport: Transport::Wireless,
                len: 7
            }]
        );
        assert_eq!(poll(&mut mux).as_deref(), Some("ok"));
    }
}
