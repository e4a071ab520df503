//! Buffering of console output for pattern search

use crate::pattern::Matcher;
use bytes::{Buf, BytesMut};

/// When the hard cap is hit, keep the newest 2/3 of it.
const DISCARD_RATIO: usize = 3;

/// A candidate found by [`StreamBuffer::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Index of the matcher that matched
    pub index: usize,
    /// Stream offset of the first matched byte
    pub start: u64,
    /// Stream offset one past the last matched byte
    pub end: u64,
}

/// Accumulates console bytes in arrival order.
///
/// Only unconsumed bytes are held. `base` is the stream offset of the first
/// held byte, so every offset handed out stays absolute.
pub struct StreamBuffer {
    pending: BytesMut,
    base: u64,
    max_size: usize,
}

impl StreamBuffer {
    /// Create a buffer holding at most `max_size` unconsumed bytes
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(max_size.min(64 * 1024)),
            base: 0,
            max_size,
        }
    }

    /// Append newly read bytes. Never drops anything: the cap is applied by
    /// [`enforce_limit`](Self::enforce_limit) once the bytes have been searched.
    pub fn append(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Unconsumed bytes
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stream offset of the first pending byte
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Stream offset one past the last byte received
    pub fn stream_position(&self) -> u64 {
        self.base + self.pending.len() as u64
    }

    /// Return the first matcher, in the order given, that finds a match.
    ///
    /// Priority is declaration order, not position: a later matcher whose
    /// text sits earlier in the buffer still loses to an earlier matcher.
    pub fn search(&self, matchers: &[Box<dyn Matcher>]) -> Option<Found> {
        matchers.iter().enumerate().find_map(|(index, matcher)| {
            matcher.find(&self.pending).map(|m| Found {
                index,
                start: self.base + m.start as u64,
                end: self.base + m.end as u64,
            })
        })
    }

    /// Pending bytes in `[start, end)`, clamped to what is still held
    pub fn slice(&self, start: u64, end: u64) -> &[u8] {
        let from = start.saturating_sub(self.base).min(self.pending.len() as u64) as usize;
        let to = end.saturating_sub(self.base).min(self.pending.len() as u64) as usize;
        &self.pending[from..to.max(from)]
    }

    /// Release everything before stream offset `end`
    pub fn consume_through(&mut self, end: u64) {
        let n = end.saturating_sub(self.base).min(self.pending.len() as u64) as usize;
        self.pending.advance(n);
        self.base += n as u64;
    }

    /// Release scanned bytes that can no longer start a match of length
    /// `longest` or less.
    pub fn retire_scanned(&mut self, longest: usize) {
        let keep = longest.saturating_sub(1);
        if self.pending.len() > keep {
            let n = self.pending.len() - keep;
            self.pending.advance(n);
            self.base += n as u64;
        }
    }

    /// Drop the oldest pending bytes if over the cap, keeping the newest 2/3
    /// of it.
    ///
    /// Only call this after a search over everything pending came up empty;
    /// the dropped bytes must already have been rejected.
    pub fn enforce_limit(&mut self) {
        if self.pending.len() <= self.max_size {
            return;
        }
        let keep = self.max_size - self.max_size / DISCARD_RATIO;
        let drop = self.pending.len().saturating_sub(keep);
        tracing::debug!(
            dropped = drop,
            kept = keep,
            "console buffer over capacity, dropping oldest unmatched bytes"
        );
        self.pending.advance(drop);
        self.base += drop as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;
    use proptest::prelude::*;

    fn matchers(patterns: &[&str]) -> Vec<Box<dyn Matcher>> {
        patterns
            .iter()
            .map(|p| Pattern::exact(*p).to_matcher().unwrap())
            .collect()
    }

    #[test]
    fn test_new_buffer() {
        let buffer = StreamBuffer::new(1024);
        assert!(buffer.is_empty());
        assert_eq!(buffer.base(), 0);
        assert_eq!(buffer.stream_position(), 0);
    }

    #[test]
    fn test_multiple_appends() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"SOL Session ");
        buffer.append(b"operational");
        assert_eq!(buffer.pending(), b"SOL Session operational");
    }

    #[test]
    fn test_search_no_match_yet() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"Boot");
        assert!(buffer.search(&matchers(&["Booting"])).is_none());
    }

    #[test]
    fn test_search_declaration_order_wins() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"UNHANDLED EXCEPTION ... root-shell");

        let found = buffer
            .search(&matchers(&["root-shell", "UNHANDLED EXCEPTION"]))
            .unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.start, 24);
    }

    #[test]
    fn test_consume_keeps_bytes_after_match() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"Booting Nautilus");

        let found = buffer.search(&matchers(&["Booting"])).unwrap();
        buffer.consume_through(found.end);
        assert_eq!(buffer.pending(), b" Nautilus");
        assert_eq!(buffer.base(), 7);

        let found = buffer.search(&matchers(&["Nautilus"])).unwrap();
        assert_eq!((found.start, found.end), (8, 16));
    }

    #[test]
    fn test_slice_is_absolute() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"abcdef");
        buffer.consume_through(2);
        assert_eq!(buffer.slice(2, 4), b"cd");
        assert_eq!(buffer.slice(0, 4), b"cd");
        assert_eq!(buffer.slice(5, 100), b"f");
    }

    #[test]
    fn test_retire_scanned_keeps_possible_prefix() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"lots of firmware noise ... Boo");
        buffer.retire_scanned("Booting".len());
        assert_eq!(buffer.pending(), b".. Boo");

        buffer.append(b"ting");
        assert!(buffer.search(&matchers(&["Booting"])).is_some());
    }

    #[test]
    fn test_compact_drops_oldest_third() {
        let mut buffer = StreamBuffer::new(90);
        buffer.append(&b"0123456789".repeat(10));
        assert_eq!(buffer.len(), 100);

        buffer.enforce_limit();
        assert_eq!(buffer.len(), 60);
        assert_eq!(buffer.base(), 40);
        assert_eq!(buffer.stream_position(), 100);
    }

    #[test]
    fn test_append_over_cap_keeps_unscanned_marker() {
        let mut buffer = StreamBuffer::new(64);
        buffer.append(b"UEFI: Booting from NIC\r\n");
        buffer.append(&[b'.'; 200]);

        let found = buffer.search(&matchers(&["Booting"])).unwrap();
        assert_eq!(found.start, 6);
    }

    #[test]
    fn test_enforce_limit_under_cap_is_noop() {
        let mut buffer = StreamBuffer::new(64);
        buffer.append(b"Nautilus");
        buffer.enforce_limit();
        assert_eq!(buffer.pending(), b"Nautilus");
        assert_eq!(buffer.base(), 0);
    }

    #[test]
    fn test_empty_append() {
        let mut buffer = StreamBuffer::new(1024);
        buffer.append(b"");
        assert!(buffer.is_empty());
    }

    proptest! {
        #[test]
        fn prop_literal_found_across_chunk_boundaries(
            prefix in "[a-z ]{0,200}",
            split in 0usize..32,
        ) {
            let needle = b"SOL Session operational";
            let mut stream = prefix.into_bytes();
            stream.extend_from_slice(needle);

            let mut buffer = StreamBuffer::new(4096);
            let m = matchers(&["SOL Session operational"]);
            let chunk = split.max(1);
            let mut found = None;
            for piece in stream.chunks(chunk) {
                buffer.append(piece);
                found = buffer.search(&m);
                if found.is_some() {
                    break;
                }
                buffer.retire_scanned(needle.len());
            }

            let found = found.expect("needle present in stream");
            prop_assert_eq!(found.end, stream.len() as u64);
            prop_assert_eq!(found.start, (stream.len() - needle.len()) as u64);
        }
    }
}
