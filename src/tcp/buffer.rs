//! Circular byte buffer carrying the sequence number at its origin, so that
//! "peek the bytes starting at absolute sequence S" is well defined without
//! re-deriving S from a running offset everywhere it's needed.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct SeqBuffer {
    data: VecDeque<u8>,
    origin: u32,
    capacity: usize,
}

impl SeqBuffer {
    pub fn new(origin: u32, capacity: usize) -> Self {
        SeqBuffer {
            data: VecDeque::with_capacity(capacity),
            origin,
            capacity,
        }
    }

    pub fn origin(&self) -> u32 {
        self.origin
    }

    pub fn end(&self) -> u32 {
        self.origin.wrapping_add(self.data.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    /// Append as many of `bytes` as fit; returns the number actually queued.
    pub fn push_back(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        self.data.extend(bytes[..n].iter().copied());
        n
    }

    /// Copy up to `max_len` bytes starting at absolute sequence `seq`
    /// without removing them. `seq` must lie within `[origin, end()]`.
    pub fn peek_at(&self, seq: u32, max_len: usize) -> Vec<u8> {
        let offset = seq.wrapping_sub(self.origin) as usize;
        if offset > self.data.len() {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(offset)
            .take(max_len)
            .copied()
            .collect()
    }

    /// Drop the prefix up to (but not including) absolute sequence
    /// `new_origin`, advancing `origin()` to `new_origin`.
    pub fn advance_origin_to(&mut self, new_origin: u32) {
        let n = (new_origin.wrapping_sub(self.origin) as usize).min(self.data.len());
        self.data.drain(..n);
        self.origin = self.origin.wrapping_add(n as u32);
    }

    /// Append bytes that are known to extend the buffer contiguously
    /// (used by the receive side, where `end()` tracks RCV.NXT).
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
    }

    /// Drain up to `len` bytes from the front into `buf`, returning the
    /// number of bytes copied and advancing `origin()` by that amount.
    pub fn read_front(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len());
        for slot in buf[..n].iter_mut() {
            *slot = self.data.pop_front().unwrap();
        }
        self.origin = self.origin.wrapping_add(n as u32);
        n
    }

    pub fn reserve_exact(&mut self, additional: usize) {
        self.capacity += additional;
        self.data.reserve(additional);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_and_advance_track_origin() {
        let mut buf = SeqBuffer::new(1000, 16);
        buf.push_back(b"hello world");
        assert_eq!(buf.peek_at(1000, 5), b"hello");
        assert_eq!(buf.peek_at(1005, 6), b" world");

        buf.advance_origin_to(1005);
        assert_eq!(buf.origin(), 1005);
        assert_eq!(buf.peek_at(1005, 6), b" world");
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn push_back_respects_capacity() {
        let mut buf = SeqBuffer::new(0, 4);
        let n = buf.push_back(b"abcdef");
        assert_eq!(n, 4);
        assert!(buf.is_full());
    }

    #[test]
    fn read_front_advances_origin() {
        let mut buf = SeqBuffer::new(500, 16);
        buf.extend(b"data");
        let mut out = [0u8; 2];
        let n = buf.read_front(&mut out);
        assert_eq!(n, 2);
        assert_eq!(&out, b"da");
        assert_eq!(buf.origin(), 502);
    }
}
