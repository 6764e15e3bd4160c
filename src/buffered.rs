//! A read-ahead buffer sized to a single upload chunk.
//!
//! Wraps an upstream reader with a fixed-capacity buffer sized to a chunk.
//! On construction it attempts to fill the buffer in one shot; this is the
//! "peek ahead by one chunk" trick that lets the resumable upload engine
//! classify a chunk as the last one (server-side EOF) without losing any
//! of that chunk's bytes. Once buffered, bytes only ever come back out via
//! `read`, never back onto the upstream reader.

use std::io::{self, Read};

pub struct BufferedStream {
    buf: Vec<u8>,
    pos: usize,
    start: u64,
    exhausted: bool,
}

impl BufferedStream {
    /// Reads ahead up to `capacity` bytes from `inner`, starting logically
    /// at absolute offset `start` (the caller is responsible for having
    /// positioned `inner` there already; this type never seeks).
    pub fn new<R: Read + ?Sized>(inner: &mut R, start: u64, capacity: u64) -> io::Result<Self> {
        let capacity = capacity as usize;
        let mut buf = vec![0u8; capacity];
        let mut filled = 0;
        while filled < capacity {
            let n = inner.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        let exhausted = filled < capacity;
        Ok(BufferedStream {
            buf,
            pos: 0,
            start,
            exhausted,
        })
    }

    /// Absolute offset one past the last buffered byte.
    pub fn stream_end_position(&self) -> u64 {
        self.start + self.buf.len() as u64
    }

    /// True iff the upstream reader returned fewer bytes than requested,
    /// i.e. end-of-stream was observed while filling the buffer.
    pub fn stream_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Returns up to `n` bytes from the buffer, advancing the internal
    /// read position. Never touches the upstream reader again.
    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let end = (self.pos + n).min(self.buf.len());
        let out = self.buf[self.pos..end].to_vec();
        self.pos = end;
        out
    }
}

impl Read for BufferedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = BufferedStream::read(self, buf.len());
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fills_full_capacity_when_upstream_has_enough() {
        let mut src = Cursor::new(vec![7u8; 100]);
        let mut buffered = BufferedStream::new(&mut src, 0, 64).unwrap();
        assert!(!buffered.stream_exhausted());
        assert_eq!(buffered.stream_end_position(), 64);
        assert_eq!(buffered.read(64).len(), 64);
    }

    #[test]
    fn detects_exhaustion_on_short_upstream() {
        let mut src = Cursor::new(vec![7u8; 10]);
        let mut buffered = BufferedStream::new(&mut src, 5, 64).unwrap();
        assert!(buffered.stream_exhausted());
        assert_eq!(buffered.stream_end_position(), 15);
        assert_eq!(buffered.read(64), vec![7u8; 10]);
    }

    #[test]
    fn read_never_returns_more_than_buffered() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buffered = BufferedStream::new(&mut src, 0, 64).unwrap();
        assert_eq!(buffered.read(2), vec![1, 2]);
        assert_eq!(buffered.read(64), vec![3]);
        assert_eq!(buffered.read(64), Vec::<u8>::new());
    }
}
