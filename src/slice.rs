//! A read-only view exposing at most `len` bytes starting at the
//! underlying stream's current position. Reads advance both the slice's
//! own counter and the underlying stream. It never seeks or closes the
//! underlying stream; that stays the owning `Upload`'s responsibility.

use std::io::{self, Read};

pub struct StreamSlice<'a, R: Read + ?Sized> {
    inner: &'a mut R,
    remaining: u64,
}

impl<'a, R: Read + ?Sized> StreamSlice<'a, R> {
    pub fn new(inner: &'a mut R, len: u64) -> Self {
        StreamSlice {
            inner,
            remaining: len,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<'a, R: Read + ?Sized> Read for StreamSlice<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
