//! Stream capability traits for the upload and download directions.
//!
//! `Source` and `Sink` narrow a byte stream down to exactly what the
//! transfer engine needs: reading or writing, plus enough position/seek
//! control to resume a partial upload or download. Both carry a `close`
//! hook so `close_stream` has something concrete to call at teardown, and
//! `Source` carries a seekability predicate so the resumable-upload
//! completion check can skip seeking on non-seekable sources (e.g. a live
//! network socket).

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A byte source an `Upload` reads from.
pub trait Source: Read {
    /// Current read offset from the start of the stream.
    fn tell(&mut self) -> io::Result<u64>;

    /// Seek to an absolute byte offset. Returns
    /// `io::ErrorKind::Unsupported` if the source is not seekable.
    fn seek_to(&mut self, pos: u64) -> io::Result<u64>;

    /// Seek to end-of-stream and return the resulting absolute offset.
    /// Used only by the resumable upload completion check, which is itself
    /// guarded by `is_seekable`.
    fn seek_to_end(&mut self) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream does not support seeking to end",
        ))
    }

    fn is_seekable(&self) -> bool;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A byte sink a `Download` writes into.
pub trait Sink: Write {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Source for std::fs::File {
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(pos))
    }

    fn seek_to_end(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

impl Sink for std::fs::File {}

impl Source for Cursor<Vec<u8>> {
    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(pos))
    }

    fn seek_to_end(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

impl Sink for Vec<u8> {}
impl Sink for Cursor<Vec<u8>> {}

/// Wraps a plain `Read` with no seek capability (e.g. a live network
/// socket) so it can serve as an `Upload` source in the streaming-resumable
/// case. `tell()` is synthesized by counting bytes consumed through `read`;
/// `seek_to` always fails.
pub struct NonSeekable<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> NonSeekable<R> {
    pub fn new(inner: R) -> Self {
        NonSeekable { inner, pos: 0 }
    }
}

impl<R: Read> Read for NonSeekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> Source for NonSeekable<R> {
    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn seek_to(&mut self, _pos: u64) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "underlying stream is not seekable",
        ))
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_seekable_tracks_position_via_reads() {
        let mut s = NonSeekable::new(Cursor::new(vec![1u8, 2, 3, 4, 5]));
        let mut buf = [0u8; 2];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(s.tell().unwrap(), 2);
        assert!(!s.is_seekable());
        assert!(s.seek_to(0).is_err());
    }
}
