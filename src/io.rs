//! The streaming I/O layer: abstract byte sources and sinks.
//!
//! The codec is driven entirely through these two traits; it makes no
//! assumption about files, sockets or buffers beyond their contracts. A
//! blocking read or write on the underlying transport is the only place a
//! decode/encode may stall, and that behavior is owned by the concrete
//! implementation, not by the codec.

use std::io::{Read, Write};

use crate::alloc_util::try_reserve;
use crate::{CborError, ErrorCode};

/// An abstract byte sink the encoder writes through.
pub trait Sink {
    /// Append `bytes` to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transport fails; bytes already
    /// flushed are not retracted.
    fn write(&mut self, bytes: &[u8]) -> Result<(), CborError>;

    /// Append a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transport fails.
    fn write_u8(&mut self, byte: u8) -> Result<(), CborError> {
        self.write(&[byte])
    }

    /// Flush any buffered bytes to the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transport fails.
    fn flush(&mut self) -> Result<(), CborError> {
        Ok(())
    }

    /// Number of bytes written so far.
    fn position(&self) -> usize;
}

/// An abstract byte source the decoder pulls from.
///
/// A source may be fed fewer bytes than requested and resumed later: a
/// failing `read_exact` must not discard buffered bytes, so a caller that
/// supplies more input can retry at the same parse position.
pub trait Source {
    /// Read exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if the source is exhausted before `n` bytes
    /// are available, or `Io` on transport failure.
    fn read_exact(&mut self, n: usize) -> Result<&[u8], CborError>;

    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` or `Io` as for [`Source::read_exact`].
    fn read_u8(&mut self) -> Result<u8, CborError> {
        Ok(self.read_exact(1)?[0])
    }

    /// Look at the next byte without consuming it.
    ///
    /// Returns `Ok(None)` on a clean end of input, which callers use to
    /// distinguish an item boundary from truncation mid-item.
    ///
    /// # Errors
    ///
    /// Returns `Io` on transport failure.
    fn peek_u8(&mut self) -> Result<Option<u8>, CborError>;

    /// Number of bytes consumed so far.
    fn position(&self) -> usize;
}

/// A source over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Wrap `data` as a source positioned at its start.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns `true` iff every byte has been consumed.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

impl Source for SliceSource<'_> {
    fn read_exact(&mut self, n: usize) -> Result<&[u8], CborError> {
        let off = self.pos;
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| CborError::new(ErrorCode::LengthOverflow, off))?;
        if end > self.data.len() {
            return Err(CborError::new(ErrorCode::UnexpectedEof, off));
        }
        let s = &self.data[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn peek_u8(&mut self) -> Result<Option<u8>, CborError> {
        Ok(self.data.get(self.pos).copied())
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// A sink appending to an owned `Vec<u8>`.
#[derive(Debug, Default)]
pub struct VecSink {
    buf: Vec<u8>,
}

impl VecSink {
    /// Create an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create a sink with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::new();
        let _ = buf.try_reserve(capacity);
        Self { buf }
    }

    /// Borrow the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume and return the written bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Sink for VecSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CborError> {
        let pos = self.buf.len();
        try_reserve(&mut self.buf, bytes.len(), pos)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_u8(&mut self, byte: u8) -> Result<(), CborError> {
        if self.buf.len() == self.buf.capacity() {
            let pos = self.buf.len();
            try_reserve(&mut self.buf, 1, pos)?;
        }
        self.buf.push(byte);
        Ok(())
    }

    fn position(&self) -> usize {
        self.buf.len()
    }
}

const READ_CHUNK: usize = 8 * 1024;

/// A source pulling from any [`std::io::Read`] through an internal buffer.
///
/// Short reads are accumulated; a request that cannot yet be satisfied fails
/// with `UnexpectedEof` but keeps the partial bytes buffered, so feedable
/// readers (bounded channels, growing files) can resume mid-item.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    consumed: usize,
    last_io_error: Option<std::io::Error>,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap `reader` as a source.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            start: 0,
            consumed: 0,
            last_io_error: None,
        }
    }

    /// Take the underlying I/O error behind the most recent `Io` failure.
    pub fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.last_io_error.take()
    }

    /// Consume the source and return the wrapped reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Pull from the reader until at least `n` bytes are buffered.
    fn fill(&mut self, n: usize) -> Result<(), CborError> {
        if self.buffered() < n && self.start > 0 {
            // Compact so resumed parses do not grow the buffer without bound.
            self.buf.drain(..self.start);
            self.start = 0;
        }
        while self.buffered() < n {
            let mut chunk = [0u8; READ_CHUNK];
            match self.reader.read(&mut chunk) {
                Ok(0) => return Err(CborError::new(ErrorCode::UnexpectedEof, self.consumed)),
                Ok(got) => {
                    try_reserve(&mut self.buf, got, self.consumed)?;
                    self.buf.extend_from_slice(&chunk[..got]);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.last_io_error = Some(err);
                    return Err(CborError::new(ErrorCode::Io, self.consumed));
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Source for ReaderSource<R> {
    fn read_exact(&mut self, n: usize) -> Result<&[u8], CborError> {
        self.fill(n)?;
        let start = self.start;
        self.start += n;
        self.consumed += n;
        Ok(&self.buf[start..start + n])
    }

    fn peek_u8(&mut self) -> Result<Option<u8>, CborError> {
        match self.fill(1) {
            Ok(()) => Ok(Some(self.buf[self.start])),
            Err(err) if err.code == ErrorCode::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn position(&self) -> usize {
        self.consumed
    }
}

/// A sink writing through any [`std::io::Write`].
///
/// Dropping the sink flushes buffered bytes, so partial output is never
/// silently truncated on early exits; errors during the drop flush are
/// necessarily ignored, so callers wanting to observe them should call
/// [`Sink::flush`] explicitly.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    written: usize,
    last_io_error: Option<std::io::Error>,
}

impl<W: Write> WriterSink<W> {
    /// Wrap `writer` as a sink.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            last_io_error: None,
        }
    }

    /// Take the underlying I/O error behind the most recent `Io` failure.
    pub fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.last_io_error.take()
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CborError> {
        match self.writer.write_all(bytes) {
            Ok(()) => {
                self.written += bytes.len();
                Ok(())
            }
            Err(err) => {
                self.last_io_error = Some(err);
                Err(CborError::new(ErrorCode::Io, self.written))
            }
        }
    }

    fn flush(&mut self) -> Result<(), CborError> {
        match self.writer.flush() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.last_io_error = Some(err);
                Err(CborError::new(ErrorCode::Io, self.written))
            }
        }
    }

    fn position(&self) -> usize {
        self.written
    }
}

impl<W: Write> Drop for WriterSink<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
