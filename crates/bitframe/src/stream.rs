//! Byte sources a header stream can look ahead into.
//!
//! A [`Stream`] owns its buffer and serves a contiguous window of at least
//! the requested size starting at its current offset. The window is reported
//! as an index into [`Stream::buffer`]; successive calls may return different
//! indices when the stream moves its data around. Large spans that should
//! not be buffered are skipped as [`Blob`]s.

use crate::errors::{Error, Result};

pub trait Stream {
    /// Absolute position of the next unconsumed byte.
    fn offset(&self) -> u64;

    /// Ensures `size` bytes starting at [`Stream::offset`] are resident and
    /// returns the index of the first one in [`Stream::buffer`].
    ///
    /// Fails with [`Error::EndOfStream`] when the source has fewer bytes
    /// left.
    fn peek(&mut self, size: usize) -> Result<usize>;

    fn buffer(&self) -> &[u8];

    fn buffer_mut(&mut self) -> &mut [u8];

    /// Describes the next `size` bytes without buffering or consuming them.
    fn peek_blob(&self, size: u64) -> Blob {
        Blob {
            offset: self.offset(),
            size,
        }
    }

    /// Skips the next `size` bytes, dropping whatever of them is buffered.
    fn get_blob(&mut self, size: u64) -> Blob;
}

impl<S: Stream + ?Sized> Stream for &mut S {
    fn offset(&self) -> u64 {
        (**self).offset()
    }

    fn peek(&mut self, size: usize) -> Result<usize> {
        (**self).peek(size)
    }

    fn buffer(&self) -> &[u8] {
        (**self).buffer()
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        (**self).buffer_mut()
    }

    fn peek_blob(&self, size: u64) -> Blob {
        (**self).peek_blob(size)
    }

    fn get_blob(&mut self, size: u64) -> Blob {
        (**self).get_blob(size)
    }
}

/// A byte range known to exist in a stream but not held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Blob {
    pub offset: u64,
    pub size: u64,
}

impl Blob {
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Bytes a stream has advanced since a recorded offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distance {
    start: u64,
}

impl Distance {
    pub fn new<S: Stream + ?Sized>(stream: &S) -> Self {
        Distance {
            start: stream.offset(),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn measure<S: Stream + ?Sized>(&self, stream: &S) -> u64 {
        stream.offset() - self.start
    }
}

/// A stream over bytes already in memory.
///
/// A growable stream extends itself with zeros instead of running out, which
/// is what composing a new buffer needs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    bytes: Vec<u8>,
    offset: u64,
    growable: bool,
}

impl MemoryStream {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        MemoryStream {
            bytes: bytes.into(),
            offset: 0,
            growable: false,
        }
    }

    pub fn growable() -> Self {
        MemoryStream {
            growable: true,
            ..Self::default()
        }
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    fn ensure(&mut self, end: usize) -> bool {
        if end <= self.bytes.len() {
            return true;
        }
        if self.growable {
            self.bytes.resize(end, 0);
        }
        self.growable
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(bytes: Vec<u8>) -> Self {
        MemoryStream::new(bytes)
    }
}

impl Stream for MemoryStream {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&mut self, size: usize) -> Result<usize> {
        let start = self.offset as usize;
        match start.checked_add(size) {
            Some(end) if self.ensure(end) => Ok(start),
            _ => Err(Error::end_of_stream("memory")),
        }
    }

    fn buffer(&self) -> &[u8] {
        &self.bytes
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn get_blob(&mut self, size: u64) -> Blob {
        let blob = self.peek_blob(size);
        self.ensure(blob.end() as usize);
        self.offset = blob.end();
        blob
    }
}
