//! File-backed [`Stream`] with a fixed, block-aligned buffer.
//!
//! The buffer never grows. Unread bytes are moved back to its start when the
//! free space after them is too small for a request; a request that could not
//! fit even into an empty buffer is a configuration error
//! ([`Error::Capacity`]), not an end of stream. The file is only ever read
//! forward.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    config::StreamConfig,
    errors::{Error, Result},
    stream::{Blob, Stream},
};

#[derive(Debug)]
struct Buffer {
    bytes: Vec<u8>,
    block: usize,
    /// Index of the first unread byte.
    start: usize,
    /// Unread bytes from `start`.
    len: usize,
}

impl Buffer {
    fn new(config: &StreamConfig) -> Self {
        Buffer {
            bytes: vec![0; config.normalized_capacity()],
            block: config.block_size,
            start: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Free bytes anywhere in the buffer.
    fn room(&self) -> usize {
        self.capacity() - self.len
    }

    /// Free bytes after the unread data.
    fn tail(&self) -> usize {
        self.capacity() - (self.start + self.len)
    }

    fn defragment(&mut self) {
        self.bytes.copy_within(self.start..self.start + self.len, 0);
        self.start = 0;
    }

    fn consume(&mut self, size: usize) {
        self.start += size;
        self.len -= size;
        if self.len == 0 {
            self.start = 0;
        }
    }
}

#[derive(Debug)]
pub struct FileStream {
    file: File,
    path: PathBuf,
    /// Absolute offset of `buffer.start`.
    offset: u64,
    /// Where the next file read starts.
    position: u64,
    buffer: Buffer,
}

impl FileStream {
    /// Opens `path` with a buffer of at least `capacity` bytes.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        Self::with_config(path, StreamConfig::with_capacity(capacity))
    }

    pub fn with_config(path: impl AsRef<Path>, config: StreamConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        Ok(FileStream {
            file,
            path,
            offset: 0,
            position: 0,
            buffer: Buffer::new(&config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the buffer after normalization to whole blocks.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Bytes read from the file but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len
    }

    fn io_error(&self, source: io::Error) -> Error {
        Error::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn seek(&mut self, at: u64) -> Result<()> {
        assert!(
            at >= self.position,
            "file stream moved backward from {} to {at}",
            self.position
        );
        if at != self.position {
            self.file
                .seek(SeekFrom::Start(at))
                .map_err(|source| self.io_error(source))?;
            self.position = at;
        }
        Ok(())
    }

    /// Reads at least `required` more bytes unless the file ends first,
    /// preferring whole blocks.
    fn fill(&mut self, required: usize) -> Result<()> {
        let tail = self.buffer.tail();
        let aligned = tail / self.buffer.block * self.buffer.block;
        let want = if required <= aligned { aligned } else { tail };

        let at = self.offset + self.buffer.len as u64;
        self.seek(at)?;

        let end = self.buffer.start + self.buffer.len;
        let (read, result) = read_into(&mut self.file, &mut self.buffer.bytes[end..end + want]);

        // Bytes that arrived before a failure are kept so the cursor and the
        // buffer stay in step.
        self.position = at + read as u64;
        self.buffer.len += read;
        trace!("{}: read {read} of {want} bytes at {at}", self.path.display());
        result.map_err(|source| self.io_error(source))
    }
}

/// Fills `target` until it is full or the reader is exhausted. Returns the
/// bytes read alongside the first non-retryable error.
fn read_into(reader: &mut impl Read, target: &mut [u8]) -> (usize, io::Result<()>) {
    let mut read = 0;
    while read < target.len() {
        match reader.read(&mut target[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (read, Err(e)),
        }
    }
    (read, Ok(()))
}

impl Stream for FileStream {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&mut self, size: usize) -> Result<usize> {
        if self.buffer.len < size {
            let required = size - self.buffer.len;
            if self.buffer.room() < required {
                return Err(Error::Capacity {
                    requested: size,
                    capacity: self.buffer.capacity(),
                    buffered: self.buffer.len,
                });
            }

            if self.buffer.tail() < required {
                debug!(
                    "{}: moving {} buffered bytes to the buffer start",
                    self.path.display(),
                    self.buffer.len
                );
                self.buffer.defragment();
            }

            self.fill(required)?;
            if self.buffer.len < size {
                return Err(Error::end_of_stream(self.path.display().to_string()));
            }
        }
        Ok(self.buffer.start)
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer.bytes
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.bytes
    }

    fn get_blob(&mut self, size: u64) -> Blob {
        let blob = self.peek_blob(size);
        let dropped = size.min(self.buffer.len as u64) as usize;
        self.buffer.consume(dropped);
        self.offset += size;
        blob
    }
}
