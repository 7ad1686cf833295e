//! Lookahead over a [`Stream`] that keeps placed handles valid when the
//! stream moves its buffer.
//!
//! Placements are laid out back to back from the stream's current offset;
//! `consumed` counts the bytes placed so far. Every placement records its
//! buffer index in the [`Stash`] and hands out a [`Ptr`] naming the stash
//! slot. When a later, larger lookahead makes the stream report a different
//! window index, every stashed index is shifted by the same delta.
//!
//! [`HeaderStream::reset`] empties the stash and starts a new generation;
//! resolving a pointer from an earlier generation panics.

use log::debug;

use crate::{
    errors::Result,
    stream::{Blob, Stream},
};

/// A placed position: a stash slot tagged with the stash generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ptr {
    slot: usize,
    generation: u64,
}

/// Maps pointers to the bytes they were placed at.
pub trait Resolve {
    /// Buffer contents from the pointer's position to the end of the buffer.
    fn resolve(&self, ptr: Ptr) -> &[u8];
}

pub trait ResolveMut: Resolve {
    fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8];
}

impl<R: Resolve + ?Sized> Resolve for &R {
    fn resolve(&self, ptr: Ptr) -> &[u8] {
        (**self).resolve(ptr)
    }
}

impl<R: Resolve + ?Sized> Resolve for &mut R {
    fn resolve(&self, ptr: Ptr) -> &[u8] {
        (**self).resolve(ptr)
    }
}

impl<R: ResolveMut + ?Sized> ResolveMut for &mut R {
    fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8] {
        (**self).resolve_mut(ptr)
    }
}

/// Buffer indices of every live placement.
#[derive(Debug, Clone, Default)]
pub struct Stash {
    positions: Vec<usize>,
    generation: u64,
}

impl Stash {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn push(&mut self, position: usize) -> Ptr {
        self.positions.push(position);
        Ptr {
            slot: self.positions.len() - 1,
            generation: self.generation,
        }
    }

    /// Rebases every position from window index `from` to `to`.
    fn relocate(&mut self, from: usize, to: usize) {
        for position in &mut self.positions {
            *position = *position - from + to;
        }
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.generation += 1;
    }

    pub fn position(&self, ptr: Ptr) -> usize {
        assert_eq!(
            ptr.generation, self.generation,
            "stale handle: placed before the last header stream reset"
        );
        self.positions[ptr.slot]
    }
}

#[derive(Debug)]
pub struct HeaderStream<S> {
    stream: S,
    stash: Stash,
    consumed: usize,
    /// Window index the stream reported last.
    window: Option<usize>,
}

impl<S: Stream> HeaderStream<S> {
    pub fn new(stream: S) -> Self {
        HeaderStream {
            stream,
            stash: Stash::default(),
            consumed: 0,
            window: None,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    /// Bytes placed since the last reset.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Absolute offset of the next placement.
    pub fn offset(&self) -> u64 {
        self.stream.offset() + self.consumed as u64
    }

    /// Looks ahead `bytes` past the consumed ones, relocating the stash if
    /// the window moved, and returns the buffer index of the first of them.
    fn window(&mut self, bytes: usize) -> Result<usize> {
        let start = self.stream.peek(self.consumed.saturating_add(bytes))?;
        match self.window {
            Some(previous) if previous != start => {
                debug!(
                    "window moved from {previous} to {start}, relocating {} handles",
                    self.stash.len()
                );
                self.stash.relocate(previous, start);
            }
            _ => {}
        }
        self.window = Some(start);
        Ok(start + self.consumed)
    }

    /// Places the next `bytes` bytes and stashes their position.
    pub fn place(&mut self, bytes: usize) -> Result<Ptr> {
        let position = self.window(bytes)?;
        self.consumed += bytes;
        Ok(self.stash.push(position))
    }

    /// The next `bytes` bytes, without placing them.
    pub fn peek(&mut self, bytes: usize) -> Result<&[u8]> {
        let position = self.window(bytes)?;
        Ok(&self.stream.buffer()[position..position + bytes])
    }

    /// Forgets every placement. Handles placed so far must not be used
    /// again.
    pub fn reset(&mut self) {
        if !self.stash.is_empty() || self.consumed > 0 {
            debug!(
                "reset after {} bytes and {} handles",
                self.consumed,
                self.stash.len()
            );
        }
        self.consumed = 0;
        self.window = None;
        self.stash.clear();
    }

    /// Advances the stream past the consumed bytes and resets.
    pub fn commit(&mut self) -> Blob {
        let blob = self.stream.get_blob(self.consumed as u64);
        self.reset();
        blob
    }

    /// Commits, then skips `size` more bytes without buffering them.
    pub fn skip(&mut self, size: u64) -> Blob {
        self.commit();
        self.stream.get_blob(size)
    }

    /// Absolute stream offset of a placed position.
    pub fn offset_of(&self, ptr: Ptr) -> u64 {
        let position = self.stash.position(ptr);
        match self.window {
            Some(window) => self.stream.offset() + (position - window) as u64,
            None => self.stream.offset(),
        }
    }

    /// `size` bytes right after the consumed ones, not buffered.
    pub fn peek_blob(&self, size: u64) -> Blob {
        Blob {
            offset: self.offset(),
            size,
        }
    }
}

impl<S: Stream> Resolve for HeaderStream<S> {
    fn resolve(&self, ptr: Ptr) -> &[u8] {
        &self.stream.buffer()[self.stash.position(ptr)..]
    }
}

impl<S: Stream> ResolveMut for HeaderStream<S> {
    fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8] {
        let position = self.stash.position(ptr);
        &mut self.stream.buffer_mut()[position..]
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A fixed buffer handing out pointers at chosen positions.
    pub(crate) struct Slice {
        bytes: Vec<u8>,
        stash: Stash,
    }

    impl Slice {
        pub(crate) fn new(bytes: Vec<u8>) -> Self {
            Slice {
                bytes,
                stash: Stash::default(),
            }
        }

        pub(crate) fn ptr(&mut self, position: usize) -> Ptr {
            self.stash.push(position)
        }

        pub(crate) fn bytes(&self) -> &[u8] {
            &self.bytes
        }
    }

    impl Resolve for Slice {
        fn resolve(&self, ptr: Ptr) -> &[u8] {
            &self.bytes[self.stash.position(ptr)..]
        }
    }

    impl ResolveMut for Slice {
        fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8] {
            let position = self.stash.position(ptr);
            &mut self.bytes[position..]
        }
    }

    /// Serves bytes like a memory stream but moves them to a new place in its
    /// buffer on every peek, scribbling over the old copy.
    pub(crate) struct Shifting {
        buffer: Vec<u8>,
        start: usize,
        len: usize,
        offset: u64,
    }

    impl Shifting {
        pub(crate) fn new(data: Vec<u8>) -> Self {
            let mut buffer = vec![0xEE; data.len() + 64];
            buffer[..data.len()].copy_from_slice(&data);
            Shifting {
                buffer,
                start: 0,
                len: data.len(),
                offset: 0,
            }
        }
    }

    impl Stream for Shifting {
        fn offset(&self) -> u64 {
            self.offset
        }

        fn peek(&mut self, size: usize) -> Result<usize> {
            if size > self.len {
                return Err(crate::errors::Error::end_of_stream("shifting"));
            }
            let live = self.buffer[self.start..self.start + self.len].to_vec();
            self.buffer.fill(0xEE);
            self.start = (self.start + 9) % 40 + 1;
            self.buffer[self.start..self.start + self.len].copy_from_slice(&live);
            Ok(self.start)
        }

        fn buffer(&self) -> &[u8] {
            &self.buffer
        }

        fn buffer_mut(&mut self) -> &mut [u8] {
            &mut self.buffer
        }

        fn get_blob(&mut self, size: u64) -> Blob {
            let blob = self.peek_blob(size);
            let dropped = (size as usize).min(self.len);
            self.start += dropped;
            self.len -= dropped;
            self.offset += size;
            blob
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Shifting;
    use super::*;
    use crate::{field::be, stream::MemoryStream};

    #[test]
    fn test_place_is_contiguous() {
        let mut hs = HeaderStream::new(MemoryStream::new(vec![1, 2, 3, 4, 5, 6]));
        let a = hs.place(2).unwrap();
        let b = hs.place(3).unwrap();
        assert_eq!(hs.resolve(a)[..2], [1, 2]);
        assert_eq!(hs.resolve(b)[..3], [3, 4, 5]);
        assert_eq!(hs.consumed(), 5);
        assert_eq!(hs.offset(), 5);
        assert_eq!(hs.stream().offset(), 0);
        assert!(hs.place(2).unwrap_err().is_end_of_stream());
        assert_eq!(hs.consumed(), 5);
    }

    #[test]
    fn test_peek_does_not_place() {
        let mut hs = HeaderStream::new(MemoryStream::new(vec![9, 8, 7]));
        assert_eq!(hs.peek(2).unwrap(), &[9, 8]);
        assert_eq!(hs.consumed(), 0);
        assert!(hs.stash().is_empty());
    }

    #[test]
    fn test_relocation_keeps_handles_valid() {
        let data: Vec<u8> = (0u8..40).collect();
        let mut hs = HeaderStream::new(Shifting::new(data));

        let handles: Vec<_> = (0..8).map(|_| hs.place(4).unwrap()).collect();
        let before: Vec<_> = handles
            .iter()
            .map(|ptr| be::U32.decode(hs.resolve(*ptr)))
            .collect();

        // A larger lookahead moves the window again.
        hs.peek(8).unwrap();
        for (i, ptr) in handles.iter().enumerate() {
            let value = be::U32.decode(hs.resolve(*ptr));
            assert_eq!(value, before[i]);
            let first = (i * 4) as u32;
            let expected = first << 24 | (first + 1) << 16 | (first + 2) << 8 | (first + 3);
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn test_writes_survive_relocation() {
        let mut hs = HeaderStream::new(Shifting::new(vec![0; 16]));
        let ptr = hs.place(2).unwrap();
        be::U16.encode(hs.resolve_mut(ptr), 0xBEEFu16);
        hs.place(2).unwrap();
        hs.peek(4).unwrap();
        assert_eq!(be::U16.decode(hs.resolve(ptr)), 0xBEEFu16);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_reset_invalidates_handles() {
        let mut hs = HeaderStream::new(MemoryStream::new(vec![0; 4]));
        let ptr = hs.place(2).unwrap();
        hs.reset();
        hs.resolve(ptr);
    }

    #[test]
    fn test_commit_advances_stream() {
        let mut hs = HeaderStream::new(MemoryStream::new(vec![1, 2, 3, 4, 5, 6, 7, 8]));
        hs.place(3).unwrap();
        let blob = hs.commit();
        assert_eq!(blob, Blob { offset: 0, size: 3 });
        assert_eq!(hs.consumed(), 0);
        assert_eq!(hs.stash().generation(), 1);

        let ptr = hs.place(1).unwrap();
        assert_eq!(hs.resolve(ptr)[0], 4);

        assert_eq!(hs.peek_blob(2), Blob { offset: 4, size: 2 });
        let skipped = hs.skip(2);
        assert_eq!(skipped, Blob { offset: 4, size: 2 });
        assert_eq!(hs.offset(), 6);
    }
}
