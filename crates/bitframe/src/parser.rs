//! Recursive, budget-bounded parsing and the structural events it reports.
//!
//! A concrete format implements [`Parse`] for its nodes. A node places its
//! header fields through the [`Parser`], reports the header, then either
//! hands off its payload as a [`Blob`] or opens a [`Boundary`] and parses its
//! children against a [`Remainder`] sized from its own declared length.
//!
//! Events go to an [`Observer`]. The parser never reads them back; they exist
//! for logging, indexing and validation layered on top.

use std::{
    any::Any,
    ops::{Deref, DerefMut},
};

use log::{debug, warn};

use crate::{
    composer::{Composer, Place, Placed, place_array, place_text},
    errors::{Error, Result},
    field::{Array, ArrayCount, ArrayRef, Field, FieldRef, Region, Shape, Text, TextRef, be},
    footprint::{Footprint, bytes_for},
    header_stream::{HeaderStream, Ptr, Resolve, ResolveMut},
    remainder::Remainder,
    stream::{Blob, Stream},
    value::Value,
    verify::{Mismatch, Verification},
};

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A structural node identified in the data, e.g. a decoded box header.
pub trait Header: AsAny {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Recovers the concrete header type behind an event.
pub fn cast_header<T: Header + Any>(header: &dyn Header) -> Option<&T> {
    header.as_any().downcast_ref()
}

#[derive(Clone, Copy)]
pub enum EventKind<'a> {
    /// Decoding a node failed; the error is still on its way to the caller.
    Exception(&'a Error),
    Header(&'a dyn Header),
    /// Nested content of `header` starts, bounded by `remainder`.
    Begin {
        header: &'a dyn Header,
        remainder: Remainder,
    },
    /// Leaf payload of `header`, left in the stream.
    Data { header: &'a dyn Header, blob: Blob },
    /// Nested content of `header` ended, normally or not.
    End {
        header: &'a dyn Header,
        remainder: Remainder,
    },
}

/// One structural milestone.
#[derive(Clone, Copy)]
pub struct Event<'a> {
    pub kind: EventKind<'a>,
    /// Resolves handles placed for the node the event is about.
    pub source: &'a dyn Resolve,
    /// Absolute offset of the next placement when the event fired.
    pub offset: u64,
    /// Boundaries open around the event.
    pub depth: usize,
}

impl<'a> Event<'a> {
    pub fn header(&self) -> Option<&'a dyn Header> {
        match self.kind {
            EventKind::Exception(_) => None,
            EventKind::Header(header)
            | EventKind::Begin { header, .. }
            | EventKind::Data { header, .. }
            | EventKind::End { header, .. } => Some(header),
        }
    }

    pub fn cast_header<T: Header + Any>(&self) -> Option<&'a T> {
        self.header().and_then(cast_header)
    }
}

/// Receives parser events. Every event is ignored unless overridden.
pub trait Observer {
    fn event(&mut self, event: &Event<'_>) {
        let _ = event;
    }
}

impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn event(&mut self, event: &Event<'_>) {
        (**self).event(event);
    }
}

/// Logs every event, indented by depth; exceptions at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn event(&mut self, event: &Event<'_>) {
        let indent = event.depth * 2;
        let at = event.offset;
        match event.kind {
            EventKind::Exception(error) => warn!("{:indent$}{error} (at {at})", ""),
            EventKind::Header(header) => debug!("{:indent$}{} @{at}", "", header.name()),
            EventKind::Begin { header, remainder } => {
                debug!("{:indent$}{} {{ {} bytes", "", header.name(), remainder.left())
            }
            EventKind::Data { header, blob } => debug!(
                "{:indent$}{}: {} payload bytes @{}",
                "",
                header.name(),
                blob.size,
                blob.offset
            ),
            EventKind::End { header, remainder } => {
                debug!("{:indent$}}} {} ({} left)", "", header.name(), remainder.left())
            }
        }
    }
}

/// Decoding logic of one node type.
pub trait Parse<S: Stream, O: Observer> {
    /// Decodes the node at the parser's position, taking what it uses out of
    /// `remainder`. With `raise_eos` unset, running out of stream before
    /// the node starts is not an error for the caller.
    fn parse(
        &mut self,
        parser: &mut Parser<S, O>,
        remainder: &mut Remainder,
        raise_eos: bool,
    ) -> Result<()>;
}

/// Places `bytes` out of `limit`. The limit is only reduced once the
/// placement succeeded.
fn charge<T>(limit: &mut usize, bytes: usize, place: impl FnOnce() -> Result<T>) -> Result<T> {
    if bytes > *limit {
        return Err(Error::Overcommitment {
            requested: bytes as u64,
            left: *limit as u64,
        });
    }
    let placed = place()?;
    *limit -= bytes;
    Ok(placed)
}

/// Index of the first `byte` among the `items` bytes starting `offset` bits
/// past the next placement. Bytes are looked ahead one at a time, so the
/// scan stops at the match even when fewer than `items` bytes remain.
fn find_byte<S: Stream>(
    hs: &mut HeaderStream<S>,
    offset: usize,
    byte: u8,
    items: usize,
) -> Result<Option<usize>> {
    for i in 0..items {
        let at = offset + i * 8;
        let window = hs.peek(bytes_for(8, at))?;
        let found = if at % 8 == 0 {
            window[at / 8] == byte
        } else {
            be::U8.at(at).decode(window) == byte
        };
        if found {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Shapes placed out of a byte limit; dynamic shapes size themselves from
/// what is left of it.
pub trait Take {
    type Handle;

    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<Self::Handle>;
}

impl Take for Field {
    type Handle = FieldRef;

    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<FieldRef> {
        charge(limit, self.bytes_occupied(), || self.place(hs))
    }
}

impl Take for Footprint {
    type Handle = Region;

    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<Region> {
        charge(limit, self.bytes_occupied(), || self.place(hs))
    }
}

impl Take for Array {
    type Handle = ArrayRef;

    /// A dynamic array takes as many whole elements as fit.
    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<ArrayRef> {
        let element = self.element();
        let items = match self.count() {
            ArrayCount::Fixed(items) => items,
            // Saturating keeps `offset + items * width` within usize.
            ArrayCount::Dynamic => {
                limit.saturating_mul(8).saturating_sub(element.offset()) / element.width()
            }
        };
        charge(limit, self.bytes_for(items), || place_array(hs, self, items))
    }
}

impl Take for Text {
    type Handle = TextRef;

    /// A dynamic string takes the whole limit. A dynamic C string takes
    /// through its terminator, or the whole limit when there is none.
    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<TextRef> {
        let items = match self.count() {
            ArrayCount::Fixed(items) => items,
            ArrayCount::Dynamic => {
                let available = limit.saturating_sub(self.offset().div_ceil(8));
                if self.is_terminated() {
                    match find_byte(hs, self.offset(), 0, available)? {
                        Some(index) => index + 1,
                        None => available,
                    }
                } else {
                    available
                }
            }
        };
        charge(limit, self.bytes_for(items), || place_text(hs, self, items))
    }
}

impl Take for Shape {
    type Handle = Placed;

    fn take<S: Stream>(self, hs: &mut HeaderStream<S>, limit: &mut usize) -> Result<Placed> {
        Ok(match self {
            Shape::Field(field) => Placed::Field(field.take(hs, limit)?),
            Shape::Array(array) => Placed::Array(array.take(hs, limit)?),
            Shape::Text(text) => Placed::Text(text.take(hs, limit)?),
        })
    }
}

macro_rules! take_tuple {
    ($($member:ident),+) => {
        impl<$($member: Take),+> Take for ($($member,)+) {
            type Handle = ($($member::Handle,)+);

            #[allow(non_snake_case)]
            fn take<S: Stream>(
                self,
                hs: &mut HeaderStream<S>,
                limit: &mut usize,
            ) -> Result<Self::Handle> {
                let ($($member,)+) = self;
                Ok(($($member.take(hs, limit)?,)+))
            }
        }
    };
}

take_tuple!(A);
take_tuple!(A, B);
take_tuple!(A, B, C);
take_tuple!(A, B, C, D);
take_tuple!(A, B, C, D, E);
take_tuple!(A, B, C, D, E, F);
take_tuple!(A, B, C, D, E, F, G);
take_tuple!(A, B, C, D, E, F, G, H);

/// Turns an end of stream into `Ok(None)` unless `raise_eos` is set.
pub fn suppress_end_of_stream<T>(result: Result<T>, raise_eos: bool) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_end_of_stream() && !raise_eos => Ok(None),
        Err(error) => Err(error),
    }
}

pub struct Parser<S, O = ()> {
    composer: Composer<S>,
    observer: O,
    verification: Verification,
    depth: usize,
}

impl<S: Stream> Parser<S> {
    pub fn new(stream: S) -> Self {
        Parser::with_observer(stream, ())
    }
}

impl<S: Stream, O: Observer> Parser<S, O> {
    pub fn with_observer(stream: S, observer: O) -> Self {
        Parser {
            composer: Composer::new(stream),
            observer,
            verification: Verification::default(),
            depth: 0,
        }
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }

    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    pub fn verification_mut(&mut self) -> &mut Verification {
        &mut self.verification
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    pub fn composer(&self) -> &Composer<S> {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer<S> {
        &mut self.composer
    }

    pub fn stream(&self) -> &S {
        self.composer.stream()
    }

    /// Absolute offset of the next placement.
    pub fn offset(&self) -> u64 {
        self.composer.offset()
    }

    /// Boundaries currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get<P: Place>(&mut self, shape: P) -> Result<P::Handle> {
        self.composer.get(shape)
    }

    pub fn get_array(&mut self, array: Array, items: usize) -> Result<ArrayRef> {
        self.composer.get_array(array, items)
    }

    pub fn get_text(&mut self, text: Text, items: usize) -> Result<TextRef> {
        self.composer.get_text(text, items)
    }

    /// Places `shape` out of `limit` bytes, reducing it by what was placed.
    /// Asking for more than `limit` fails with [`Error::Overcommitment`].
    pub fn take<T: Take>(&mut self, limit: &mut usize, shape: T) -> Result<T::Handle> {
        shape.take(self.composer.header_stream_mut(), limit)
    }

    /// Index of the first `byte` among the next `limit` bytes; nothing is
    /// placed. Fails with end of stream when the stream runs out before a
    /// match or the limit.
    pub fn find_byte(&mut self, byte: u8, limit: usize) -> Result<Option<usize>> {
        find_byte(self.composer.header_stream_mut(), 0, byte, limit)
    }

    /// True when not a single byte is left at the next placement.
    pub fn at_end(&mut self) -> Result<bool> {
        match self.composer.header_stream_mut().peek(1) {
            Ok(_) => Ok(false),
            Err(error) if error.is_end_of_stream() => Ok(true),
            Err(error) => Err(error),
        }
    }

    /// Forgets every placement; see [`HeaderStream::reset`].
    pub fn reset(&mut self) {
        self.composer.reset();
    }

    /// Moves the stream past everything placed and resets.
    pub fn commit(&mut self) -> Blob {
        self.composer.commit()
    }

    fn offset_of(&self, ptr: Ptr) -> u64 {
        self.composer.header_stream().offset_of(ptr)
    }

    /// Writes `expected` into a constant field, or when verifying, compares
    /// and reports a mismatch.
    pub fn constant(&mut self, field: FieldRef, expected: impl Into<Value>) {
        let expected = expected.into();
        if !self.verification.is_verifying() {
            field.set(&mut self.composer, expected);
            return;
        }

        let actual = field.get(&self.composer);
        if actual != expected {
            let mismatch = Mismatch {
                offset: self.offset_of(field.ptr()),
                expected: vec![expected],
                actual: vec![actual],
            };
            self.verification.report(mismatch);
        }
    }

    pub fn constant_array<V: Into<Value> + Copy>(&mut self, array: ArrayRef, expected: &[V]) {
        if !self.verification.is_verifying() {
            array.assign(&mut self.composer, expected);
            return;
        }

        if !array.matches(&self.composer, expected) {
            let mismatch = Mismatch {
                offset: self.offset_of(array.ptr()),
                expected: expected.iter().map(|v| (*v).into()).collect(),
                actual: array.to_vec(&self.composer),
            };
            self.verification.report(mismatch);
        }
    }

    fn emit(&mut self, kind: EventKind<'_>) {
        let event = Event {
            kind,
            source: &self.composer,
            offset: self.composer.offset(),
            depth: self.depth,
        };
        self.observer.event(&event);
    }

    /// Reports a node whose header has been decoded.
    pub fn header(&mut self, header: &dyn Header) {
        self.emit(EventKind::Header(header));
    }

    pub fn exception(&mut self, error: &Error) {
        self.emit(EventKind::Exception(error));
    }

    /// Hands off `size` payload bytes of `header` right after the placed
    /// ones, then moves the stream past both.
    ///
    /// Handles placed before the call are invalid afterwards.
    pub fn payload(
        &mut self,
        header: &dyn Header,
        remainder: &mut Remainder,
        size: u64,
    ) -> Result<Blob> {
        remainder.reduce(size)?;
        let blob = self.composer.header_stream().peek_blob(size);
        self.emit(EventKind::Data { header, blob });
        self.composer.header_stream_mut().skip(size);
        Ok(blob)
    }

    /// Opens the nested content of `header`. The returned guard reports the
    /// end when dropped, however the content parse exits.
    pub fn boundary<'p, 'h>(
        &'p mut self,
        header: &'h dyn Header,
        remainder: Remainder,
    ) -> Boundary<'p, 'h, S, O> {
        self.emit(EventKind::Begin { header, remainder });
        self.depth += 1;
        Boundary {
            parser: self,
            header,
            remainder,
        }
    }

    /// Runs `f` on the nested content of `header` inside a [`Boundary`].
    pub fn scoped<T>(
        &mut self,
        header: &dyn Header,
        remainder: Remainder,
        f: impl FnOnce(&mut Self, &mut Remainder) -> Result<T>,
    ) -> Result<T> {
        let mut boundary = self.boundary(header, remainder);
        let (parser, remainder) = boundary.split();
        f(parser, remainder)
    }

    /// Runs `f`, reporting its error as an exception event before returning
    /// it.
    pub fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if let Err(error) = &result {
            self.exception(error);
        }
        result
    }

    /// Parses `node`. Returns `Ok(false)` when the stream ran out and
    /// `raise_eos` is unset; any other failure is reported as an exception
    /// event and returned.
    pub fn run<N: Parse<S, O> + ?Sized>(
        &mut self,
        node: &mut N,
        remainder: &mut Remainder,
        raise_eos: bool,
    ) -> Result<bool> {
        match node.parse(self, remainder, raise_eos) {
            Ok(()) => Ok(true),
            Err(error) if error.is_end_of_stream() && !raise_eos => {
                debug!("end of stream at {}", self.offset());
                Ok(false)
            }
            Err(error) => {
                self.exception(&error);
                Err(error)
            }
        }
    }
}

impl<S: Stream, O> Resolve for Parser<S, O> {
    fn resolve(&self, ptr: Ptr) -> &[u8] {
        self.composer.resolve(ptr)
    }
}

impl<S: Stream, O> ResolveMut for Parser<S, O> {
    fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8] {
        self.composer.resolve_mut(ptr)
    }
}

/// Open nested content of a node; emits the end event on drop.
pub struct Boundary<'p, 'h, S: Stream, O: Observer> {
    parser: &'p mut Parser<S, O>,
    header: &'h dyn Header,
    remainder: Remainder,
}

impl<S: Stream, O: Observer> Boundary<'_, '_, S, O> {
    pub fn remainder(&self) -> Remainder {
        self.remainder
    }

    pub fn remainder_mut(&mut self) -> &mut Remainder {
        &mut self.remainder
    }

    pub fn split(&mut self) -> (&mut Parser<S, O>, &mut Remainder) {
        (&mut *self.parser, &mut self.remainder)
    }
}

impl<S: Stream, O: Observer> Deref for Boundary<'_, '_, S, O> {
    type Target = Parser<S, O>;

    fn deref(&self) -> &Parser<S, O> {
        &*self.parser
    }
}

impl<S: Stream, O: Observer> DerefMut for Boundary<'_, '_, S, O> {
    fn deref_mut(&mut self) -> &mut Parser<S, O> {
        &mut *self.parser
    }
}

impl<S: Stream, O: Observer> Drop for Boundary<'_, '_, S, O> {
    fn drop(&mut self) {
        self.parser.depth -= 1;
        self.parser.emit(EventKind::End {
            header: self.header,
            remainder: self.remainder,
        });
    }
}
