//! Placing shapes at the current stream position.
//!
//! Every placement takes the bytes its footprint occupies,
//! `ceil((offset + width) / 8)`, right after the previous one. Tuples of
//! shapes place their members in order, which is how a fixed header is laid
//! out in one call:
//!
//! ```
//! use bitframe::{composer::Composer, field::{be, Text}, stream::MemoryStream};
//!
//! let mut composer = Composer::new(MemoryStream::new(b"\0\0\0\x10ftyp".to_vec()));
//! let (size, kind) = composer.get((be::U32, Text::string(4))).unwrap();
//! assert_eq!(size.get(&composer), 16u8);
//! assert_eq!(kind.text(&composer), "ftyp");
//! ```

use crate::{
    errors::Result,
    field::{Array, ArrayCount, ArrayRef, Field, FieldRef, Region, Shape, Text, TextRef},
    footprint::Footprint,
    header_stream::{HeaderStream, Ptr, Resolve, ResolveMut},
    stream::{Blob, Stream},
    value::Value,
};

/// Shapes whose size is known without looking at the data.
pub trait Place {
    type Handle;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<Self::Handle>;
}

impl Place for Field {
    type Handle = FieldRef;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<FieldRef> {
        Ok(FieldRef::new(hs.place(self.bytes_occupied())?, self))
    }
}

impl Place for Footprint {
    type Handle = Region;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<Region> {
        Ok(Region::new(hs.place(self.bytes_occupied())?, self))
    }
}

fn fixed(count: ArrayCount, what: &str) -> usize {
    match count {
        ArrayCount::Fixed(items) => items,
        ArrayCount::Dynamic => panic!("dynamic {what} needs an element count to be placed"),
    }
}

pub(crate) fn place_array<S: Stream>(
    hs: &mut HeaderStream<S>,
    array: Array,
    items: usize,
) -> Result<ArrayRef> {
    let ptr = hs.place(array.bytes_for(items))?;
    Ok(ArrayRef::new(ptr, array.element(), items))
}

pub(crate) fn place_text<S: Stream>(
    hs: &mut HeaderStream<S>,
    text: Text,
    items: usize,
) -> Result<TextRef> {
    let ptr = hs.place(text.bytes_for(items))?;
    Ok(TextRef::new(ptr, text, items))
}

impl Place for Array {
    type Handle = ArrayRef;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<ArrayRef> {
        place_array(hs, self, fixed(self.count(), "array"))
    }
}

impl Place for Text {
    type Handle = TextRef;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<TextRef> {
        place_text(hs, self, fixed(self.count(), "text"))
    }
}

/// Handle of a placed [`Shape`].
#[derive(Debug, Clone, Copy)]
pub enum Placed {
    Field(FieldRef),
    Array(ArrayRef),
    Text(TextRef),
}

impl Placed {
    pub fn ptr(&self) -> Ptr {
        match self {
            Placed::Field(field) => field.ptr(),
            Placed::Array(array) => array.ptr(),
            Placed::Text(text) => text.ptr(),
        }
    }

    pub fn as_field(&self) -> Option<FieldRef> {
        match self {
            Placed::Field(field) => Some(*field),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Placed::Array(array) => Some(*array),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<TextRef> {
        match self {
            Placed::Text(text) => Some(*text),
            _ => None,
        }
    }
}

impl Place for Shape {
    type Handle = Placed;

    fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<Placed> {
        Ok(match self {
            Shape::Field(field) => Placed::Field(field.place(hs)?),
            Shape::Array(array) => Placed::Array(array.place(hs)?),
            Shape::Text(text) => Placed::Text(text.place(hs)?),
        })
    }
}

macro_rules! place_tuple {
    ($($member:ident),+) => {
        impl<$($member: Place),+> Place for ($($member,)+) {
            type Handle = ($($member::Handle,)+);

            #[allow(non_snake_case)]
            fn place<S: Stream>(self, hs: &mut HeaderStream<S>) -> Result<Self::Handle> {
                let ($($member,)+) = self;
                Ok(($($member.place(hs)?,)+))
            }
        }
    };
}

place_tuple!(A);
place_tuple!(A, B);
place_tuple!(A, B, C);
place_tuple!(A, B, C, D);
place_tuple!(A, B, C, D, E);
place_tuple!(A, B, C, D, E, F);
place_tuple!(A, B, C, D, E, F, G);
place_tuple!(A, B, C, D, E, F, G, H);

/// Places shapes over a header stream, for reading and for composing.
#[derive(Debug)]
pub struct Composer<S> {
    hs: HeaderStream<S>,
}

impl<S: Stream> Composer<S> {
    pub fn new(stream: S) -> Self {
        Composer {
            hs: HeaderStream::new(stream),
        }
    }

    pub fn header_stream(&self) -> &HeaderStream<S> {
        &self.hs
    }

    pub fn header_stream_mut(&mut self) -> &mut HeaderStream<S> {
        &mut self.hs
    }

    pub fn stream(&self) -> &S {
        self.hs.stream()
    }

    pub fn into_inner(self) -> S {
        self.hs.into_inner()
    }

    /// Absolute offset of the next placement.
    pub fn offset(&self) -> u64 {
        self.hs.offset()
    }

    pub fn get<P: Place>(&mut self, shape: P) -> Result<P::Handle> {
        shape.place(&mut self.hs)
    }

    /// Places `items` elements. A fixed-size array must be given its own
    /// count.
    pub fn get_array(&mut self, array: Array, items: usize) -> Result<ArrayRef> {
        if let ArrayCount::Fixed(count) = array.count() {
            assert_eq!(count, items, "fixed array placed with a different count");
        }
        place_array(&mut self.hs, array, items)
    }

    /// Places `items` bytes of text, terminator included.
    pub fn get_text(&mut self, text: Text, items: usize) -> Result<TextRef> {
        if let ArrayCount::Fixed(count) = text.count() {
            assert_eq!(count, items, "fixed text placed with a different length");
        }
        place_text(&mut self.hs, text, items)
    }

    pub fn put_field(&mut self, field: Field, value: impl Into<Value>) -> Result<FieldRef> {
        let placed = self.get(field)?;
        placed.set(self, value);
        Ok(placed)
    }

    /// Fields with their initial values, placed in order.
    pub fn put_fields(&mut self, fields: &[(Field, Value)]) -> Result<Vec<FieldRef>> {
        fields
            .iter()
            .map(|(field, value)| self.put_field(*field, *value))
            .collect()
    }

    pub fn put_array<V: Into<Value> + Copy>(
        &mut self,
        array: Array,
        values: &[V],
    ) -> Result<ArrayRef> {
        let placed = self.get_array(array, values.len())?;
        placed.assign(self, values);
        Ok(placed)
    }

    /// Places a text sized for `value`, plus one byte for a terminator.
    pub fn put_text(&mut self, text: Text, value: &str) -> Result<TextRef> {
        let items = value.len() + usize::from(text.is_terminated());
        let placed = self.get_text(text, items)?;
        placed.assign(self, value);
        Ok(placed)
    }

    pub fn reset(&mut self) {
        self.hs.reset();
    }

    /// Moves the stream past everything placed and resets.
    pub fn commit(&mut self) -> Blob {
        self.hs.commit()
    }
}

impl<S: Stream> Resolve for Composer<S> {
    fn resolve(&self, ptr: Ptr) -> &[u8] {
        self.hs.resolve(ptr)
    }
}

impl<S: Stream> ResolveMut for Composer<S> {
    fn resolve_mut(&mut self, ptr: Ptr) -> &mut [u8] {
        self.hs.resolve_mut(ptr)
    }
}
