//! Field shapes and the handles a placement hands back.
//!
//! A shape ([`Field`], [`Array`], [`Text`]) describes bits relative to some
//! buffer position and owns no data. Placing a shape through a
//! [`Composer`](crate::composer::Composer) binds it to a [`Ptr`] and yields a
//! handle ([`FieldRef`], [`ArrayRef`], [`TextRef`], [`Region`]). Handles read
//! and write through anything that can [`Resolve`] a pointer, typically the
//! parser or composer that produced them.
//!
//! Handles compare nothing themselves: equality, ordering and arithmetic live
//! on the decoded [`Value`].

use std::borrow::Cow;

use crate::{
    bits,
    errors::{Error, Result},
    footprint::{ByteOrder, Footprint, Signedness, bytes_for},
    header_stream::{Ptr, Resolve, ResolveMut},
    value::Value,
};

/// A bit-packed integer: a footprint plus byte order and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    footprint: Footprint,
    order: ByteOrder,
    signedness: Signedness,
}

impl Field {
    /// Panics unless `width` is in `1..=64`; in a `const` item that is a
    /// compile error.
    pub const fn new(width: usize, order: ByteOrder, signedness: Signedness) -> Self {
        assert!(width >= 1 && width <= 64, "field width must be within 1..=64 bits");
        Field {
            footprint: Footprint::new(width, 0),
            order,
            signedness,
        }
    }

    /// Run-time counterpart of [`Field::new`] for widths read from data.
    pub fn try_new(width: usize, order: ByteOrder, signedness: Signedness) -> Result<Self> {
        if !(1..=64).contains(&width) {
            return Err(Error::InvalidWidth(width));
        }
        Ok(Self::new(width, order, signedness))
    }

    /// Same field starting `offset` bits past the buffer position.
    pub const fn at(self, offset: usize) -> Self {
        Field {
            footprint: Footprint::new(self.footprint.width(), offset),
            ..self
        }
    }

    pub const fn width(&self) -> usize {
        self.footprint.width()
    }

    pub const fn offset(&self) -> usize {
        self.footprint.offset()
    }

    pub const fn footprint(&self) -> Footprint {
        self.footprint
    }

    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    pub const fn signedness(&self) -> Signedness {
        self.signedness
    }

    pub const fn bytes_occupied(&self) -> usize {
        self.footprint.bytes_occupied()
    }

    /// Decodes the field from `bytes`, which start at the buffer position.
    pub fn decode(&self, bytes: &[u8]) -> Value {
        bits::decode(bytes, self.offset(), self.width(), self.order, self.signedness)
    }

    pub fn encode(&self, bytes: &mut [u8], value: impl Into<Value>) {
        bits::encode(bytes, self.offset(), self.width(), self.order, value.into());
    }

    /// Element `index` of an array of this field laid out at stride `width`.
    const fn element(self, index: usize) -> Field {
        self.at(self.offset() + index * self.width())
    }
}

/// Field constructors for big-endian data.
pub mod be {
    use super::Field;
    use crate::footprint::{ByteOrder, Signedness};

    pub const U8: Field = uint(8);
    pub const U16: Field = uint(16);
    pub const U24: Field = uint(24);
    pub const U32: Field = uint(32);
    pub const U64: Field = uint(64);
    pub const I8: Field = int(8);
    pub const I16: Field = int(16);
    pub const I32: Field = int(32);
    pub const I64: Field = int(64);

    pub const fn uint(width: usize) -> Field {
        Field::new(width, ByteOrder::Big, Signedness::Unsigned)
    }

    pub const fn int(width: usize) -> Field {
        Field::new(width, ByteOrder::Big, Signedness::Signed)
    }
}

/// Field constructors for little-endian data.
pub mod le {
    use super::Field;
    use crate::footprint::{ByteOrder, Signedness};

    pub const U8: Field = uint(8);
    pub const U16: Field = uint(16);
    pub const U24: Field = uint(24);
    pub const U32: Field = uint(32);
    pub const U64: Field = uint(64);
    pub const I8: Field = int(8);
    pub const I16: Field = int(16);
    pub const I32: Field = int(32);
    pub const I64: Field = int(64);

    pub const fn uint(width: usize) -> Field {
        Field::new(width, ByteOrder::Little, Signedness::Unsigned)
    }

    pub const fn int(width: usize) -> Field {
        Field::new(width, ByteOrder::Little, Signedness::Signed)
    }
}

/// Element count of an array or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayCount {
    /// Known when the layout is declared.
    Fixed(usize),
    /// Supplied at placement, usually from a preceding length field.
    Dynamic,
}

/// Repetition of one field at a stride equal to its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Array {
    element: Field,
    count: ArrayCount,
}

impl Array {
    /// `items` elements starting at the element's offset.
    pub const fn new(element: Field, items: usize) -> Self {
        Array {
            element,
            count: ArrayCount::Fixed(items),
        }
    }

    pub const fn dynamic(element: Field) -> Self {
        Array {
            element,
            count: ArrayCount::Dynamic,
        }
    }

    pub const fn at(self, offset: usize) -> Self {
        Array {
            element: self.element.at(offset),
            ..self
        }
    }

    pub const fn element(&self) -> Field {
        self.element
    }

    pub const fn count(&self) -> ArrayCount {
        self.count
    }

    pub const fn is_dynamic(&self) -> bool {
        matches!(self.count, ArrayCount::Dynamic)
    }

    /// Bytes spanned by `items` elements.
    pub const fn bytes_for(&self, items: usize) -> usize {
        bytes_for(items * self.element.width(), self.element.offset())
    }
}

/// A byte array with text semantics.
///
/// A terminated text (a C string) ends in `0x00`: assignment writes it and
/// [`TextRef::text`] stops at the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Text {
    offset: usize,
    count: ArrayCount,
    terminated: bool,
}

impl Text {
    pub const fn string(len: usize) -> Self {
        Text {
            offset: 0,
            count: ArrayCount::Fixed(len),
            terminated: false,
        }
    }

    pub const fn dynamic_string() -> Self {
        Text {
            offset: 0,
            count: ArrayCount::Dynamic,
            terminated: false,
        }
    }

    /// `len` includes the terminator.
    pub const fn cstring(len: usize) -> Self {
        Text {
            offset: 0,
            count: ArrayCount::Fixed(len),
            terminated: true,
        }
    }

    pub const fn dynamic_cstring() -> Self {
        Text {
            offset: 0,
            count: ArrayCount::Dynamic,
            terminated: true,
        }
    }

    pub const fn at(self, offset: usize) -> Self {
        Text { offset, ..self }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn count(&self) -> ArrayCount {
        self.count
    }

    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub const fn is_dynamic(&self) -> bool {
        matches!(self.count, ArrayCount::Dynamic)
    }

    /// The same bits seen as an array of unsigned bytes.
    pub const fn as_array(&self) -> Array {
        Array {
            element: be::U8.at(self.offset),
            count: self.count,
        }
    }

    pub const fn bytes_for(&self, items: usize) -> usize {
        items + self.offset.div_ceil(8)
    }
}

/// Any shape, for layouts assembled at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Field(Field),
    Array(Array),
    Text(Text),
}

impl From<Field> for Shape {
    fn from(field: Field) -> Self {
        Shape::Field(field)
    }
}

impl From<Array> for Shape {
    fn from(array: Array) -> Self {
        Shape::Array(array)
    }
}

impl From<Text> for Shape {
    fn from(text: Text) -> Self {
        Shape::Text(text)
    }
}

/// Named shapes placed one after another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub entries: Vec<(String, Shape)>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.entries.push((name.into(), shape.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Shape)> {
        self.entries.iter().map(|(name, shape)| (name.as_str(), shape))
    }
}

/// A placed [`Field`].
#[derive(Debug, Clone, Copy)]
pub struct FieldRef {
    ptr: Ptr,
    field: Field,
}

impl FieldRef {
    pub(crate) fn new(ptr: Ptr, field: Field) -> Self {
        FieldRef { ptr, field }
    }

    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn get<R: Resolve + ?Sized>(&self, source: &R) -> Value {
        self.field.decode(source.resolve(self.ptr))
    }

    pub fn set<R: ResolveMut + ?Sized>(&self, target: &mut R, value: impl Into<Value>) {
        self.field.encode(target.resolve_mut(self.ptr), value);
    }

    /// Read-modify-write, e.g. `f.modify(&mut p, |v| v + 1u8)`.
    pub fn modify<R: ResolveMut + ?Sized>(&self, target: &mut R, f: impl FnOnce(Value) -> Value) {
        let bytes = target.resolve_mut(self.ptr);
        let value = f(self.field.decode(bytes));
        self.field.encode(bytes, value);
    }
}

/// A placed [`Array`] with its element count settled.
#[derive(Debug, Clone, Copy)]
pub struct ArrayRef {
    ptr: Ptr,
    element: Field,
    items: usize,
}

impl ArrayRef {
    pub(crate) fn new(ptr: Ptr, element: Field, items: usize) -> Self {
        ArrayRef {
            ptr,
            element,
            items,
        }
    }

    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn element(&self) -> Field {
        self.element
    }

    /// Bytes spanned from the buffer position through the last element.
    pub fn bytes_occupied(&self) -> usize {
        bytes_for(self.items * self.element.width(), self.element.offset())
    }

    fn element_at(&self, index: usize) -> Field {
        assert!(
            index < self.items,
            "index {index} out of bounds for array of {} items",
            self.items
        );
        self.element.element(index)
    }

    pub fn get<R: Resolve + ?Sized>(&self, source: &R, index: usize) -> Value {
        self.element_at(index).decode(source.resolve(self.ptr))
    }

    pub fn set<R: ResolveMut + ?Sized>(&self, target: &mut R, index: usize, value: impl Into<Value>) {
        self.element_at(index).encode(target.resolve_mut(self.ptr), value);
    }

    pub fn to_vec<R: Resolve + ?Sized>(&self, source: &R) -> Vec<Value> {
        let bytes = source.resolve(self.ptr);
        (0..self.items)
            .map(|i| self.element.element(i).decode(bytes))
            .collect()
    }

    /// Writes every element; `values` must be exactly as long as the array.
    pub fn assign<R, V>(&self, target: &mut R, values: &[V])
    where
        R: ResolveMut + ?Sized,
        V: Into<Value> + Copy,
    {
        assert_eq!(values.len(), self.items, "array length mismatch");
        let bytes = target.resolve_mut(self.ptr);
        for (i, value) in values.iter().enumerate() {
            self.element.element(i).encode(bytes, *value);
        }
    }

    /// True when the array holds exactly `values`.
    pub fn matches<R, V>(&self, source: &R, values: &[V]) -> bool
    where
        R: Resolve + ?Sized,
        V: Into<Value> + Copy,
    {
        if values.len() != self.items {
            return false;
        }
        let bytes = source.resolve(self.ptr);
        values
            .iter()
            .enumerate()
            .all(|(i, value)| self.element.element(i).decode(bytes) == (*value).into())
    }
}

/// A placed [`Text`].
#[derive(Debug, Clone, Copy)]
pub struct TextRef {
    ptr: Ptr,
    offset: usize,
    items: usize,
    terminated: bool,
}

impl TextRef {
    pub(crate) fn new(ptr: Ptr, text: Text, items: usize) -> Self {
        TextRef {
            ptr,
            offset: text.offset(),
            items,
            terminated: text.is_terminated(),
        }
    }

    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn bytes_occupied(&self) -> usize {
        bytes_for(self.items * 8, self.offset)
    }

    /// Raw bytes including any terminator; borrowed when byte-aligned.
    pub fn bytes<'a, R: Resolve + ?Sized>(&self, source: &'a R) -> Cow<'a, [u8]> {
        let bytes = source.resolve(self.ptr);
        if self.offset % 8 == 0 {
            let start = self.offset / 8;
            return Cow::Borrowed(&bytes[start..start + self.items]);
        }
        let byte = be::U8.at(self.offset);
        Cow::Owned(
            (0..self.items)
                .map(|i| byte.element(i).decode(bytes).as_u64() as u8)
                .collect(),
        )
    }

    /// Text content; a terminated text stops at its first `0x00`.
    pub fn text<R: Resolve + ?Sized>(&self, source: &R) -> String {
        let bytes = self.bytes(source);
        let content = if self.terminated {
            bytes.split(|b| *b == 0).next().unwrap_or_default()
        } else {
            &bytes[..]
        };
        String::from_utf8_lossy(content).into_owned()
    }

    /// Writes `text`, plus the terminator for a C string. The placed length
    /// must match exactly.
    pub fn assign<R: ResolveMut + ?Sized>(&self, target: &mut R, text: &str) {
        let expected = text.len() + usize::from(self.terminated);
        assert_eq!(
            expected, self.items,
            "text of {} bytes does not fit a placement of {} items",
            text.len(),
            self.items
        );

        let bytes = target.resolve_mut(self.ptr);
        let byte = be::U8.at(self.offset);
        let terminator = self.terminated.then_some(0u8);
        for (i, b) in text.bytes().chain(terminator).enumerate() {
            byte.element(i).encode(bytes, b);
        }
    }
}

/// Raw bits placed from a bare [`Footprint`], for overlaying sub-byte
/// fields on a header that is loaded as one unit.
///
/// Overlay offsets are relative to the first bit of the footprint.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    ptr: Ptr,
    footprint: Footprint,
}

impl Region {
    pub(crate) fn new(ptr: Ptr, footprint: Footprint) -> Self {
        Region { ptr, footprint }
    }

    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    fn check(&self, offset: usize, width: usize) {
        assert!(
            offset + width <= self.footprint.width(),
            "overlay of {width} bits at {offset} exceeds region of {} bits",
            self.footprint.width()
        );
    }

    pub fn field(&self, field: Field) -> FieldRef {
        self.check(field.offset(), field.width());
        FieldRef::new(self.ptr, field.at(self.footprint.offset() + field.offset()))
    }

    pub fn array(&self, array: Array, items: usize) -> ArrayRef {
        let element = array.element();
        self.check(element.offset(), items * element.width());
        ArrayRef::new(self.ptr, element.at(self.footprint.offset() + element.offset()), items)
    }

    pub fn bytes<'a, R: Resolve + ?Sized>(&self, source: &'a R) -> &'a [u8] {
        &source.resolve(self.ptr)[..self.footprint.bytes_occupied()]
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::ByteOrderDef> for ByteOrder {
    fn from(value: crate::serde::ByteOrderDef) -> Self {
        match value {
            crate::serde::ByteOrderDef::Big => ByteOrder::Big,
            crate::serde::ByteOrderDef::Little => ByteOrder::Little,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::FieldDef> for Field {
    type Error = Error;

    fn try_from(value: crate::serde::FieldDef) -> Result<Self> {
        let signedness = if value.signed {
            Signedness::Signed
        } else {
            Signedness::Unsigned
        };
        Ok(Field::try_new(value.width, value.order.into(), signedness)?.at(value.offset))
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::ArrayDef> for Array {
    type Error = Error;

    fn try_from(value: crate::serde::ArrayDef) -> Result<Self> {
        let element = Field::try_from(value.element)?;
        Ok(match value.count {
            Some(items) => Array::new(element, items),
            None => Array::dynamic(element),
        })
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::TextDef> for Text {
    fn from(value: crate::serde::TextDef) -> Self {
        let text = match (value.length, value.terminated) {
            (Some(len), false) => Text::string(len),
            (Some(len), true) => Text::cstring(len),
            (None, false) => Text::dynamic_string(),
            (None, true) => Text::dynamic_cstring(),
        };
        text.at(value.offset)
    }
}

#[cfg(feature = "serde")]
impl TryFrom<crate::serde::LayoutDef> for Layout {
    type Error = Error;

    fn try_from(value: crate::serde::LayoutDef) -> Result<Self> {
        use crate::serde::ItemDef;

        let mut layout = Layout::new();
        for item in value.items {
            layout = match item {
                ItemDef::Field { name, field } => layout.with(name, Field::try_from(field)?),
                ItemDef::Array { name, array } => layout.with(name, Array::try_from(array)?),
                ItemDef::Text { name, text } => layout.with(name, Text::from(text)),
            };
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header_stream::testing::Slice;

    #[test]
    fn test_try_new_rejects_widths() {
        assert!(matches!(
            Field::try_new(0, ByteOrder::Big, Signedness::Unsigned),
            Err(Error::InvalidWidth(0))
        ));
        assert!(matches!(
            Field::try_new(65, ByteOrder::Big, Signedness::Signed),
            Err(Error::InvalidWidth(65))
        ));
        assert_eq!(Field::try_new(12, ByteOrder::Little, Signedness::Unsigned).unwrap(), le::uint(12));
    }

    #[test]
    fn test_field_shape() {
        let field = be::uint(3).at(6);
        assert_eq!(field.width(), 3);
        assert_eq!(field.offset(), 6);
        assert_eq!(field.bytes_occupied(), 2);
        assert_eq!(le::I16.signedness(), Signedness::Signed);
        assert_eq!(le::I16.order(), ByteOrder::Little);
    }

    #[test]
    fn test_field_ref_round_trip() {
        let mut slice = Slice::new(vec![0u8; 4]);
        let f = FieldRef::new(slice.ptr(0), be::int(12).at(4));
        f.set(&mut slice, -100i32);
        assert_eq!(f.get(&slice), -100i32);
        assert_eq!(slice.bytes()[0] & 0xF0, 0);

        f.modify(&mut slice, |v| v + 1u8);
        assert_eq!(f.get(&slice), -99i32);
    }

    #[test]
    fn test_handles_compare_through_values() {
        let mut slice = Slice::new(vec![0x00, 0x2A, 0x2A]);
        let wide = FieldRef::new(slice.ptr(0), be::U16);
        let narrow = FieldRef::new(slice.ptr(2), be::U8);
        assert_eq!(wide.get(&slice), narrow.get(&slice));
        assert!(le::U16.decode(slice.bytes()) > narrow.get(&slice));
    }

    #[test]
    fn test_array_ref() {
        let mut slice = Slice::new(vec![0u8; 4]);
        let array = ArrayRef::new(slice.ptr(0), be::uint(4), 8);
        array.assign(&mut slice, &[1u8, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(slice.bytes(), &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(array.get(&slice, 5), 6u8);
        assert!(array.matches(&slice, &[1u8, 2, 3, 4, 5, 6, 7, 8]));
        assert!(!array.matches(&slice, &[1u8, 2, 3]));

        array.set(&mut slice, 0, 0xFu8);
        assert_eq!(array.to_vec(&slice)[0], 15u8);
        assert_eq!(array.bytes_occupied(), 4);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_array_index_checked() {
        let mut slice = Slice::new(vec![0u8; 4]);
        ArrayRef::new(slice.ptr(0), be::U8, 4).get(&slice, 4);
    }

    #[test]
    fn test_cstring_assign_writes_terminator() {
        let mut slice = Slice::new(vec![0xFFu8; 3]);
        let text = TextRef::new(slice.ptr(0), Text::cstring(3), 3);
        text.assign(&mut slice, "ab");
        assert_eq!(slice.bytes(), b"ab\0");
        assert_eq!(text.text(&slice), "ab");
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_cstring_assign_checks_length() {
        let mut slice = Slice::new(vec![0u8; 2]);
        TextRef::new(slice.ptr(0), Text::cstring(2), 2).assign(&mut slice, "ab");
    }

    #[test]
    fn test_text_stops_at_terminator() {
        let mut slice = Slice::new(b"ab\0xx".to_vec());
        let cstring = TextRef::new(slice.ptr(0), Text::cstring(5), 5);
        assert_eq!(cstring.text(&slice), "ab");
        assert_eq!(&cstring.bytes(&slice)[..], b"ab\0xx");

        let string = TextRef::new(slice.ptr(0), Text::string(5), 5);
        assert_eq!(string.text(&slice), "ab\0xx");
    }

    #[test]
    fn test_unaligned_text() {
        let mut slice = Slice::new(vec![0u8; 3]);
        let text = TextRef::new(slice.ptr(0), Text::string(2).at(4), 2);
        text.assign(&mut slice, "hi");
        assert_eq!(slice.bytes(), &[0x06, 0x86, 0x90]);
        assert_eq!(text.text(&slice), "hi");
        assert!(matches!(text.bytes(&slice), Cow::Owned(_)));
    }

    #[test]
    fn test_region_overlay() {
        let mut slice = Slice::new(vec![0b1010_0110, 0xFF]);
        let region = Region::new(slice.ptr(0), Footprint::new(16, 0));
        let version = region.field(be::uint(3));
        let flags = region.field(be::uint(5).at(3));
        let tail = region.array(Array::new(be::uint(4), 2).at(8), 2);

        assert_eq!(version.get(&slice), 0b101u8);
        assert_eq!(flags.get(&slice), 0b00110u8);
        assert_eq!(tail.to_vec(&slice), vec![Value::U64(15), Value::U64(15)]);

        flags.set(&mut slice, 0x1Fu8);
        assert_eq!(region.bytes(&slice), &[0b1011_1111, 0xFF]);
    }

    #[test]
    #[should_panic(expected = "exceeds region")]
    fn test_region_overlay_bounds() {
        let mut slice = Slice::new(vec![0u8; 2]);
        Region::new(slice.ptr(0), Footprint::new(8, 0)).field(be::U16);
    }

    #[test]
    fn test_shape_byte_counts() {
        assert_eq!(Array::new(be::uint(3), 5).bytes_for(5), 2);
        assert_eq!(Array::dynamic(be::U16).at(8).bytes_for(3), 7);
        assert_eq!(Text::cstring(4).bytes_for(4), 4);
        assert_eq!(Text::dynamic_string().as_array().element(), be::U8);
    }

    #[test]
    fn test_layout_builder() {
        let layout = Layout::new().with("size", be::U32).with("kind", Text::string(4));
        let names: Vec<_> = layout.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["size", "kind"]);
    }
}
