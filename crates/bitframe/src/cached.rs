//! A field handle that remembers its decoded value.

use crate::{
    field::FieldRef,
    header_stream::{Resolve, ResolveMut},
    value::Value,
};

/// Snapshot of a placed field.
///
/// [`Cached::value`] needs no buffer and stays usable after the header
/// stream is reset, when the handle itself no longer is.
#[derive(Debug, Clone, Copy)]
pub struct Cached {
    field: FieldRef,
    value: Value,
}

impl Cached {
    pub fn new<R: Resolve + ?Sized>(field: FieldRef, source: &R) -> Self {
        Cached {
            field,
            value: field.get(source),
        }
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn field(&self) -> FieldRef {
        self.field
    }

    /// Re-reads the buffer.
    pub fn update<R: Resolve + ?Sized>(&mut self, source: &R) -> Value {
        self.value = self.field.get(source);
        self.value
    }

    /// Writes through to the buffer and keeps the value.
    pub fn set<R: ResolveMut + ?Sized>(&mut self, target: &mut R, value: impl Into<Value>) {
        self.field.set(target, value);
        self.value = self.field.get(&*target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::be, header_stream::testing::Slice};

    #[test]
    fn test_snapshot_and_update() {
        let mut slice = Slice::new(vec![0x12, 0x34]);
        let field = FieldRef::new(slice.ptr(0), be::U16);
        let mut cached = Cached::new(field, &slice);
        assert_eq!(cached.value(), 0x1234u16);

        field.set(&mut slice, 0x5678u16);
        assert_eq!(cached.value(), 0x1234u16);
        assert_eq!(cached.update(&slice), 0x5678u16);
    }

    #[test]
    fn test_set_truncates_to_width() {
        let mut slice = Slice::new(vec![0]);
        let mut cached = Cached::new(FieldRef::new(slice.ptr(0), be::uint(3).at(5)), &slice);
        cached.set(&mut slice, 0b1111u8);
        assert_eq!(cached.value(), 0b111u8);
        assert_eq!(slice.bytes(), &[0b0000_0111]);
    }
}
