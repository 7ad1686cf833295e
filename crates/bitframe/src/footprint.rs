//! Shape primitives shared by fields, arrays and texts.

/// Byte order of a field's bytes in the buffer.
///
/// For little-endian fields bit offsets count from the least significant bit
/// of the first byte; for big-endian fields from the most significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    Little,
    #[default]
    Big,
}

impl ByteOrder {
    /// Byte order of the machine the crate is compiled for.
    pub const NATIVE: ByteOrder = if cfg!(target_endian = "little") {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signedness {
    #[default]
    Unsigned,
    Signed,
}

impl Signedness {
    pub const fn is_signed(self) -> bool {
        matches!(self, Signedness::Signed)
    }
}

/// `width` bits starting `offset` bits past a buffer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footprint {
    width: usize,
    offset: usize,
}

impl Footprint {
    /// Panics on a zero width; in a `const` item that is a compile error.
    pub const fn new(width: usize, offset: usize) -> Self {
        assert!(width > 0, "zero-width footprints are not allowed");
        Footprint { width, offset }
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Whole bytes from the buffer position to the last bit, rounded up.
    pub const fn bytes_occupied(&self) -> usize {
        bytes_for(self.width, self.offset)
    }
}

/// Bytes covered by `bits` bits placed `offset` bits into a buffer.
pub const fn bytes_for(bits: usize, offset: usize) -> usize {
    (offset + bits).div_ceil(8)
}
