//! Bit codec: maps `(bit offset, width, byte order, signedness)` onto raw bytes.
//!
//! A field occupies `ceil((offset % 8 + width) / 8)` bytes starting at byte
//! `offset / 8`. Those bytes are loaded as one word in the field's byte order,
//! shifted by the order-dependent pad and masked to the width. When the lead
//! bits plus the width exceed 64 (only possible for wide fields at a non-zero
//! bit offset) the ninth byte is handled separately; it always holds the most
//! significant bits, which puts it after the word for little-endian fields and
//! before the word for big-endian fields.
//!
//! Writes merge the new bits with the untouched neighbours using a keep mask.
//!
//! Every function here panics when the width is outside `1..=64` or the span
//! does not fit in `data`; callers size buffers from the footprint.

use crate::{
    footprint::{ByteOrder, Signedness},
    value::Value,
};

/// Addressing of one field span, computed once per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// First byte touched by the field.
    pub byte: usize,
    /// Bits of the first byte before the field starts.
    pub lead: usize,
    pub width: usize,
    /// `lead + width`.
    pub extended_width: usize,
    /// Bits of the last byte after the field ends.
    pub trail: usize,
    /// Bytes touched, `ceil(extended_width / 8)`.
    pub bytes: usize,
    pub order: ByteOrder,
}

impl Layout {
    pub fn new(bit_offset: usize, width: usize, order: ByteOrder) -> Self {
        assert!(
            (1..=64).contains(&width),
            "field width of {width} bits is outside 1..=64"
        );

        let lead = bit_offset % 8;
        let extended_width = lead + width;

        Layout {
            byte: bit_offset / 8,
            lead,
            width,
            extended_width,
            trail: (8 - extended_width % 8) % 8,
            bytes: extended_width.div_ceil(8),
            order,
        }
    }

    /// Right shift bringing the field's low bit to bit 0 of the loaded word.
    pub const fn pad(&self) -> usize {
        match self.order {
            ByteOrder::Little => self.lead,
            ByteOrder::Big => self.trail,
        }
    }

    /// The span needs a ninth byte on top of a 64-bit word.
    pub const fn is_extended(&self) -> bool {
        self.extended_width > 64
    }

    /// Byte range of `data` the field touches.
    pub const fn span(&self) -> std::ops::Range<usize> {
        self.byte..self.byte + self.bytes
    }
}

/// Mask of the low `bits` bits.
pub const fn low_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Loads up to eight bytes as one word in `order`.
fn load(bytes: &[u8], order: ByteOrder) -> u64 {
    let mut word = [0u8; 8];
    match order {
        ByteOrder::Big => {
            word[8 - bytes.len()..].copy_from_slice(bytes);
            u64::from_be_bytes(word)
        }
        ByteOrder::Little => {
            word[..bytes.len()].copy_from_slice(bytes);
            u64::from_le_bytes(word)
        }
    }
}

/// Stores the low `bytes.len()` bytes of `word` in `order`.
fn store(bytes: &mut [u8], order: ByteOrder, word: u64) {
    let n = bytes.len();
    match order {
        ByteOrder::Big => bytes.copy_from_slice(&word.to_be_bytes()[8 - n..]),
        ByteOrder::Little => bytes.copy_from_slice(&word.to_le_bytes()[..n]),
    }
}

/// Reads `width` bits at `bit_offset` as an unsigned value.
pub fn read_bits(data: &[u8], bit_offset: usize, width: usize, order: ByteOrder) -> u64 {
    let layout = Layout::new(bit_offset, width, order);
    let span = &data[layout.span()];

    if !layout.is_extended() {
        return (load(span, order) >> layout.pad()) & low_mask(width);
    }

    match order {
        ByteOrder::Little => {
            let word = load(&span[..8], order) >> layout.lead;
            let high = span[8] as u64 & low_mask(layout.extended_width - 64);
            word | high << (64 - layout.lead)
        }
        ByteOrder::Big => {
            let word = load(&span[1..], order) >> layout.trail;
            let high = span[0] as u64 & low_mask(8 - layout.lead);
            word | high << (64 - layout.trail)
        }
    }
}

/// Writes the low `width` bits of `value` at `bit_offset`, leaving every
/// other bit of `data` as it was.
pub fn write_bits(data: &mut [u8], bit_offset: usize, width: usize, order: ByteOrder, value: u64) {
    let layout = Layout::new(bit_offset, width, order);
    let span = &mut data[layout.span()];
    let value = value & low_mask(width);

    if !layout.is_extended() {
        let pad = layout.pad();
        let keep = !(low_mask(width) << pad) & low_mask(8 * layout.bytes);
        let word = (load(span, order) & keep) | value << pad;
        store(span, order, word);
        return;
    }

    match order {
        ByteOrder::Little => {
            let high_bits = layout.extended_width - 64;
            let word = (load(&span[..8], order) & low_mask(layout.lead)) | value << layout.lead;
            store(&mut span[..8], order, word);

            let keep = !(low_mask(high_bits) as u8);
            let high = (value >> (64 - layout.lead)) as u8 & !keep;
            span[8] = (span[8] & keep) | high;
        }
        ByteOrder::Big => {
            let high_bits = 8 - layout.lead;
            let word = (load(&span[1..], order) & low_mask(layout.trail)) | value << layout.trail;
            store(&mut span[1..], order, word);

            let keep = !(low_mask(high_bits) as u8);
            let high = (value >> (64 - layout.trail)) as u8 & !keep;
            span[0] = (span[0] & keep) | high;
        }
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Decodes a field, sign-extending from its own width when signed.
pub fn decode(
    data: &[u8],
    bit_offset: usize,
    width: usize,
    order: ByteOrder,
    signedness: Signedness,
) -> Value {
    let raw = read_bits(data, bit_offset, width, order);
    match signedness {
        Signedness::Unsigned => Value::U64(raw),
        Signedness::Signed => Value::I64(sign_extend(raw, width)),
    }
}

/// Encodes `value` into a field; bits above the width are dropped.
pub fn encode(data: &mut [u8], bit_offset: usize, width: usize, order: ByteOrder, value: Value) {
    write_bits(data, bit_offset, width, order, value.as_u64());
}
