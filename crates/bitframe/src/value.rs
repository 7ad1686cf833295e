//! Decoded integral values.
//!
//! A [`Value`] is what a field decodes to. Comparison and arithmetic go
//! through the numeric value, so `U64(5) == I64(5)` and `I64(-1) < U64(0)`.

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, BitAnd, BitOr, BitXor, Mul, Not, Shl, Shr, Sub},
};

#[derive(Debug, Clone, Copy)]
pub enum Value {
    U64(u64),
    I64(i64),
}

impl Value {
    /// Two's complement bits of the value.
    pub const fn as_u64(self) -> u64 {
        match self {
            Value::U64(v) => v,
            Value::I64(v) => v as u64,
        }
    }

    pub const fn as_i64(self) -> i64 {
        match self {
            Value::U64(v) => v as i64,
            Value::I64(v) => v,
        }
    }

    pub const fn to_i128(self) -> i128 {
        match self {
            Value::U64(v) => v as i128,
            Value::I64(v) => v as i128,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Value::I64(_))
    }

    /// Same variant as `self`, holding `bits`.
    fn rewrap(self, bits: u64) -> Value {
        match self {
            Value::U64(_) => Value::U64(bits),
            Value::I64(_) => Value::I64(bits as i64),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::U64(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U64(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.to_i128() == other.to_i128()
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_i128().cmp(&other.to_i128())
    }
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::U64(v as u64)
            }
        }

        impl PartialEq<$t> for Value {
            fn eq(&self, other: &$t) -> bool {
                self.to_i128() == *other as i128
            }
        }

        impl PartialOrd<$t> for Value {
            fn partial_cmp(&self, other: &$t) -> Option<Ordering> {
                Some(self.to_i128().cmp(&(*other as i128)))
            }
        }
    )*};
}

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::I64(v as i64)
            }
        }

        impl PartialEq<$t> for Value {
            fn eq(&self, other: &$t) -> bool {
                self.to_i128() == *other as i128
            }
        }

        impl PartialOrd<$t> for Value {
            fn partial_cmp(&self, other: &$t) -> Option<Ordering> {
                Some(self.to_i128().cmp(&(*other as i128)))
            }
        }
    )*};
}

from_unsigned!(u8, u16, u32, u64, usize);
from_signed!(i8, i16, i32, i64, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::U64(v as u64)
    }
}

// Arithmetic wraps in the left operand's representation.
macro_rules! binary_op {
    ($($trait:ident :: $method:ident => $unsigned:ident, $signed:ident);* $(;)?) => {$(
        impl<T: Into<Value>> $trait<T> for Value {
            type Output = Value;

            fn $method(self, rhs: T) -> Value {
                let rhs: Value = rhs.into();
                match self {
                    Value::U64(v) => Value::U64(v.$unsigned(rhs.as_u64())),
                    Value::I64(v) => Value::I64(v.$signed(rhs.as_i64())),
                }
            }
        }
    )*};
}

binary_op! {
    Add::add => wrapping_add, wrapping_add;
    Sub::sub => wrapping_sub, wrapping_sub;
    Mul::mul => wrapping_mul, wrapping_mul;
}

macro_rules! bitwise_op {
    ($($trait:ident :: $method:ident => $op:tt);* $(;)?) => {$(
        impl<T: Into<Value>> $trait<T> for Value {
            type Output = Value;

            fn $method(self, rhs: T) -> Value {
                let rhs: Value = rhs.into();
                self.rewrap(self.as_u64() $op rhs.as_u64())
            }
        }
    )*};
}

bitwise_op! {
    BitAnd::bitand => &;
    BitOr::bitor => |;
    BitXor::bitxor => ^;
}

impl Not for Value {
    type Output = Value;

    fn not(self) -> Value {
        self.rewrap(!self.as_u64())
    }
}

impl Shl<u32> for Value {
    type Output = Value;

    fn shl(self, rhs: u32) -> Value {
        self.rewrap(self.as_u64().wrapping_shl(rhs))
    }
}

impl Shr<u32> for Value {
    type Output = Value;

    fn shr(self, rhs: u32) -> Value {
        match self {
            Value::U64(v) => Value::U64(v.wrapping_shr(rhs)),
            Value::I64(v) => Value::I64(v.wrapping_shr(rhs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_variant_equality() {
        assert_eq!(Value::U64(5), Value::I64(5));
        assert_ne!(Value::U64(u64::MAX), Value::I64(-1));
        assert!(Value::I64(-1) < Value::U64(0));
    }

    #[test]
    fn test_compare_with_primitives() {
        assert!(Value::U64(7) == 7u8);
        assert!(Value::I64(-3) == -3i32);
        assert!(Value::I64(-3) < 0u64);
        assert!(Value::U64(300) > 255u8);
    }

    #[test]
    fn test_arithmetic_keeps_representation() {
        assert_eq!(Value::U64(1) + 2u8, Value::U64(3));
        assert!((Value::U64(0) - 1u8).as_u64() == u64::MAX);
        assert_eq!(Value::I64(-4) * 2i8, Value::I64(-8));
        assert_eq!(Value::U64(0b1100) & 0b1010u8, Value::U64(0b1000));
        assert_eq!(Value::I64(-8) >> 1, Value::I64(-4));
        assert_eq!(Value::U64(1) << 4, Value::U64(16));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I64(-12).to_string(), "-12");
        assert_eq!(Value::U64(12).to_string(), "12");
    }
}
