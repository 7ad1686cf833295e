//! Byte budget bounding the decoding of nested content.

use crate::errors::{Error, Result};

/// Bytes a region still has left to give to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Remainder {
    left: u64,
}

impl Remainder {
    /// Budget of a region with no declared length.
    pub const UNBOUNDED: u64 = u64::MAX >> 1;

    pub const fn new(left: u64) -> Self {
        Remainder { left }
    }

    pub const fn left(&self) -> u64 {
        self.left
    }

    pub const fn is_exhausted(&self) -> bool {
        self.left == 0
    }

    /// Takes `size` bytes out of the budget, or fails without changing it.
    pub fn reduce(&mut self, size: u64) -> Result<()> {
        if size > self.left {
            return Err(Error::Overcommitment {
                requested: size,
                left: self.left,
            });
        }
        self.left -= size;
        Ok(())
    }

    pub fn set(&mut self, left: u64) {
        self.left = left;
    }
}

impl Default for Remainder {
    fn default() -> Self {
        Remainder::new(Self::UNBOUNDED)
    }
}

impl From<u64> for Remainder {
    fn from(left: u64) -> Self {
        Remainder::new(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce() {
        let mut remainder = Remainder::new(10);
        assert!(matches!(
            remainder.reduce(11),
            Err(Error::Overcommitment {
                requested: 11,
                left: 10
            })
        ));
        assert_eq!(remainder.left(), 10);

        remainder.reduce(10).unwrap();
        assert!(remainder.is_exhausted());
        assert!(remainder.reduce(1).is_err());
        remainder.reduce(0).unwrap();
    }

    #[test]
    fn test_default_is_unbounded() {
        let mut remainder = Remainder::default();
        remainder.reduce(u32::MAX as u64).unwrap();
        assert!(remainder.left() > u32::MAX as u64);
    }
}
