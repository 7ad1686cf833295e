//! Checking constant fields instead of writing them.
//!
//! A format assigns its magic numbers and reserved bits through
//! [`Parser::constant`](crate::parser::Parser::constant). With
//! [`Mode::Assign`] that is a plain write, which is what composing a buffer
//! needs. With [`Mode::Verify`] the decoded value is compared against the
//! constant and every difference goes to the mismatch callback.

use std::fmt;

use log::warn;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Assign,
    Verify,
}

/// A constant that did not hold in the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Absolute stream offset of the buffer position the field was placed at.
    pub offset: u64,
    pub expected: Vec<Value>,
    pub actual: Vec<Value>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(values: &[Value]) -> String {
            let items: Vec<_> = values.iter().map(Value::to_string).collect();
            items.join(", ")
        }
        write!(
            f,
            "constant mismatch at offset {}: expected [{}], found [{}]",
            self.offset,
            list(&self.expected),
            list(&self.actual)
        )
    }
}

pub type MismatchHandler = Box<dyn FnMut(&Mismatch)>;

/// Verification mode plus the callback reporting mismatches.
///
/// The default callback panics.
pub struct Verification {
    mode: Mode,
    on_mismatch: MismatchHandler,
}

impl Verification {
    pub fn assign() -> Self {
        Verification {
            mode: Mode::Assign,
            on_mismatch: Box::new(|mismatch| panic!("{mismatch}")),
        }
    }

    pub fn verify() -> Self {
        Verification {
            mode: Mode::Verify,
            ..Self::assign()
        }
    }

    pub fn with_handler(mut self, handler: impl FnMut(&Mismatch) + 'static) -> Self {
        self.on_mismatch = Box::new(handler);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn is_verifying(&self) -> bool {
        self.mode == Mode::Verify
    }

    pub(crate) fn report(&mut self, mismatch: Mismatch) {
        warn!("{mismatch}");
        (self.on_mismatch)(&mismatch);
    }
}

impl Default for Verification {
    fn default() -> Self {
        Self::assign()
    }
}

impl fmt::Debug for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verification")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
