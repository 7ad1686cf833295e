//! Error types for streaming, placement and parsing.
//!
//! The codec and the data model do not produce errors: a violated
//! precondition there is a programming mistake and panics. Everything the
//! input data or the environment can cause ends up here.

use std::{io, path::PathBuf};

/// Errors produced by streams, the header stream and parsers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested lookahead goes past the last byte the source can provide.
    #[error("{context}: end of stream")]
    EndOfStream { context: String },

    /// A nested region asked for more bytes than its parent declared.
    #[error("overcommitment: {requested} bytes requested, {left} left")]
    Overcommitment { requested: u64, left: u64 },

    /// A single request can never fit into the configured buffer.
    #[error(
        "couldn't ensure {requested} bytes: capacity of {capacity} bytes allows less \
         ({buffered} bytes already buffered)"
    )]
    Capacity {
        requested: usize,
        capacity: usize,
        buffered: usize,
    },

    /// A field was declared with a width outside `1..=64` bits.
    #[error("invalid field width of {0} bits, expected 1..=64")]
    InvalidWidth(usize),

    /// Opening or reading the file behind a stream failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other failure raised by a concrete format while decoding a node.
    #[error("{0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn end_of_stream(context: impl Into<String>) -> Self {
        Error::EndOfStream {
            context: context.into(),
        }
    }

    /// True for [`Error::EndOfStream`]: the source simply ran out of bytes.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream { .. })
    }

    /// True for errors that point at a configuration mistake rather than at
    /// the input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Capacity { .. } | Error::InvalidWidth(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
