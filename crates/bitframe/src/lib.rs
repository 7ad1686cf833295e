//! # bitframe
//!
//! Bit-granular field access and incremental parsing of nested,
//! length-delimited binary containers.
//!
//! Fields are declared by width (1 to 64 bits), bit offset, byte order and
//! signedness, and read or written in place in a stream's buffer. Placing a
//! field returns a small handle; handles stay valid while the stream
//! compacts or refills its buffer, until the next reset. A [`parser::Parser`]
//! adds byte budgets for nested content and reports the structure it walks
//! to an [`parser::Observer`].
//!
//! ## Example
//!
//! ```
//! use bitframe::field::{be, Text};
//! use bitframe::footprint::Footprint;
//! use bitframe::parser::Parser;
//! use bitframe::stream::MemoryStream;
//!
//! // A 3-bit version and a 5-bit flag set sharing one byte, then a C string.
//! let data = vec![0b101_00110, b'h', b'i', 0, 0xAA];
//! let mut parser = Parser::new(MemoryStream::new(data));
//!
//! let header = parser.get(Footprint::new(8, 0)).unwrap();
//! let version = header.field(be::uint(3));
//! let flags = header.field(be::uint(5).at(3));
//! assert_eq!(version.get(&parser), 5u8);
//! assert_eq!(flags.get(&parser), 6u8);
//!
//! let mut limit = 4;
//! let name = parser.take(&mut limit, Text::dynamic_cstring()).unwrap();
//! assert_eq!(name.text(&parser), "hi");
//! assert_eq!(limit, 1);
//! ```

pub mod bits;
pub mod cached;
pub mod composer;
pub mod config;
pub mod errors;
pub mod field;
pub mod file_stream;
pub mod footprint;
pub mod header_stream;
pub mod parser;
pub mod remainder;
pub mod stream;
pub mod value;
pub mod verify;

#[cfg(feature = "serde")]
pub mod serde;

pub use errors::{Error, Result};
pub use field::{Array, Field, Text};
pub use footprint::{ByteOrder, Footprint, Signedness};
pub use value::Value;
