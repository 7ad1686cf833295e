//! JSON-deserializable layout descriptions.
//!
//! These types describe shapes as data, for example a layout file shipped
//! next to an application, and convert into [`Field`], [`Array`], [`Text`]
//! and [`Layout`] with `TryFrom`. Widths are checked during conversion.
//!
//! [`Field`]: crate::field::Field
//! [`Array`]: crate::field::Array
//! [`Text`]: crate::field::Text
//! [`Layout`]: crate::field::Layout

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrderDef {
    #[default]
    Big,
    Little,
}

/// One integer field.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Width in bits, `1..=64`.
    pub width: usize,
    /// Bits between the placement position and the first bit.
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub order: ByteOrderDef,
    #[serde(default)]
    pub signed: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ArrayDef {
    pub element: FieldDef,
    /// Element count; absent for arrays sized while parsing.
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct TextDef {
    #[serde(default)]
    pub offset: usize,
    /// Length in bytes including any terminator; absent for texts sized
    /// while parsing.
    #[serde(default)]
    pub length: Option<usize>,
    /// Zero-terminated (C string) text.
    #[serde(default)]
    pub terminated: bool,
}

/// A named entry of a layout.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDef {
    Field { name: String, field: FieldDef },
    Array { name: String, array: ArrayDef },
    Text { name: String, text: TextDef },
}

/// Entries placed one after another.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct LayoutDef {
    pub items: Vec<ItemDef>,
}
