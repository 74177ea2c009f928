//! Field model: wire types, descriptors, and named value sets
//!
//! Packed C-style structs with conditionally-compiled members are modeled
//! here as explicit data: a [`FieldDescriptor`] names one value's byte
//! offset, wire type, and semantic role inside a layout. Serialization
//! reads named [`FieldValue`]s out of a [`FieldValues`] set, so the same
//! value set can be encoded against any layout variant that mentions the
//! roles it carries.

use crate::error::ProtocolError;
use std::collections::HashMap;

/// Wire type of a single field, carrying its encoded width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    /// Raw byte run of fixed length (card slots, opaque blobs).
    Bytes(usize),
    /// Fixed-capacity NUL-padded string (map names: 16, char names: 24).
    Str(usize),
    /// Packed position-with-direction, 3 bytes.
    Pos3,
    /// Packed move segment (source, destination, cell offsets), 6 bytes.
    Move6,
}

impl FieldType {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
            Self::Bytes(n) | Self::Str(n) => n,
            Self::Pos3 => 3,
            Self::Move6 => 6,
        }
    }

    /// Name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::Bytes(_) => "bytes",
            Self::Str(_) => "str",
            Self::Pos3 => "pos3",
            Self::Move6 => "move6",
        }
    }
}

/// One value's position within a layout: (byte offset, wire type, role).
///
/// # Invariant
/// Within a layout variant, descriptors are ordered by strictly
/// increasing offset and do not overlap; gaps are zero-filled padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Byte offset from the start of the packet (opcode included).
    pub offset: usize,

    /// Wire type (and therefore width).
    pub ty: FieldType,

    /// Semantic role, e.g. `"item_id"`, `"amount"`.
    pub role: &'static str,
}

impl FieldDescriptor {
    pub const fn new(offset: usize, ty: FieldType, role: &'static str) -> Self {
        Self { offset, ty, role }
    }

    /// Offset one past the field's last byte.
    pub const fn end(&self) -> usize {
        self.offset + self.ty.width()
    }
}

/// A single decoded or to-be-encoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    Bytes(Vec<u8>),
    Str(String),
    /// A packed position-with-direction.
    Pos { x: u16, y: u16, dir: u8 },
    /// A packed move segment.
    Move {
        src_x: u16,
        src_y: u16,
        dst_x: u16,
        dst_y: u16,
        src_cell: u8,
        dst_cell: u8,
    },
    /// Elements of a repeated variable-length tail.
    List(Vec<FieldValues>),
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<i8> for FieldValue {
    fn from(v: i8) -> Self {
        Self::I8(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<i16> for FieldValue {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<FieldValues>> for FieldValue {
    fn from(v: Vec<FieldValues>) -> Self {
        Self::List(v)
    }
}

/// Named value set keyed by field role.
///
/// The serializer reads roles the active layout variant names and ignores
/// the rest, so callers may populate a superset (e.g. fill `font` and
/// `sex` unconditionally and let pre-2008 layouts drop them).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: HashMap<&'static str, FieldValue>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, role: &'static str, value: impl Into<FieldValue>) -> Self {
        self.values.insert(role, value.into());
        self
    }

    pub fn set(&mut self, role: &'static str, value: impl Into<FieldValue>) {
        self.values.insert(role, value.into());
    }

    pub fn get(&self, role: &str) -> Option<&FieldValue> {
        self.values.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.values.contains_key(role)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, role: &'static str) -> Result<&FieldValue, ProtocolError> {
        self.values
            .get(role)
            .ok_or(ProtocolError::MissingField { role })
    }

    /// Get a `u8` value by role.
    pub fn u8(&self, role: &'static str) -> Result<u8, ProtocolError> {
        match self.require(role)? {
            FieldValue::U8(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "u8",
            }),
        }
    }

    /// Get an `i8` value by role.
    pub fn i8(&self, role: &'static str) -> Result<i8, ProtocolError> {
        match self.require(role)? {
            FieldValue::I8(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "i8",
            }),
        }
    }

    /// Get a `u16` value by role.
    pub fn u16(&self, role: &'static str) -> Result<u16, ProtocolError> {
        match self.require(role)? {
            FieldValue::U16(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "u16",
            }),
        }
    }

    /// Get an `i16` value by role.
    pub fn i16(&self, role: &'static str) -> Result<i16, ProtocolError> {
        match self.require(role)? {
            FieldValue::I16(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "i16",
            }),
        }
    }

    /// Get a `u32` value by role.
    pub fn u32(&self, role: &'static str) -> Result<u32, ProtocolError> {
        match self.require(role)? {
            FieldValue::U32(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "u32",
            }),
        }
    }

    /// Get an `i32` value by role.
    pub fn i32(&self, role: &'static str) -> Result<i32, ProtocolError> {
        match self.require(role)? {
            FieldValue::I32(v) => Ok(*v),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "i32",
            }),
        }
    }

    /// Get a string value by role.
    pub fn str(&self, role: &'static str) -> Result<&str, ProtocolError> {
        match self.require(role)? {
            FieldValue::Str(v) => Ok(v.as_str()),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "str",
            }),
        }
    }

    /// Get a byte-run value by role.
    pub fn bytes(&self, role: &'static str) -> Result<&[u8], ProtocolError> {
        match self.require(role)? {
            FieldValue::Bytes(v) => Ok(v.as_slice()),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "bytes",
            }),
        }
    }

    /// Get a packed position by role.
    pub fn pos(&self, role: &'static str) -> Result<(u16, u16, u8), ProtocolError> {
        match self.require(role)? {
            FieldValue::Pos { x, y, dir } => Ok((*x, *y, *dir)),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "pos3",
            }),
        }
    }

    /// Get a repeated-tail element list by role.
    pub fn list(&self, role: &'static str) -> Result<&[FieldValues], ProtocolError> {
        match self.require(role)? {
            FieldValue::List(v) => Ok(v.as_slice()),
            _ => Err(ProtocolError::WrongFieldType {
                role,
                expected: "list",
            }),
        }
    }
}
