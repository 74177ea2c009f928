//! # RoServer Protocol Library
//!
//! This library implements the Ragnarok Online client-server wire protocol
//! with exact byte-level compatibility across client build dates.
//!
//! ## Architecture
//!
//! The protocol is organized into several layers:
//!
//! ### 1. Codecs Layer ([`codecs`])
//! Little-endian primitive encoding plus the client's packed coordinate
//! formats:
//! - fixed-width integers (u8/u16/u32 and signed counterparts)
//! - fixed-capacity NUL-padded strings (16-byte map names, 24-byte
//!   character names)
//! - 3-byte packed position (x:10 bits, y:10 bits, dir:4 bits)
//! - 6-byte packed move segment (two positions plus two cell offsets)
//!
//! ### 2. Layout Model ([`fields`], [`layout`])
//! Every packet is described as data, not as a packed struct: an ordered
//! list of [`fields::FieldDescriptor`]s inside a [`layout::LayoutVariant`],
//! one variant per contiguous range of client build dates. The
//! [`layout::LayoutRegistry`] selects the variant active for a configured
//! [`roserver_core::PacketVer`] and refuses to start the server when a
//! packet has no variant covering that version.
//!
//! ### 3. Packet Catalog ([`catalog`])
//! The flat enumeration of every [`catalog::PacketKind`] the server speaks,
//! with its full variant cascade: real opcodes, byte offsets, and the
//! growth points where layouts changed between client generations.
//!
//! ### 4. Dispatch Layer ([`dispatch`], [`framing`])
//! The opcode resolution table (opcode -> expected length + handler),
//! the serializer/deserializer translating between [`fields::FieldValues`]
//! and wire bytes, and the partial-message frame reader that defers
//! parsing until a connection has buffered a complete packet.
//!
//! ## Wire Format
//!
//! Every packet begins with a 2-byte little-endian opcode. Fixed-length
//! packets have no further framing; variable-length packets carry their
//! total length as a u16 at byte offset 2 (counting the opcode).
//!
//! ## Version Support
//!
//! Layout selection is driven by a single YYYYMMDD build-date integer.
//! The cascade of per-version layouts is an explicit sorted threshold
//! table resolved at startup, so one server build can serve any supported
//! client generation without recompiling.

pub mod catalog;
pub mod codecs;
pub mod dispatch;
pub mod error;
pub mod fields;
pub mod framing;
pub mod layout;

// Re-export commonly used items
pub use catalog::*;
pub use dispatch::*;
pub use error::*;
pub use fields::*;
pub use framing::*;
pub use layout::*;
