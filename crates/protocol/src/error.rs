//! Protocol error taxonomy
//!
//! Severity is part of each variant's contract:
//! - `UnresolvedLayout`, `InvalidLayout`, `DuplicateOpcode` are
//!   startup-fatal: registry validation surfaces them before the server
//!   accepts a single connection.
//! - `UnknownOpcode` and `TruncatedPacket` are tolerated per-packet
//!   conditions that never tear down a connection by themselves.
//! - `MalformedLength` is surfaced to the session layer, which decides
//!   between log-and-drop and forced disconnect.
//! - `SerializationInvariant`, `MissingField`, `WrongFieldType` indicate
//!   programmer errors (a value set not matching the validated layout);
//!   broadcast fan-out absorbs them per target.

use roserver_core::PacketVer;

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    /// No layout variant of a packet covers the configured client version.
    #[error("no layout variant of {kind} covers client version {ver}")]
    UnresolvedLayout { kind: &'static str, ver: PacketVer },

    /// Inbound opcode absent from the opcode resolution table.
    #[error("unknown opcode 0x{opcode:04x}")]
    UnknownOpcode { opcode: u16 },

    /// Fewer bytes available than the expected-length rule demands.
    #[error("truncated packet 0x{opcode:04x}: need {needed} bytes, have {available}")]
    TruncatedPacket {
        opcode: u16,
        needed: usize,
        available: usize,
    },

    /// A variable-length packet's declared length is inconsistent with
    /// protocol invariants (below the header size, above the sane
    /// maximum, or contradicting its element count).
    #[error("malformed length for opcode 0x{opcode:04x}: declared {declared}")]
    MalformedLength { opcode: u16, declared: usize },

    /// A role named by the layout has no value in the supplied set.
    #[error("missing value for field `{role}`")]
    MissingField { role: &'static str },

    /// A supplied value does not match the field's wire type.
    #[error("field `{role}` has the wrong value type (expected {expected})")]
    WrongFieldType {
        role: &'static str,
        expected: &'static str,
    },

    /// A value cannot be represented in the byte width the field allows.
    #[error("serialization invariant violated for field `{role}`: {reason}")]
    SerializationInvariant { role: &'static str, reason: String },

    /// A layout definition is structurally unsound (overlapping fields,
    /// fields outside the declared size, unsorted thresholds, ...).
    #[error("invalid layout for {kind}: {reason}")]
    InvalidLayout { kind: &'static str, reason: String },

    /// Two inbound packets resolve to the same opcode at one version.
    #[error("duplicate opcode 0x{opcode:04x} claimed by {kind} and {other}")]
    DuplicateOpcode {
        opcode: u16,
        kind: &'static str,
        other: &'static str,
    },

    /// A handler reported a failure while processing a packet.
    #[error("handler for {kind} failed: {reason}")]
    Handler { kind: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
