//! Serializer, deserializer, and the inbound opcode resolution table
//!
//! The serializer turns a named value set into wire bytes against the
//! layout variant active for a connection's build date; the deserializer
//! is the inverse. The opcode table maps each inbound opcode to its
//! expected-length rule and handler, is built once at startup from the
//! validated registry, and is never mutated afterwards — the event loop
//! reads it without synchronization.

use crate::catalog::{Direction, PacketKind};
use crate::codecs;
use crate::error::ProtocolError;
use crate::fields::{FieldDescriptor, FieldType, FieldValue, FieldValues};
use crate::layout::{LayoutRegistry, LayoutVariant, VariableTail, WireSize, MAX_PACKET_LENGTH};
use bytes::BytesMut;
use roserver_core::{PacketVer, SessionId};
use std::collections::HashMap;
use std::sync::Arc;

/// Serialize `kind` for a peer at build date `ver`.
///
/// Guarantee: byte-for-byte reproducible — identical inputs and version
/// always produce the identical buffer. The caller (usually the
/// send-target resolver) is responsible for enqueueing the result; this
/// function has no side effects.
pub fn serialize(
    registry: &LayoutRegistry,
    kind: PacketKind,
    values: &FieldValues,
    ver: PacketVer,
) -> Result<BytesMut, ProtocolError> {
    let variant = registry.resolve(kind, ver)?;
    serialize_variant(variant, values)
}

/// Serialize against an already-resolved layout variant.
pub fn serialize_variant(
    variant: &LayoutVariant,
    values: &FieldValues,
) -> Result<BytesMut, ProtocolError> {
    match variant.size {
        WireSize::Fixed(size) => {
            let mut buf = BytesMut::zeroed(size);
            codecs::put_u16(&mut buf, 0, variant.opcode);
            for field in &variant.fields {
                write_field(&mut buf, field, values)?;
            }
            Ok(buf)
        }
        WireSize::Variable { header, len_offset } => {
            let mut buf = BytesMut::zeroed(header);
            codecs::put_u16(&mut buf, 0, variant.opcode);

            let count_role = match &variant.tail {
                Some(VariableTail::Array { count_role, .. }) => Some(*count_role),
                _ => None,
            };
            for field in &variant.fields {
                // element count is derived from the list, not caller-supplied
                if Some(field.role) == count_role {
                    continue;
                }
                write_field(&mut buf, field, values)?;
            }

            match &variant.tail {
                Some(VariableTail::Text { role }) => {
                    let text = values.str(role)?;
                    buf.extend_from_slice(text.as_bytes());
                    buf.extend_from_slice(&[0]); // zero terminator
                }
                Some(VariableTail::Array {
                    role,
                    count_role,
                    fields,
                    item_width,
                }) => {
                    let (role, count_role, item_width) = (*role, *count_role, *item_width);
                    let elements = values.list(role)?;
                    let count_field = variant
                        .field(count_role)
                        .ok_or(ProtocolError::MissingField { role: count_role })?;
                    write_count(&mut buf, count_field, elements.len())?;
                    for element in elements {
                        let start = buf.len();
                        buf.resize(start + item_width, 0);
                        for field in fields {
                            let shifted = FieldDescriptor::new(
                                start + field.offset,
                                field.ty,
                                field.role,
                            );
                            write_field(&mut buf, &shifted, element)?;
                        }
                    }
                }
                None => {}
            }

            let total = buf.len();
            if total > MAX_PACKET_LENGTH {
                return Err(ProtocolError::SerializationInvariant {
                    role: "packet_length",
                    reason: format!("total length {} exceeds maximum", total),
                });
            }
            codecs::put_u16(&mut buf, len_offset, total as u16);
            Ok(buf)
        }
    }
}

/// Deserialize an inbound frame against the opcode table.
pub fn deserialize(
    table: &OpcodeTable,
    opcode: u16,
    bytes: &[u8],
) -> Result<FieldValues, ProtocolError> {
    let entry = table
        .lookup(opcode)
        .ok_or(ProtocolError::UnknownOpcode { opcode })?;
    deserialize_variant(&entry.variant, bytes)
}

/// Deserialize against an already-resolved layout variant.
pub fn deserialize_variant(
    variant: &LayoutVariant,
    bytes: &[u8],
) -> Result<FieldValues, ProtocolError> {
    let opcode = variant.opcode;
    let mut values = FieldValues::new();

    match variant.size {
        WireSize::Fixed(size) => {
            if bytes.len() < size {
                return Err(ProtocolError::TruncatedPacket {
                    opcode,
                    needed: size,
                    available: bytes.len(),
                });
            }
            for field in &variant.fields {
                values.set(field.role, read_field(bytes, field));
            }
        }
        WireSize::Variable { header, len_offset } => {
            if bytes.len() < header {
                return Err(ProtocolError::TruncatedPacket {
                    opcode,
                    needed: header,
                    available: bytes.len(),
                });
            }
            let declared = codecs::get_u16(bytes, len_offset) as usize;
            if declared < header || declared > MAX_PACKET_LENGTH {
                return Err(ProtocolError::MalformedLength { opcode, declared });
            }
            if bytes.len() < declared {
                return Err(ProtocolError::TruncatedPacket {
                    opcode,
                    needed: declared,
                    available: bytes.len(),
                });
            }
            for field in &variant.fields {
                values.set(field.role, read_field(bytes, field));
            }

            match &variant.tail {
                Some(VariableTail::Text { role }) => {
                    let tail = &bytes[header..declared];
                    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
                    values.set(role, String::from_utf8_lossy(&tail[..end]).into_owned());
                }
                Some(VariableTail::Array {
                    role,
                    count_role,
                    fields,
                    item_width,
                }) => {
                    let (role, count_role, item_width) = (*role, *count_role, *item_width);
                    let count = read_count(&values, variant, count_role)?;
                    let expected = header + count * item_width;
                    if expected != declared {
                        return Err(ProtocolError::MalformedLength { opcode, declared });
                    }
                    let mut elements = Vec::with_capacity(count);
                    for i in 0..count {
                        let start = header + i * item_width;
                        let mut element = FieldValues::new();
                        for field in fields {
                            let shifted = FieldDescriptor::new(
                                start + field.offset,
                                field.ty,
                                field.role,
                            );
                            element.set(field.role, read_field(bytes, &shifted));
                        }
                        elements.push(element);
                    }
                    values.set(role, elements);
                }
                None => {}
            }
        }
    }

    Ok(values)
}

fn write_field(
    buf: &mut [u8],
    field: &FieldDescriptor,
    values: &FieldValues,
) -> Result<(), ProtocolError> {
    let role = field.role;
    match field.ty {
        FieldType::U8 => codecs::put_u8(buf, field.offset, values.u8(role)?),
        FieldType::I8 => codecs::put_i8(buf, field.offset, values.i8(role)?),
        FieldType::U16 => codecs::put_u16(buf, field.offset, values.u16(role)?),
        FieldType::I16 => codecs::put_i16(buf, field.offset, values.i16(role)?),
        FieldType::U32 => codecs::put_u32(buf, field.offset, values.u32(role)?),
        FieldType::I32 => codecs::put_i32(buf, field.offset, values.i32(role)?),
        FieldType::Bytes(cap) => {
            let data = values.bytes(role)?;
            if data.len() > cap {
                return Err(ProtocolError::SerializationInvariant {
                    role,
                    reason: format!("{} bytes exceed the {}-byte field", data.len(), cap),
                });
            }
            buf[field.offset..field.offset + data.len()].copy_from_slice(data);
        }
        FieldType::Str(cap) => {
            let text = values.str(role)?;
            // reserve one byte so the client always sees a terminator
            if text.len() >= cap {
                return Err(ProtocolError::SerializationInvariant {
                    role,
                    reason: format!("{}-byte string exceeds the {}-byte field", text.len(), cap),
                });
            }
            codecs::put_str(buf, field.offset, cap, text);
        }
        FieldType::Pos3 => {
            let (x, y, dir) = values.pos(role)?;
            if x > 0x3ff || y > 0x3ff || dir > 0xf {
                return Err(ProtocolError::SerializationInvariant {
                    role,
                    reason: format!("position ({}, {}, {}) out of packed range", x, y, dir),
                });
            }
            codecs::put_pos3(buf, field.offset, x, y, dir);
        }
        FieldType::Move6 => match values.get(role) {
            Some(FieldValue::Move {
                src_x,
                src_y,
                dst_x,
                dst_y,
                src_cell,
                dst_cell,
            }) => {
                if *src_x > 0x3ff
                    || *src_y > 0x3ff
                    || *dst_x > 0x3ff
                    || *dst_y > 0x3ff
                    || *src_cell > 0xf
                    || *dst_cell > 0xf
                {
                    return Err(ProtocolError::SerializationInvariant {
                        role,
                        reason: "move segment out of packed range".into(),
                    });
                }
                codecs::put_move6(
                    buf, field.offset, *src_x, *src_y, *dst_x, *dst_y, *src_cell, *dst_cell,
                );
            }
            Some(_) => {
                return Err(ProtocolError::WrongFieldType {
                    role,
                    expected: "move6",
                })
            }
            None => return Err(ProtocolError::MissingField { role }),
        },
    }
    Ok(())
}

fn read_field(bytes: &[u8], field: &FieldDescriptor) -> FieldValue {
    match field.ty {
        FieldType::U8 => FieldValue::U8(codecs::get_u8(bytes, field.offset)),
        FieldType::I8 => FieldValue::I8(codecs::get_i8(bytes, field.offset)),
        FieldType::U16 => FieldValue::U16(codecs::get_u16(bytes, field.offset)),
        FieldType::I16 => FieldValue::I16(codecs::get_i16(bytes, field.offset)),
        FieldType::U32 => FieldValue::U32(codecs::get_u32(bytes, field.offset)),
        FieldType::I32 => FieldValue::I32(codecs::get_i32(bytes, field.offset)),
        FieldType::Bytes(cap) => {
            FieldValue::Bytes(bytes[field.offset..field.offset + cap].to_vec())
        }
        FieldType::Str(cap) => FieldValue::Str(codecs::get_str(bytes, field.offset, cap)),
        FieldType::Pos3 => {
            let (x, y, dir) = codecs::get_pos3(bytes, field.offset);
            FieldValue::Pos { x, y, dir }
        }
        FieldType::Move6 => {
            let (src_x, src_y, dst_x, dst_y, src_cell, dst_cell) =
                codecs::get_move6(bytes, field.offset);
            FieldValue::Move {
                src_x,
                src_y,
                dst_x,
                dst_y,
                src_cell,
                dst_cell,
            }
        }
    }
}

fn write_count(
    buf: &mut [u8],
    count_field: &FieldDescriptor,
    count: usize,
) -> Result<(), ProtocolError> {
    let overflow = |max: usize| ProtocolError::SerializationInvariant {
        role: count_field.role,
        reason: format!("{} elements exceed the field maximum {}", count, max),
    };
    match count_field.ty {
        FieldType::U8 => {
            if count > u8::MAX as usize {
                return Err(overflow(u8::MAX as usize));
            }
            codecs::put_u8(buf, count_field.offset, count as u8);
        }
        FieldType::U16 => {
            if count > u16::MAX as usize {
                return Err(overflow(u16::MAX as usize));
            }
            codecs::put_u16(buf, count_field.offset, count as u16);
        }
        FieldType::U32 => codecs::put_u32(buf, count_field.offset, count as u32),
        // registry validation only admits unsigned integer count fields
        _ => unreachable!("count field validated as unsigned integer"),
    }
    Ok(())
}

fn read_count(
    values: &FieldValues,
    variant: &LayoutVariant,
    count_role: &'static str,
) -> Result<usize, ProtocolError> {
    let count_field = variant
        .field(count_role)
        .ok_or(ProtocolError::MissingField { role: count_role })?;
    Ok(match count_field.ty {
        FieldType::U8 => values.u8(count_role)? as usize,
        FieldType::U16 => values.u16(count_role)? as usize,
        FieldType::U32 => values.u32(count_role)? as usize,
        _ => unreachable!("count field validated as unsigned integer"),
    })
}

/// One row of the opcode resolution table.
#[derive(Debug, Clone)]
pub struct OpcodeEntry {
    /// The packet kind this opcode carries at the configured version.
    pub kind: PacketKind,

    /// The layout variant active at the configured version.
    pub variant: LayoutVariant,
}

impl OpcodeEntry {
    /// Expected-length rule for frames of this opcode.
    pub fn bound(&self) -> WireSize {
        self.variant.size
    }
}

/// Inbound opcode -> (expected length, layout, handler kind).
///
/// Built once at startup for the process-wide client version; read-only
/// for the server's lifetime.
#[derive(Debug, Default)]
pub struct OpcodeTable {
    entries: HashMap<u16, OpcodeEntry>,
}

impl OpcodeTable {
    /// Build the table for every client-to-server kind in the registry.
    ///
    /// Fails with `UnresolvedLayout` when an inbound kind has no variant
    /// at `ver`, or `DuplicateOpcode` when two kinds collide — both are
    /// startup-fatal.
    pub fn build(registry: &LayoutRegistry, ver: PacketVer) -> Result<Self, ProtocolError> {
        let mut entries: HashMap<u16, OpcodeEntry> = HashMap::new();
        for kind in registry.kinds() {
            if kind.direction() != Direction::ClientToServer {
                continue;
            }
            let variant = registry.resolve(kind, ver)?;
            if let Some(existing) = entries.get(&variant.opcode) {
                return Err(ProtocolError::DuplicateOpcode {
                    opcode: variant.opcode,
                    kind: kind.name(),
                    other: existing.kind.name(),
                });
            }
            entries.insert(
                variant.opcode,
                OpcodeEntry {
                    kind,
                    variant: variant.clone(),
                },
            );
        }
        Ok(Self { entries })
    }

    /// Look up an opcode. `None` means the opcode was never registered;
    /// callers log and discard rather than tearing the connection down.
    pub fn lookup(&self, opcode: u16) -> Option<&OpcodeEntry> {
        self.entries.get(&opcode)
    }

    /// Number of registered opcodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handler invoked for one parsed inbound packet.
///
/// Handlers run synchronously inside the event loop and must complete
/// within one tick; delayed work goes through the timer queue instead of
/// blocking.
pub type PacketHandler = Arc<dyn Fn(SessionId, FieldValues) -> Result<(), ProtocolError> + Send + Sync>;

/// Registry of packet handlers keyed by kind.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<PacketKind, PacketHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a packet kind.
    pub fn register<F>(&mut self, kind: PacketKind, handler: F)
    where
        F: Fn(SessionId, FieldValues) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        tracing::debug!("registered handler for {}", kind);
        self.handlers.insert(kind, Arc::new(handler));
    }

    pub fn has_handler(&self, kind: PacketKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn get(&self, kind: PacketKind) -> Option<&PacketHandler> {
        self.handlers.get(&kind)
    }
}

/// Result of one inbound dispatch cycle.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Parsed and handled.
    Handled(PacketKind),

    /// Parsed, but no handler registered; packet discarded.
    NoHandler(PacketKind),

    /// Opcode absent from the table; packet discarded, connection kept.
    UnknownOpcode(u16),

    /// Deserialization rejected the frame; the session layer decides
    /// whether to drop or disconnect.
    Rejected(ProtocolError),

    /// The handler returned an error; absorbed, never propagated into
    /// the event loop.
    HandlerFailed(PacketKind),
}

/// Inbound dispatcher: opcode table plus handler registry.
///
/// The table is shared with the per-connection framing code, which uses
/// the same expected-length rules to find frame boundaries.
pub struct Dispatcher {
    table: Arc<OpcodeTable>,
    handlers: HandlerRegistry,
}

impl Dispatcher {
    pub fn new(table: Arc<OpcodeTable>, handlers: HandlerRegistry) -> Self {
        Self { table, handlers }
    }

    pub fn table(&self) -> &OpcodeTable {
        &self.table
    }

    /// Run one full inbound cycle on a complete frame.
    ///
    /// Tolerated conditions (unknown opcode, missing handler, handler
    /// failure) are logged and absorbed here; nothing a peer sends can
    /// interrupt the event loop.
    pub fn dispatch(&self, session: SessionId, frame: &[u8]) -> DispatchOutcome {
        if frame.len() < 2 {
            return DispatchOutcome::Rejected(ProtocolError::TruncatedPacket {
                opcode: 0,
                needed: 2,
                available: frame.len(),
            });
        }
        let opcode = codecs::get_u16(frame, 0);

        let entry = match self.table.lookup(opcode) {
            Some(entry) => entry,
            None => {
                tracing::warn!(
                    session = session.get(),
                    opcode = %format_args!("0x{:04x}", opcode),
                    "unknown opcode, packet discarded"
                );
                return DispatchOutcome::UnknownOpcode(opcode);
            }
        };

        let values = match deserialize_variant(&entry.variant, frame) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    session = session.get(),
                    kind = %entry.kind,
                    error = %e,
                    "inbound packet rejected"
                );
                return DispatchOutcome::Rejected(e);
            }
        };

        let handler = match self.handlers.get(entry.kind) {
            Some(handler) => handler,
            None => {
                tracing::debug!(session = session.get(), kind = %entry.kind, "no handler");
                return DispatchOutcome::NoHandler(entry.kind);
            }
        };

        match handler(session, values) {
            Ok(()) => DispatchOutcome::Handled(entry.kind),
            Err(e) => {
                tracing::warn!(
                    session = session.get(),
                    kind = %entry.kind,
                    error = %e,
                    "handler failed"
                );
                DispatchOutcome::HandlerFailed(entry.kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::standard_registry;

    /// Low-boundary sample for a field type.
    fn zero_value(ty: FieldType) -> FieldValue {
        match ty {
            FieldType::U8 => FieldValue::U8(0),
            FieldType::I8 => FieldValue::I8(0),
            FieldType::U16 => FieldValue::U16(0),
            FieldType::I16 => FieldValue::I16(0),
            FieldType::U32 => FieldValue::U32(0),
            FieldType::I32 => FieldValue::I32(0),
            FieldType::Bytes(n) => FieldValue::Bytes(vec![0; n]),
            FieldType::Str(_) => FieldValue::Str(String::new()),
            FieldType::Pos3 => FieldValue::Pos { x: 0, y: 0, dir: 0 },
            FieldType::Move6 => FieldValue::Move {
                src_x: 0,
                src_y: 0,
                dst_x: 0,
                dst_y: 0,
                src_cell: 0,
                dst_cell: 0,
            },
        }
    }

    /// High-boundary sample for a field type.
    fn max_value(ty: FieldType) -> FieldValue {
        match ty {
            FieldType::U8 => FieldValue::U8(u8::MAX),
            FieldType::I8 => FieldValue::I8(i8::MIN),
            FieldType::U16 => FieldValue::U16(u16::MAX),
            FieldType::I16 => FieldValue::I16(i16::MIN),
            FieldType::U32 => FieldValue::U32(u32::MAX),
            FieldType::I32 => FieldValue::I32(i32::MIN),
            FieldType::Bytes(n) => FieldValue::Bytes(vec![0xff; n]),
            FieldType::Str(n) => FieldValue::Str("x".repeat(n - 1)),
            FieldType::Pos3 => FieldValue::Pos {
                x: 0x3ff,
                y: 0x3ff,
                dir: 0xf,
            },
            FieldType::Move6 => FieldValue::Move {
                src_x: 0x3ff,
                src_y: 0x3ff,
                dst_x: 0x3ff,
                dst_y: 0x3ff,
                src_cell: 0xf,
                dst_cell: 0xf,
            },
        }
    }

    /// Build a full sample value set for a variant.
    fn sample_values(variant: &LayoutVariant, high: bool) -> FieldValues {
        let sample = |ty| if high { max_value(ty) } else { zero_value(ty) };

        let count_role = match &variant.tail {
            Some(VariableTail::Array { count_role, .. }) => Some(*count_role),
            _ => None,
        };

        let mut values = FieldValues::new();
        for field in &variant.fields {
            if Some(field.role) == count_role {
                continue;
            }
            values.set(field.role, sample(field.ty));
        }
        match &variant.tail {
            Some(VariableTail::Text { role }) => {
                values.set(*role, if high { "Abysswalker : hello" } else { "" });
            }
            Some(VariableTail::Array { role, fields, .. }) => {
                let count = if high { 3 } else { 0 };
                let mut elements = Vec::new();
                for _ in 0..count {
                    let mut element = FieldValues::new();
                    for field in fields {
                        element.set(field.role, sample(field.ty));
                    }
                    elements.push(element);
                }
                values.set(*role, elements);
            }
            None => {}
        }
        values
    }

    #[test]
    fn test_round_trip_every_variant() {
        let registry = standard_registry();
        for &kind in PacketKind::all() {
            for variant in registry.variants(kind).unwrap() {
                for high in [false, true] {
                    let values = sample_values(variant, high);
                    let buf = serialize_variant(variant, &values)
                        .unwrap_or_else(|e| panic!("{} serialize: {}", kind, e));
                    let decoded = deserialize_variant(variant, &buf)
                        .unwrap_or_else(|e| panic!("{} deserialize: {}", kind, e));

                    for field in &variant.fields {
                        if let Some(expected) = values.get(field.role) {
                            assert_eq!(
                                decoded.get(field.role),
                                Some(expected),
                                "{} field `{}` (high={})",
                                kind,
                                field.role,
                                high
                            );
                        }
                    }
                    if let Some(VariableTail::Text { role } | VariableTail::Array { role, .. }) =
                        &variant.tail
                    {
                        assert_eq!(
                            decoded.get(role),
                            values.get(role),
                            "{} tail `{}` (high={})",
                            kind,
                            role,
                            high
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let registry = standard_registry();
        for &kind in PacketKind::all() {
            for variant in registry.variants(kind).unwrap() {
                let values = sample_values(variant, true);
                let first = serialize_variant(variant, &values).unwrap();
                let second = serialize_variant(variant, &values).unwrap();
                assert_eq!(first, second, "{} not deterministic", kind);
            }
        }
    }

    #[test]
    fn test_item_pickup_ack_at_2016_build() {
        // A 20160921 peer resolves the 20150226 variant; with zero
        // options the buffer is exactly the variable header.
        let registry = standard_registry();
        let ver = PacketVer::new(20160921);
        let values = FieldValues::new()
            .with("index", 2u16)
            .with("amount", 3u16)
            .with("item_id", 501u32)
            .with("identified", 1u8)
            .with("damaged", 0u8)
            .with("refine", 0u8)
            .with("cards", vec![0u8; 8])
            .with("location", 0u32)
            .with("item_type", 0u8)
            .with("result", 0u8)
            .with("expire_time", 0u32)
            .with("options", Vec::<FieldValues>::new());

        let buf = serialize(&registry, PacketKind::ItemPickupAck, &values, ver).unwrap();
        assert_eq!(codecs::get_u16(&buf, 0), 0x0a0c);
        assert_eq!(buf.len(), 34);
        assert_eq!(codecs::get_u16(&buf, 2), 34);

        // Two 5-byte options extend the declared length accordingly.
        let option = FieldValues::new()
            .with("option_id", 1u16)
            .with("option_value", 5i16)
            .with("option_param", 0u8);
        let values = values.with("options", vec![option.clone(), option]);
        let buf = serialize(&registry, PacketKind::ItemPickupAck, &values, ver).unwrap();
        assert_eq!(buf.len(), 44);
        assert_eq!(codecs::get_u16(&buf, 2), 44);
        assert_eq!(codecs::get_u8(&buf, 33), 2); // derived option count
    }

    #[test]
    fn test_string_overflow_is_an_invariant_violation() {
        let registry = standard_registry();
        let values = FieldValues::new()
            .with("map_name", "a".repeat(16))
            .with("x", 155u16)
            .with("y", 187u16);
        let result = serialize(
            &registry,
            PacketKind::ChangeMap,
            &values,
            PacketVer::new(20180620),
        );
        assert!(matches!(
            result,
            Err(ProtocolError::SerializationInvariant { .. })
        ));
    }

    #[test]
    fn test_opcode_table_contains_only_inbound_kinds() {
        let registry = standard_registry();
        let table = OpcodeTable::build(&registry, PacketVer::new(20180620)).unwrap();
        assert_eq!(table.len(), 10);
        // reshuffled 2010+ opcodes are active at this version
        assert!(table.lookup(0x0360).is_some());
        assert!(table.lookup(0x007e).is_none());
        // outbound opcodes never enter the inbound table
        assert!(table.lookup(0x0073).is_none());
    }

    #[test]
    fn test_unknown_opcode_is_tolerated() {
        let registry = standard_registry();
        let table = OpcodeTable::build(&registry, PacketVer::new(20180620)).unwrap();
        assert!(table.lookup(0xbeef).is_none());

        let frame = [0xef, 0xbe, 0x00, 0x00];
        assert!(matches!(
            deserialize(&table, 0xbeef, &frame),
            Err(ProtocolError::UnknownOpcode { opcode: 0xbeef })
        ));

        let dispatcher = Dispatcher::new(Arc::new(table), HandlerRegistry::new());
        assert!(matches!(
            dispatcher.dispatch(SessionId::new(1), &frame),
            DispatchOutcome::UnknownOpcode(0xbeef)
        ));
    }

    #[test]
    fn test_truncated_fixed_packet() {
        let registry = standard_registry();
        let variant = registry
            .resolve(PacketKind::RequestTime, PacketVer::new(20180620))
            .unwrap();
        let result = deserialize_variant(variant, &[0x60, 0x03, 0x01]);
        assert!(matches!(
            result,
            Err(ProtocolError::TruncatedPacket {
                needed: 6,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_declared_length() {
        let registry = standard_registry();
        let variant = registry
            .resolve(PacketKind::RequestChat, PacketVer::new(20180620))
            .unwrap();

        // declared length below the header size
        let mut frame = vec![0x8c, 0x00, 0x03, 0x00];
        frame.push(0);
        assert!(matches!(
            deserialize_variant(variant, &frame),
            Err(ProtocolError::MalformedLength { declared: 3, .. })
        ));
    }

    #[test]
    fn test_array_count_inconsistent_with_length() {
        let registry = standard_registry();
        let variant = registry
            .resolve(PacketKind::ItemPickupAck, PacketVer::new(20160921))
            .unwrap();

        let values = FieldValues::new()
            .with("index", 0u16)
            .with("amount", 1u16)
            .with("item_id", 501u32)
            .with("identified", 1u8)
            .with("damaged", 0u8)
            .with("refine", 0u8)
            .with("cards", vec![0u8; 8])
            .with("location", 0u32)
            .with("item_type", 0u8)
            .with("result", 0u8)
            .with("expire_time", 0u32)
            .with("options", Vec::<FieldValues>::new());
        let mut buf = serialize_variant(variant, &values).unwrap();

        // corrupt the count so it no longer matches the declared length
        codecs::put_u8(&mut buf, 33, 4);
        assert!(matches!(
            deserialize_variant(variant, &buf),
            Err(ProtocolError::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_dispatch_invokes_handler() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let registry = standard_registry();
        let table = OpcodeTable::build(&registry, PacketVer::new(20180620)).unwrap();

        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_handler = seen.clone();
        let mut handlers = HandlerRegistry::new();
        handlers.register(PacketKind::RequestTime, move |_session, values| {
            seen_in_handler.store(values.u32("client_tick")?, Ordering::Relaxed);
            Ok(())
        });
        let dispatcher = Dispatcher::new(Arc::new(table), handlers);

        let values = FieldValues::new().with("client_tick", 0xcafe_f00du32);
        let frame = serialize(
            &registry,
            PacketKind::RequestTime,
            &values,
            PacketVer::new(20180620),
        )
        .unwrap();
        // RequestTime is inbound: serialize against its layout to forge a
        // client frame for the dispatcher.
        let outcome = dispatcher.dispatch(SessionId::new(7), &frame);
        assert!(matches!(
            outcome,
            DispatchOutcome::Handled(PacketKind::RequestTime)
        ));
        assert_eq!(seen.load(Ordering::Relaxed), 0xcafe_f00d);
    }
}
