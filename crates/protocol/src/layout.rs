//! Versioned packet layouts and the layout registry
//!
//! One [`crate::catalog::PacketKind`] owns an ordered cascade of
//! [`LayoutVariant`]s, each valid from a client build-date threshold
//! until the next variant's threshold. Resolution picks the variant with
//! the greatest threshold at or below the configured version; a kind with
//! no matching variant is unsendable under that configuration and must
//! fail registry validation before the server starts.

use crate::catalog::{Direction, PacketKind};
use crate::error::ProtocolError;
use crate::fields::{FieldDescriptor, FieldType};
use roserver_core::PacketVer;
use std::collections::HashMap;

/// Hard upper bound on any packet's total length.
///
/// Far above every defined layout; a declared variable length beyond this
/// is malformed input, not a big packet.
pub const MAX_PACKET_LENGTH: usize = 0x4000;

/// Expected-length rule for a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSize {
    /// Exactly `n` bytes including the 2-byte opcode.
    Fixed(usize),

    /// `header` bytes of fixed prefix; the u16 at `len_offset` declares
    /// the total packet length (opcode included).
    Variable { header: usize, len_offset: usize },
}

/// Variable-length tail following a layout's fixed prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableTail {
    /// The remainder of the packet is one zero-terminated text value.
    Text { role: &'static str },

    /// The remainder is `count` fixed-width elements; `count` is carried
    /// by the head field named `count_role` and derived from the element
    /// list on serialization.
    Array {
        role: &'static str,
        count_role: &'static str,
        fields: Vec<FieldDescriptor>,
        item_width: usize,
    },
}

/// One concrete byte layout of a packet, valid from `since` onward.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutVariant {
    /// Wire opcode this variant uses.
    pub opcode: u16,

    /// First client build date this layout applies to.
    pub since: PacketVer,

    /// Expected-length rule.
    pub size: WireSize,

    /// Fixed-prefix fields, ascending offset order.
    pub fields: Vec<FieldDescriptor>,

    /// Variable tail, if any. Only meaningful with `WireSize::Variable`.
    pub tail: Option<VariableTail>,
}

impl LayoutVariant {
    /// Start a fixed-length variant builder. The cursor begins after the
    /// 2-byte opcode.
    pub fn fixed(since: u32, opcode: u16) -> VariantBuilder {
        VariantBuilder {
            opcode,
            since: PacketVer::new(since),
            variable: false,
            cursor: 2,
            fields: Vec::new(),
            tail: None,
        }
    }

    /// Start a variable-length variant builder. The cursor begins after
    /// the opcode and the u16 total-length field at offset 2.
    pub fn variable(since: u32, opcode: u16) -> VariantBuilder {
        VariantBuilder {
            opcode,
            since: PacketVer::new(since),
            variable: true,
            cursor: 4,
            fields: Vec::new(),
            tail: None,
        }
    }

    /// Length of the fixed prefix (the whole packet for fixed layouts).
    pub fn header_len(&self) -> usize {
        match self.size {
            WireSize::Fixed(n) => n,
            WireSize::Variable { header, .. } => header,
        }
    }

    /// Look up a fixed-prefix field by role.
    pub fn field(&self, role: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.role == role)
    }

    /// Structural soundness check, run by registry validation.
    fn check(&self, kind: PacketKind) -> Result<(), ProtocolError> {
        let invalid = |reason: String| ProtocolError::InvalidLayout {
            kind: kind.name(),
            reason,
        };

        let header = self.header_len();
        if header < 2 {
            return Err(invalid(format!("header length {} below opcode size", header)));
        }
        if header > MAX_PACKET_LENGTH {
            return Err(invalid(format!("header length {} above maximum", header)));
        }

        let mut cursor = 2;
        if let WireSize::Variable { len_offset, .. } = self.size {
            if len_offset + 2 > header {
                return Err(invalid(format!(
                    "length field at {} outside {}-byte header",
                    len_offset, header
                )));
            }
            if len_offset == 2 {
                cursor = 4;
            }
        }

        for field in &self.fields {
            if field.offset < cursor {
                return Err(invalid(format!(
                    "field `{}` at offset {} overlaps the previous field",
                    field.role, field.offset
                )));
            }
            if field.end() > header {
                return Err(invalid(format!(
                    "field `{}` ends at {} past the {}-byte prefix",
                    field.role,
                    field.end(),
                    header
                )));
            }
            cursor = field.end();
        }

        match (&self.size, &self.tail) {
            (WireSize::Fixed(_), Some(_)) => {
                return Err(invalid("fixed-length layout carries a tail".into()));
            }
            (WireSize::Variable { .. }, Some(VariableTail::Array {
                count_role,
                fields,
                item_width,
                ..
            })) => {
                match self.field(count_role) {
                    Some(count_field) => match count_field.ty {
                        FieldType::U8 | FieldType::U16 | FieldType::U32 => {}
                        other => {
                            return Err(invalid(format!(
                                "count field `{}` has non-integer type {}",
                                count_role,
                                other.name()
                            )));
                        }
                    },
                    None => {
                        return Err(invalid(format!(
                            "count field `{}` not present in the fixed prefix",
                            count_role
                        )));
                    }
                }
                let mut item_cursor = 0;
                for field in fields {
                    if field.offset < item_cursor {
                        return Err(invalid(format!(
                            "tail field `{}` at offset {} overlaps the previous field",
                            field.role, field.offset
                        )));
                    }
                    if field.end() > *item_width {
                        return Err(invalid(format!(
                            "tail field `{}` ends past the {}-byte element",
                            field.role, item_width
                        )));
                    }
                    item_cursor = field.end();
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Builder producing a [`LayoutVariant`] with sequentially assigned
/// offsets, so the catalog stays declarative and offset arithmetic is
/// never hand-maintained.
pub struct VariantBuilder {
    opcode: u16,
    since: PacketVer,
    variable: bool,
    cursor: usize,
    fields: Vec<FieldDescriptor>,
    tail: Option<VariableTail>,
}

impl VariantBuilder {
    /// Append a field at the current cursor.
    pub fn field(mut self, role: &'static str, ty: FieldType) -> Self {
        self.fields.push(FieldDescriptor::new(self.cursor, ty, role));
        self.cursor += ty.width();
        self
    }

    /// Insert `n` bytes of zero-filled padding.
    pub fn pad(mut self, n: usize) -> Self {
        self.cursor += n;
        self
    }

    /// Attach a zero-terminated text tail (variable layouts only).
    pub fn text_tail(mut self, role: &'static str) -> Self {
        self.tail = Some(VariableTail::Text { role });
        self
    }

    /// Attach a repeated-element tail (variable layouts only). Element
    /// offsets are relative to the element start.
    pub fn array_tail(
        mut self,
        role: &'static str,
        count_role: &'static str,
        items: &[(&'static str, FieldType)],
    ) -> Self {
        let mut fields = Vec::with_capacity(items.len());
        let mut cursor = 0;
        for (item_role, ty) in items {
            fields.push(FieldDescriptor::new(cursor, *ty, item_role));
            cursor += ty.width();
        }
        self.tail = Some(VariableTail::Array {
            role,
            count_role,
            fields,
            item_width: cursor,
        });
        self
    }

    /// Finalize the variant.
    pub fn build(self) -> LayoutVariant {
        let size = if self.variable {
            WireSize::Variable {
                header: self.cursor,
                len_offset: 2,
            }
        } else {
            WireSize::Fixed(self.cursor)
        };
        LayoutVariant {
            opcode: self.opcode,
            since: self.since,
            size,
            fields: self.fields,
            tail: self.tail,
        }
    }
}

/// Registry of every packet's versioned layout cascade.
///
/// Built once at startup from the static catalog, validated against the
/// configured client version, and never mutated afterwards — the event
/// loop reads it without synchronization.
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    kinds: HashMap<PacketKind, Vec<LayoutVariant>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind's variant cascade. Variants must be supplied in
    /// ascending threshold order; `validate` enforces it.
    pub fn define(&mut self, kind: PacketKind, variants: Vec<LayoutVariant>) {
        self.kinds.insert(kind, variants);
    }

    /// Resolve the layout variant of `kind` active at `ver`.
    ///
    /// Selection policy: among the kind's variants, pick the one with the
    /// greatest threshold at or below `ver`. No match is a configuration
    /// error (`UnresolvedLayout`).
    pub fn resolve(&self, kind: PacketKind, ver: PacketVer) -> Result<&LayoutVariant, ProtocolError> {
        self.kinds
            .get(&kind)
            .and_then(|variants| variants.iter().rev().find(|v| v.since <= ver))
            .ok_or(ProtocolError::UnresolvedLayout {
                kind: kind.name(),
                ver,
            })
    }

    /// All variants of a kind, ascending by threshold.
    pub fn variants(&self, kind: PacketKind) -> Option<&[LayoutVariant]> {
        self.kinds.get(&kind).map(|v| v.as_slice())
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = PacketKind> + '_ {
        self.kinds.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Startup validation gate.
    ///
    /// Checks, for every registered kind: a non-empty cascade in strictly
    /// ascending threshold order, structural soundness of each variant,
    /// and resolvability at the configured version. Also rejects two
    /// inbound kinds claiming the same opcode at that version. Any
    /// failure must prevent server start.
    pub fn validate(&self, ver: PacketVer) -> Result<(), ProtocolError> {
        let mut inbound_opcodes: HashMap<u16, PacketKind> = HashMap::new();

        for (&kind, variants) in &self.kinds {
            if variants.is_empty() {
                return Err(ProtocolError::InvalidLayout {
                    kind: kind.name(),
                    reason: "no layout variants defined".into(),
                });
            }

            let mut last_since = None;
            for variant in variants {
                if let Some(prev) = last_since {
                    if variant.since <= prev {
                        return Err(ProtocolError::InvalidLayout {
                            kind: kind.name(),
                            reason: format!(
                                "variant thresholds not strictly ascending at {}",
                                variant.since
                            ),
                        });
                    }
                }
                last_since = Some(variant.since);
                variant.check(kind)?;
            }

            let active = self.resolve(kind, ver)?;

            if kind.direction() == Direction::ClientToServer {
                if let Some(&other) = inbound_opcodes.get(&active.opcode) {
                    return Err(ProtocolError::DuplicateOpcode {
                        opcode: active.opcode,
                        kind: kind.name(),
                        other: other.name(),
                    });
                }
                inbound_opcodes.insert(active.opcode, kind);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_threshold_registry() -> LayoutRegistry {
        let mut reg = LayoutRegistry::new();
        reg.define(
            PacketKind::ItemPickupAck,
            vec![
                LayoutVariant::fixed(20061218, 0x00a0)
                    .field("index", FieldType::U16)
                    .build(),
                LayoutVariant::fixed(20120925, 0x0990)
                    .field("index", FieldType::U16)
                    .field("item_id", FieldType::U32)
                    .build(),
                LayoutVariant::fixed(20150226, 0x0a0c)
                    .field("index", FieldType::U16)
                    .field("item_id", FieldType::U32)
                    .field("favorite", FieldType::U8)
                    .build(),
            ],
        );
        reg
    }

    #[test]
    fn test_resolve_picks_greatest_threshold_at_or_below() {
        let reg = three_threshold_registry();

        // Inside [t2, t3): always the t2 variant.
        for ver in [20120925, 20130101, 20150225] {
            let variant = reg
                .resolve(PacketKind::ItemPickupAck, PacketVer::new(ver))
                .unwrap();
            assert_eq!(variant.opcode, 0x0990, "ver {}", ver);
        }

        // At and after t3: the t3 variant.
        for ver in [20150226, 20160921, 20991231] {
            let variant = reg
                .resolve(PacketKind::ItemPickupAck, PacketVer::new(ver))
                .unwrap();
            assert_eq!(variant.opcode, 0x0a0c, "ver {}", ver);
        }

        // Between t1 and t2: the t1 variant.
        let variant = reg
            .resolve(PacketKind::ItemPickupAck, PacketVer::new(20100101))
            .unwrap();
        assert_eq!(variant.opcode, 0x00a0);
    }

    #[test]
    fn test_resolve_fails_before_earliest_threshold() {
        let reg = three_threshold_registry();
        let result = reg.resolve(PacketKind::ItemPickupAck, PacketVer::new(20050101));
        assert!(matches!(
            result,
            Err(ProtocolError::UnresolvedLayout { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_uncovered_version() {
        let reg = three_threshold_registry();
        assert!(reg.validate(PacketVer::new(20180620)).is_ok());
        assert!(matches!(
            reg.validate(PacketVer::new(20050101)),
            Err(ProtocolError::UnresolvedLayout { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_cascade() {
        let mut reg = LayoutRegistry::new();
        reg.define(PacketKind::NotifyTime, vec![]);
        assert!(matches!(
            reg.validate(PacketVer::new(20180620)),
            Err(ProtocolError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unsorted_thresholds() {
        let mut reg = LayoutRegistry::new();
        reg.define(
            PacketKind::NotifyTime,
            vec![
                LayoutVariant::fixed(20120925, 0x007f)
                    .field("server_tick", FieldType::U32)
                    .build(),
                LayoutVariant::fixed(20061218, 0x0a27)
                    .field("server_tick", FieldType::U32)
                    .build(),
            ],
        );
        assert!(matches!(
            reg.validate(PacketVer::new(20180620)),
            Err(ProtocolError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_inbound_opcode() {
        let mut reg = LayoutRegistry::new();
        reg.define(
            PacketKind::RequestTime,
            vec![LayoutVariant::fixed(0, 0x007e)
                .field("client_tick", FieldType::U32)
                .build()],
        );
        reg.define(
            PacketKind::TakeItem,
            vec![LayoutVariant::fixed(0, 0x007e)
                .field("object_id", FieldType::U32)
                .build()],
        );
        assert!(matches!(
            reg.validate(PacketVer::new(20180620)),
            Err(ProtocolError::DuplicateOpcode { opcode: 0x007e, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_array_tail_without_count_field() {
        let mut reg = LayoutRegistry::new();
        reg.define(
            PacketKind::ItemPickupAck,
            vec![LayoutVariant::variable(0, 0x0a0c)
                .field("index", FieldType::U16)
                .array_tail(
                    "options",
                    "option_count",
                    &[("option_id", FieldType::U16), ("option_value", FieldType::I16)],
                )
                .build()],
        );
        assert!(matches!(
            reg.validate(PacketVer::new(20180620)),
            Err(ProtocolError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn test_builder_assigns_sequential_offsets() {
        let variant = LayoutVariant::fixed(0, 0x0091)
            .field("map_name", FieldType::Str(16))
            .field("x", FieldType::U16)
            .field("y", FieldType::U16)
            .build();

        assert_eq!(variant.size, WireSize::Fixed(22));
        assert_eq!(variant.field("map_name").unwrap().offset, 2);
        assert_eq!(variant.field("x").unwrap().offset, 18);
        assert_eq!(variant.field("y").unwrap().offset, 20);
    }
}
