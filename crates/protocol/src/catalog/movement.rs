//! Movement packets: walk requests, unit motion, map changes, actions

use crate::fields::FieldType::{I16, I32, Move6, Pos3, Str, U16, U32, U8};
use crate::layout::{LayoutRegistry, LayoutVariant};

use super::PacketKind;

pub(crate) fn register(registry: &mut LayoutRegistry) {
    register_request_move(registry);
    register_request_action(registry);
    register_notify_move(registry);
    register_notify_vanish(registry);
    register_change_map(registry);
    register_notify_action(registry);
}

/// Walk request.
///
/// # Packet Format
/// ```text
/// {opcode}{pos3 dest}
/// ```
///
/// Reshuffled opcode in the 2010 generation, unchanged layout.
fn register_request_move(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RequestMove,
        vec![
            LayoutVariant::fixed(0, 0x0085).field("dest", Pos3).build(),
            LayoutVariant::fixed(20101124, 0x035f)
                .field("dest", Pos3)
                .build(),
        ],
    );
}

/// Action request against a target unit.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 target_id}{u8 action}
/// ```
///
/// `action` distinguishes single attack, continuous attack, sit, stand.
fn register_request_action(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RequestAction,
        vec![
            LayoutVariant::fixed(0, 0x0089)
                .field("target_id", U32)
                .field("action", U8)
                .build(),
            LayoutVariant::fixed(20101124, 0x0437)
                .field("target_id", U32)
                .field("action", U8)
                .build(),
        ],
    );
}

/// A unit started walking.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 gid}{move6 move}{u32 server_tick}
/// ```
///
/// The move segment packs source and destination cells plus the two
/// half-cell render offsets.
fn register_notify_move(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::NotifyMove,
        vec![LayoutVariant::fixed(0, 0x0086)
            .field("gid", U32)
            .field("move", Move6)
            .field("server_tick", U32)
            .build()],
    );
}

/// A unit left view.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 gid}{u8 vanish_type}
/// ```
///
/// `vanish_type`: 0 = out of sight, 1 = died, 2 = logged out, 3 = teleported.
fn register_notify_vanish(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::NotifyVanish,
        vec![LayoutVariant::fixed(0, 0x0080)
            .field("gid", U32)
            .field("vanish_type", U8)
            .build()],
    );
}

/// Move the client to another map.
///
/// # Packet Format
/// ```text
/// {opcode}{str[16] map_name}{u16 x}{u16 y}
/// ```
///
/// The map name carries the `.gat` suffix, NUL-padded to 16 bytes.
fn register_change_map(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::ChangeMap,
        vec![LayoutVariant::fixed(0, 0x0091)
            .field("map_name", Str(16))
            .field("x", U16)
            .field("y", U16)
            .build()],
    );
}

/// A unit performed an action (attack, sit, pickup animation).
///
/// # Packet Format (original)
/// ```text
/// {opcode}{u32 src_id}{u32 target_id}{u32 server_tick}
///         {i32 src_speed}{i32 target_speed}
///         {i16 damage}{i16 count}{u8 action}{i16 left_damage}
/// ```
///
/// 2008 clients widened both damage fields to 32 bits; late-2013 clients
/// inserted an SP-damage flag after the primary damage value.
fn register_notify_action(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::NotifyAction,
        vec![
            LayoutVariant::fixed(0, 0x008a)
                .field("src_id", U32)
                .field("target_id", U32)
                .field("server_tick", U32)
                .field("src_speed", I32)
                .field("target_speed", I32)
                .field("damage", I16)
                .field("count", I16)
                .field("action", U8)
                .field("left_damage", I16)
                .build(),
            LayoutVariant::fixed(20071002, 0x02e1)
                .field("src_id", U32)
                .field("target_id", U32)
                .field("server_tick", U32)
                .field("src_speed", I32)
                .field("target_speed", I32)
                .field("damage", I32)
                .field("count", I16)
                .field("action", U8)
                .field("left_damage", I32)
                .build(),
            LayoutVariant::fixed(20131223, 0x08c8)
                .field("src_id", U32)
                .field("target_id", U32)
                .field("server_tick", U32)
                .field("src_speed", I32)
                .field("target_speed", I32)
                .field("damage", I32)
                .field("is_sp_damage", U8)
                .field("count", I16)
                .field("action", U8)
                .field("left_damage", I32)
                .build(),
        ],
    );
}
