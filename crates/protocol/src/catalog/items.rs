//! Item packets: ground items, inventory pickup/drop/use and their acks

use crate::fields::FieldType::{Bytes, I16, U16, U32, U8};
use crate::layout::{LayoutRegistry, LayoutVariant};

use super::PacketKind;

pub(crate) fn register(registry: &mut LayoutRegistry) {
    register_item_pickup_ack(registry);
    register_item_fall_entry(registry);
    register_item_disappear(registry);
    register_inventory_remove_ack(registry);
    register_take_item(registry);
    register_drop_item(registry);
    register_use_item(registry);
}

/// Inventory pickup acknowledgment.
///
/// # Packet Format (original)
/// ```text
/// {opcode}{u16 index}{u16 amount}{u16 item_id}
///         {u8 identified}{u8 damaged}{u8 refine}{u8[8] cards}
///         {u16 location}{u8 item_type}{u8 result}
/// ```
///
/// Three generations of growth:
/// - 2012 clients widened `item_id` to 4 bytes, widened the
///   equip-location bitfield (`location`) to 4 bytes, and appended the
///   rental expiry tick.
/// - 2015 clients turned the packet variable-length and appended the
///   random item-option array as a counted tail of 5-byte elements
///   (option id, option value, option param).
fn register_item_pickup_ack(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::ItemPickupAck,
        vec![
            LayoutVariant::fixed(20061218, 0x00a0)
                .field("index", U16)
                .field("amount", U16)
                .field("item_id", U16)
                .field("identified", U8)
                .field("damaged", U8)
                .field("refine", U8)
                .field("cards", Bytes(8))
                .field("location", U16)
                .field("item_type", U8)
                .field("result", U8)
                .build(),
            LayoutVariant::fixed(20120925, 0x0990)
                .field("index", U16)
                .field("amount", U16)
                .field("item_id", U32)
                .field("identified", U8)
                .field("damaged", U8)
                .field("refine", U8)
                .field("cards", Bytes(8))
                .field("location", U32)
                .field("item_type", U8)
                .field("result", U8)
                .field("expire_time", U32)
                .build(),
            LayoutVariant::variable(20150226, 0x0a0c)
                .field("index", U16)
                .field("amount", U16)
                .field("item_id", U32)
                .field("identified", U8)
                .field("damaged", U8)
                .field("refine", U8)
                .field("cards", Bytes(8))
                .field("location", U32)
                .field("item_type", U8)
                .field("result", U8)
                .field("expire_time", U32)
                .field("option_count", U8)
                .array_tail(
                    "options",
                    "option_count",
                    &[
                        ("option_id", U16),
                        ("option_value", I16),
                        ("option_param", U8),
                    ],
                )
                .build(),
        ],
    );
}

/// A ground item appeared in view (drop or spawn).
///
/// # Packet Format (original)
/// ```text
/// {opcode}{u32 object_id}{u16 item_id}{u8 identified}
///         {u16 x}{u16 y}{u8 sub_x}{u8 sub_y}{u16 amount}
/// ```
///
/// 2013 clients inserted the item-type field; 2018 clients widened the
/// item id to 4 bytes and appended the drop-effect pair.
fn register_item_fall_entry(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::ItemFallEntry,
        vec![
            LayoutVariant::fixed(0, 0x009e)
                .field("object_id", U32)
                .field("item_id", U16)
                .field("identified", U8)
                .field("x", U16)
                .field("y", U16)
                .field("sub_x", U8)
                .field("sub_y", U8)
                .field("amount", U16)
                .build(),
            LayoutVariant::fixed(20130320, 0x084b)
                .field("object_id", U32)
                .field("item_id", U16)
                .field("item_type", U16)
                .field("identified", U8)
                .field("x", U16)
                .field("y", U16)
                .field("sub_x", U8)
                .field("sub_y", U8)
                .field("amount", U16)
                .build(),
            LayoutVariant::fixed(20181121, 0x0add)
                .field("object_id", U32)
                .field("item_id", U32)
                .field("item_type", U16)
                .field("identified", U8)
                .field("x", U16)
                .field("y", U16)
                .field("sub_x", U8)
                .field("sub_y", U8)
                .field("amount", U16)
                .field("show_drop_effect", U8)
                .field("drop_effect_mode", U16)
                .build(),
        ],
    );
}

/// A ground item disappeared from view.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 object_id}
/// ```
fn register_item_disappear(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::ItemDisappear,
        vec![LayoutVariant::fixed(0, 0x00a1)
            .field("object_id", U32)
            .build()],
    );
}

/// An inventory slot was removed.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 index}{u16 amount}
/// ```
fn register_inventory_remove_ack(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::InventoryRemoveAck,
        vec![LayoutVariant::fixed(0, 0x00af)
            .field("index", U16)
            .field("amount", U16)
            .build()],
    );
}

/// Pick up a ground item.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 object_id}
/// ```
fn register_take_item(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::TakeItem,
        vec![
            LayoutVariant::fixed(0, 0x009f)
                .field("object_id", U32)
                .build(),
            LayoutVariant::fixed(20101124, 0x0362)
                .field("object_id", U32)
                .build(),
        ],
    );
}

/// Drop an inventory slot.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 index}{u16 amount}
/// ```
fn register_drop_item(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::DropItem,
        vec![
            LayoutVariant::fixed(0, 0x00a2)
                .field("index", U16)
                .field("amount", U16)
                .build(),
            LayoutVariant::fixed(20101124, 0x0363)
                .field("index", U16)
                .field("amount", U16)
                .build(),
        ],
    );
}

/// Use an inventory item on a unit.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 index}{u32 target_id}
/// ```
fn register_use_item(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::UseItem,
        vec![
            LayoutVariant::fixed(0, 0x00a7)
                .field("index", U16)
                .field("target_id", U32)
                .build(),
            LayoutVariant::fixed(20101124, 0x0439)
                .field("index", U16)
                .field("target_id", U32)
                .build(),
        ],
    );
}
