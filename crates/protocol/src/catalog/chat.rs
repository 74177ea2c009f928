//! Chat packets: public chat, whispers, party and guild channels
//!
//! Chat text travels as a zero-terminated variable tail. Public lines
//! carry the `"Name : text"` convention assembled by the sender; the
//! server relays them verbatim.

use crate::fields::FieldType::{Str, U32, U8};
use crate::layout::{LayoutRegistry, LayoutVariant};

use super::PacketKind;

pub(crate) fn register(registry: &mut LayoutRegistry) {
    register_request_chat(registry);
    register_notify_chat(registry);
    register_own_chat(registry);
    register_whisper_to(registry);
    register_whisper_ack(registry);
    register_whisper_from(registry);
    register_party_chat(registry);
    register_guild_chat(registry);
}

/// Public chat line from the client.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{text message}
/// ```
fn register_request_chat(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RequestChat,
        vec![LayoutVariant::variable(0, 0x008c)
            .text_tail("message")
            .build()],
    );
}

/// Area chat line attributed to a unit.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{u32 source_id}{text message}
/// ```
fn register_notify_chat(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::NotifyChat,
        vec![LayoutVariant::variable(0, 0x008d)
            .field("source_id", U32)
            .text_tail("message")
            .build()],
    );
}

/// The speaking client's own chat echo.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{text message}
/// ```
fn register_own_chat(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::OwnChat,
        vec![LayoutVariant::variable(0, 0x008e)
            .text_tail("message")
            .build()],
    );
}

/// Whisper to a named character.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{str[24] target_name}{text message}
/// ```
fn register_whisper_to(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::WhisperTo,
        vec![LayoutVariant::variable(0, 0x0096)
            .field("target_name", Str(24))
            .text_tail("message")
            .build()],
    );
}

/// Whisper delivery result back to the sender.
///
/// # Packet Format
/// ```text
/// {opcode}{u8 result}
/// ```
///
/// `result`: 0 = delivered, 1 = target not found, 2 = ignored,
/// 3 = target's client rejected it. Late-2013 clients expect the target
/// char id appended so the client can key its chat tabs.
fn register_whisper_ack(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::WhisperAck,
        vec![
            LayoutVariant::fixed(0, 0x0098).field("result", U8).build(),
            LayoutVariant::fixed(20131223, 0x09df)
                .field("result", U8)
                .field("char_id", U32)
                .build(),
        ],
    );
}

/// Whisper delivered to its recipient.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{str[24] sender_name}{text message}
/// ```
///
/// Late-2013 clients expect the sender's char id and a GM flag ahead of
/// the name so the client can key chat tabs and style admin whispers.
fn register_whisper_from(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::WhisperFrom,
        vec![
            LayoutVariant::variable(0, 0x0097)
                .field("sender_name", Str(24))
                .text_tail("message")
                .build(),
            LayoutVariant::variable(20131223, 0x09de)
                .field("sender_char_id", U32)
                .field("is_admin", U8)
                .field("sender_name", Str(24))
                .text_tail("message")
                .build(),
        ],
    );
}

/// Party channel chat line.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{u32 source_id}{text message}
/// ```
fn register_party_chat(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::PartyChat,
        vec![LayoutVariant::variable(0, 0x0109)
            .field("source_id", U32)
            .text_tail("message")
            .build()],
    );
}

/// Guild channel chat line.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 packet_length}{text message}
/// ```
fn register_guild_chat(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::GuildChat,
        vec![LayoutVariant::variable(0, 0x017f)
            .text_tail("message")
            .build()],
    );
}
