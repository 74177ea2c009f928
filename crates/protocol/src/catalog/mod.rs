//! # Packet Catalog
//!
//! The flat enumeration of every packet the map server speaks, with each
//! packet's full layout cascade across client build dates.
//!
//! ## Packet Organization
//!
//! Packets are grouped into the following modules:
//! - [`session`]: map-server entry, login refusal, tick exchange, stats
//! - [`movement`]: walk requests, unit movement/vanish, map changes, actions
//! - [`items`]: ground items, inventory pickup/drop/use and their acks
//! - [`chat`]: public chat, whispers, party and guild channels
//!
//! ## Naming Convention
//!
//! A [`PacketKind`] names the semantic event, not a wire opcode: opcodes
//! change between client generations (the 2010+ clients reshuffled most
//! request opcodes), while the kind is stable. Exactly one kind exists
//! per semantic event.
//!
//! ## Opcode Spaces
//!
//! Client-to-server and server-to-client packets use separate opcode
//! spaces; [`Direction`] records which space a kind belongs to. Only
//! client-to-server kinds enter the inbound opcode resolution table.

pub mod chat;
pub mod items;
pub mod movement;
pub mod session;

use crate::layout::LayoutRegistry;
use std::fmt;

/// Which peer sends a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by the game client, parsed by the server.
    ClientToServer,

    /// Built by the server, parsed by the client.
    ServerToClient,
}

/// Logical packet identifier, stable across all client versions.
///
/// Each kind owns an ordered cascade of layout variants in the
/// [`LayoutRegistry`]; the variant active for a connection depends only
/// on that connection's negotiated build date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    //=== Client -> Server ===//
    /// Client announces itself to the map server after character select.
    ///
    /// # Packet Format
    /// ```text
    /// {opcode}{u32 account_id}{u32 char_id}{u32 login_id1}{u32 client_tick}{u8 sex}
    /// ```
    EnterMap,

    /// Clock synchronization request carrying the client's tick counter.
    RequestTime,

    /// Walk request with the packed destination cell.
    ///
    /// # Packet Format
    /// ```text
    /// {opcode}{pos3 dest}
    /// ```
    RequestMove,

    /// Action request (attack, sit, stand) against a target unit.
    RequestAction,

    /// Public chat line, zero-terminated text.
    RequestChat,

    /// Whisper to a named character.
    ///
    /// # Packet Format
    /// ```text
    /// {opcode}{u16 packet_length}{str[24] target_name}{text message}
    /// ```
    WhisperTo,

    /// Use an inventory item (consumables).
    UseItem,

    /// Pick up a ground item by object id.
    TakeItem,

    /// Drop an inventory slot onto the ground.
    DropItem,

    /// Return to character select / quit request.
    RestartRequest,

    //=== Server -> Client ===//
    /// Map-server entry accepted; carries the authoritative spawn state.
    AcceptEnter,

    /// Map-server entry refused.
    RefuseEnter,

    /// Account-level login refused (bad credentials, ban).
    LoginRefused,

    /// Clock synchronization answer.
    NotifyTime,

    /// Move the client to another map at the given cell.
    ///
    /// # Packet Format
    /// ```text
    /// {opcode}{str[16] map_name}{u16 x}{u16 y}
    /// ```
    ChangeMap,

    /// A unit started walking; carries the packed move segment.
    NotifyMove,

    /// A unit left view (out of sight, died, logged out, teleported).
    NotifyVanish,

    /// A unit performed an action; carries damage bookkeeping.
    NotifyAction,

    /// Inventory pickup acknowledgment.
    ///
    /// The layout grew three times across client history: the 2012
    /// generation widened the item id to 4 bytes and the equip-location
    /// bitfield to 4 bytes, and the 2015 generation appended the random
    /// item-option array as a counted variable tail.
    ItemPickupAck,

    /// A ground item appeared in view.
    ItemFallEntry,

    /// A ground item disappeared from view.
    ItemDisappear,

    /// An inventory slot was removed (drop, consume, steal).
    InventoryRemoveAck,

    /// Basic-parameter change (HP, SP, weight...), u32 value.
    StatusChange,

    /// Basic-parameter change carrying a signed 32-bit value.
    StatusChangeLong,

    /// Area chat line attributed to a source unit.
    NotifyChat,

    /// The speaking client's own chat echo.
    OwnChat,

    /// Whisper delivery result back to the sender.
    WhisperAck,

    /// Whisper delivered to its recipient.
    ///
    /// # Packet Format
    /// ```text
    /// {opcode}{u16 packet_length}{str[24] sender_name}{text message}
    /// ```
    WhisperFrom,

    /// Party channel chat line.
    PartyChat,

    /// Guild channel chat line.
    GuildChat,
}

impl PacketKind {
    /// Which opcode space this kind lives in.
    pub const fn direction(self) -> Direction {
        match self {
            Self::EnterMap
            | Self::RequestTime
            | Self::RequestMove
            | Self::RequestAction
            | Self::RequestChat
            | Self::WhisperTo
            | Self::UseItem
            | Self::TakeItem
            | Self::DropItem
            | Self::RestartRequest => Direction::ClientToServer,

            Self::AcceptEnter
            | Self::RefuseEnter
            | Self::LoginRefused
            | Self::NotifyTime
            | Self::ChangeMap
            | Self::NotifyMove
            | Self::NotifyVanish
            | Self::NotifyAction
            | Self::ItemPickupAck
            | Self::ItemFallEntry
            | Self::ItemDisappear
            | Self::InventoryRemoveAck
            | Self::StatusChange
            | Self::StatusChangeLong
            | Self::NotifyChat
            | Self::OwnChat
            | Self::WhisperAck
            | Self::WhisperFrom
            | Self::PartyChat
            | Self::GuildChat => Direction::ServerToClient,
        }
    }

    /// Stable name used in logs and diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::EnterMap => "EnterMap",
            Self::RequestTime => "RequestTime",
            Self::RequestMove => "RequestMove",
            Self::RequestAction => "RequestAction",
            Self::RequestChat => "RequestChat",
            Self::WhisperTo => "WhisperTo",
            Self::UseItem => "UseItem",
            Self::TakeItem => "TakeItem",
            Self::DropItem => "DropItem",
            Self::RestartRequest => "RestartRequest",
            Self::AcceptEnter => "AcceptEnter",
            Self::RefuseEnter => "RefuseEnter",
            Self::LoginRefused => "LoginRefused",
            Self::NotifyTime => "NotifyTime",
            Self::ChangeMap => "ChangeMap",
            Self::NotifyMove => "NotifyMove",
            Self::NotifyVanish => "NotifyVanish",
            Self::NotifyAction => "NotifyAction",
            Self::ItemPickupAck => "ItemPickupAck",
            Self::ItemFallEntry => "ItemFallEntry",
            Self::ItemDisappear => "ItemDisappear",
            Self::InventoryRemoveAck => "InventoryRemoveAck",
            Self::StatusChange => "StatusChange",
            Self::StatusChangeLong => "StatusChangeLong",
            Self::NotifyChat => "NotifyChat",
            Self::OwnChat => "OwnChat",
            Self::WhisperAck => "WhisperAck",
            Self::WhisperFrom => "WhisperFrom",
            Self::PartyChat => "PartyChat",
            Self::GuildChat => "GuildChat",
        }
    }

    /// Every kind, for iteration in validation and tests.
    pub const fn all() -> &'static [PacketKind] {
        &[
            Self::EnterMap,
            Self::RequestTime,
            Self::RequestMove,
            Self::RequestAction,
            Self::RequestChat,
            Self::WhisperTo,
            Self::UseItem,
            Self::TakeItem,
            Self::DropItem,
            Self::RestartRequest,
            Self::AcceptEnter,
            Self::RefuseEnter,
            Self::LoginRefused,
            Self::NotifyTime,
            Self::ChangeMap,
            Self::NotifyMove,
            Self::NotifyVanish,
            Self::NotifyAction,
            Self::ItemPickupAck,
            Self::ItemFallEntry,
            Self::ItemDisappear,
            Self::InventoryRemoveAck,
            Self::StatusChange,
            Self::StatusChangeLong,
            Self::NotifyChat,
            Self::OwnChat,
            Self::WhisperAck,
            Self::WhisperFrom,
            Self::PartyChat,
            Self::GuildChat,
        ]
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the registry of every packet this server speaks.
///
/// The result is static data: construct once at startup, run
/// [`LayoutRegistry::validate`] against the configured client version,
/// then share immutably.
pub fn standard_registry() -> LayoutRegistry {
    let mut registry = LayoutRegistry::new();
    session::register(&mut registry);
    movement::register(&mut registry);
    items::register(&mut registry);
    chat::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use roserver_core::PacketVer;

    #[test]
    fn test_every_kind_is_registered() {
        let registry = standard_registry();
        for &kind in PacketKind::all() {
            assert!(
                registry.variants(kind).is_some(),
                "{} missing from the standard registry",
                kind
            );
        }
        assert_eq!(registry.len(), PacketKind::all().len());
    }

    #[test]
    fn test_standard_registry_validates_for_supported_versions() {
        let registry = standard_registry();
        for ver in [20120925, 20150226, 20160921, 20180620, 20190530] {
            registry
                .validate(PacketVer::new(ver))
                .unwrap_or_else(|e| panic!("validation failed at {}: {}", ver, e));
        }
    }

    #[test]
    fn test_direction_split() {
        let inbound = PacketKind::all()
            .iter()
            .filter(|k| k.direction() == Direction::ClientToServer)
            .count();
        assert_eq!(inbound, 10);
    }
}
