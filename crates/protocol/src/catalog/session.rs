//! Session packets: map-server entry, login refusal, clock sync, stats

use crate::fields::FieldType::{I32, Pos3, Str, U16, U32, U8};
use crate::layout::{LayoutRegistry, LayoutVariant};

use super::PacketKind;

pub(crate) fn register(registry: &mut LayoutRegistry) {
    register_enter_map(registry);
    register_accept_enter(registry);
    register_refuse_enter(registry);
    register_login_refused(registry);
    register_request_time(registry);
    register_notify_time(registry);
    register_restart_request(registry);
    register_status_change(registry);
    register_status_change_long(registry);
}

/// Map-server entry request.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 account_id}{u32 char_id}{u32 login_id1}{u32 client_tick}{u8 sex}
/// ```
///
/// The 2010 client generation reshuffled the opcode without touching the
/// layout.
fn register_enter_map(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::EnterMap,
        vec![
            LayoutVariant::fixed(0, 0x0072)
                .field("account_id", U32)
                .field("char_id", U32)
                .field("login_id1", U32)
                .field("client_tick", U32)
                .field("sex", U8)
                .build(),
            LayoutVariant::fixed(20101124, 0x0436)
                .field("account_id", U32)
                .field("char_id", U32)
                .field("login_id1", U32)
                .field("client_tick", U32)
                .field("sex", U8)
                .build(),
        ],
    );
}

/// Map-server entry accepted.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 server_tick}{pos3 position}{u8 x_size}{u8 y_size}
/// ```
///
/// 2008 clients expect a trailing font id; 2014 clients additionally
/// expect the character's sex, which older generations take from the
/// account handshake instead.
fn register_accept_enter(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::AcceptEnter,
        vec![
            LayoutVariant::fixed(0, 0x0073)
                .field("server_tick", U32)
                .field("position", Pos3)
                .field("x_size", U8)
                .field("y_size", U8)
                .build(),
            LayoutVariant::fixed(20080102, 0x02eb)
                .field("server_tick", U32)
                .field("position", Pos3)
                .field("x_size", U8)
                .field("y_size", U8)
                .field("font", U16)
                .build(),
            LayoutVariant::fixed(20141022, 0x0a18)
                .field("server_tick", U32)
                .field("position", Pos3)
                .field("x_size", U8)
                .field("y_size", U8)
                .field("font", U16)
                .field("sex", U8)
                .build(),
        ],
    );
}

/// Map-server entry refused.
///
/// # Packet Format
/// ```text
/// {opcode}{u8 result}
/// ```
fn register_refuse_enter(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RefuseEnter,
        vec![LayoutVariant::fixed(0, 0x0074).field("result", U8).build()],
    );
}

/// Account login refused.
///
/// # Packet Format
/// ```text
/// {opcode}{u8 result}{str[20] block_date}
/// ```
///
/// Late-2010 clients widened the result code to 4 bytes to make room for
/// the extended refusal reasons.
fn register_login_refused(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::LoginRefused,
        vec![
            LayoutVariant::fixed(0, 0x006a)
                .field("result", U8)
                .field("block_date", Str(20))
                .build(),
            LayoutVariant::fixed(20101123, 0x083e)
                .field("result", U32)
                .field("block_date", Str(20))
                .build(),
        ],
    );
}

/// Clock synchronization request.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 client_tick}
/// ```
fn register_request_time(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RequestTime,
        vec![
            LayoutVariant::fixed(0, 0x007e)
                .field("client_tick", U32)
                .build(),
            LayoutVariant::fixed(20101124, 0x0360)
                .field("client_tick", U32)
                .build(),
        ],
    );
}

/// Clock synchronization answer.
///
/// # Packet Format
/// ```text
/// {opcode}{u32 server_tick}
/// ```
fn register_notify_time(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::NotifyTime,
        vec![LayoutVariant::fixed(0, 0x007f)
            .field("server_tick", U32)
            .build()],
    );
}

/// Return to character select / quit.
///
/// # Packet Format
/// ```text
/// {opcode}{u8 restart_type}
/// ```
fn register_restart_request(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::RestartRequest,
        vec![LayoutVariant::fixed(0, 0x00b2)
            .field("restart_type", U8)
            .build()],
    );
}

/// Basic-parameter change, unsigned value.
///
/// # Packet Format
/// ```text
/// {opcode}{u16 status_type}{u32 value}
/// ```
fn register_status_change(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::StatusChange,
        vec![LayoutVariant::fixed(0, 0x00b0)
            .field("status_type", U16)
            .field("value", U32)
            .build()],
    );
}

/// Basic-parameter change, signed value (karma, manner).
///
/// # Packet Format
/// ```text
/// {opcode}{u16 status_type}{i32 value}
/// ```
fn register_status_change_long(registry: &mut LayoutRegistry) {
    registry.define(
        PacketKind::StatusChangeLong,
        vec![LayoutVariant::fixed(0, 0x00b1)
            .field("status_type", U16)
            .field("value", I32)
            .build()],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::standard_registry;
    use crate::layout::WireSize;
    use roserver_core::PacketVer;

    #[test]
    fn test_accept_enter_growth() {
        let registry = standard_registry();

        let old = registry
            .resolve(PacketKind::AcceptEnter, PacketVer::new(20061218))
            .unwrap();
        assert_eq!(old.opcode, 0x0073);
        assert_eq!(old.size, WireSize::Fixed(11));

        let mid = registry
            .resolve(PacketKind::AcceptEnter, PacketVer::new(20120925))
            .unwrap();
        assert_eq!(mid.opcode, 0x02eb);
        assert_eq!(mid.size, WireSize::Fixed(13));

        let new = registry
            .resolve(PacketKind::AcceptEnter, PacketVer::new(20180620))
            .unwrap();
        assert_eq!(new.opcode, 0x0a18);
        assert_eq!(new.size, WireSize::Fixed(14));
        assert_eq!(new.field("sex").unwrap().offset, 13);
    }

    #[test]
    fn test_enter_map_opcode_reshuffle() {
        let registry = standard_registry();

        let old = registry
            .resolve(PacketKind::EnterMap, PacketVer::new(20090101))
            .unwrap();
        assert_eq!(old.opcode, 0x0072);

        let new = registry
            .resolve(PacketKind::EnterMap, PacketVer::new(20180620))
            .unwrap();
        assert_eq!(new.opcode, 0x0436);
        assert_eq!(new.size, old.size);
        assert_eq!(new.fields, old.fields);
    }

    #[test]
    fn test_login_refused_result_widening() {
        let registry = standard_registry();

        let old = registry
            .resolve(PacketKind::LoginRefused, PacketVer::new(20080102))
            .unwrap();
        assert_eq!(old.size, WireSize::Fixed(23));

        let new = registry
            .resolve(PacketKind::LoginRefused, PacketVer::new(20180620))
            .unwrap();
        assert_eq!(new.size, WireSize::Fixed(26));
        assert_eq!(new.field("block_date").unwrap().offset, 6);
    }
}
