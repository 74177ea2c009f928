//! Session-layer packet handlers
//!
//! These handlers stand in for the game layer: enough state handling to
//! drive the full serialize/dispatch path end-to-end for every inbound
//! packet the server accepts. They run synchronously inside the event
//! loop and never block; anything slower than a map lookup would go
//! through the timer queue instead.

use roserver_core::MapId;
use roserver_network::{Broadcaster, SendTarget};
use roserver_protocol::{FieldValue, FieldValues, HandlerRegistry, PacketKind, ProtocolError};
use std::sync::Arc;
use std::time::Instant;

/// Map new sessions spawn on.
pub const START_MAP: MapId = MapId::new(0);

/// Spawn cell for new sessions.
pub const START_X: u16 = 155;
pub const START_Y: u16 = 187;

/// Visible-area radius in cells (square, Chebyshev distance).
pub const VIEW_RADIUS: u16 = 14;

/// Milliseconds since server start, the wire's tick domain.
fn tick_ms(started: Instant) -> u32 {
    started.elapsed().as_millis() as u32
}

/// Register a handler for every inbound packet kind.
pub fn register_all(
    handlers: &mut HandlerRegistry,
    broadcaster: Arc<Broadcaster>,
    started: Instant,
) {
    register_enter_map(handlers, broadcaster.clone(), started);
    register_request_time(handlers, broadcaster.clone(), started);
    register_request_move(handlers, broadcaster.clone(), started);
    register_request_action(handlers, broadcaster.clone(), started);
    register_request_chat(handlers, broadcaster.clone());
    register_whisper_to(handlers, broadcaster.clone());
    register_take_item(handlers, broadcaster.clone());
    register_drop_item(handlers, broadcaster.clone());
    register_use_item(handlers, broadcaster.clone());
    register_restart_request(handlers, broadcaster);
}

/// Map entry: place the session on the start map and confirm.
fn register_enter_map(
    handlers: &mut HandlerRegistry,
    broadcaster: Arc<Broadcaster>,
    started: Instant,
) {
    handlers.register(PacketKind::EnterMap, move |session, values| {
        let char_id = values.u32("char_id")?;
        let sex = values.u8("sex")?;

        let me = broadcaster
            .sessions()
            .get(session)
            .ok_or(ProtocolError::Handler {
                kind: PacketKind::EnterMap.name(),
                reason: "session gone".into(),
            })?;
        me.set_name(format!("Char{}", char_id));
        me.set_map(Some(START_MAP));
        me.set_position(START_X, START_Y);

        let reply = FieldValues::new()
            .with("server_tick", tick_ms(started))
            .with(
                "position",
                FieldValue::Pos {
                    x: START_X,
                    y: START_Y,
                    dir: 4,
                },
            )
            .with("x_size", 5u8)
            .with("y_size", 5u8)
            .with("font", 0u16)
            .with("sex", sex);
        broadcaster.dispatch(&SendTarget::Session(session), PacketKind::AcceptEnter, &reply);
        Ok(())
    });
}

/// Clock sync: answer with the server tick.
fn register_request_time(
    handlers: &mut HandlerRegistry,
    broadcaster: Arc<Broadcaster>,
    started: Instant,
) {
    handlers.register(PacketKind::RequestTime, move |session, _values| {
        let reply = FieldValues::new().with("server_tick", tick_ms(started));
        broadcaster.dispatch(&SendTarget::Session(session), PacketKind::NotifyTime, &reply);
        Ok(())
    });
}

/// Walk request: update the cell and show the move to nearby players.
fn register_request_move(
    handlers: &mut HandlerRegistry,
    broadcaster: Arc<Broadcaster>,
    started: Instant,
) {
    handlers.register(PacketKind::RequestMove, move |session, values| {
        let (dst_x, dst_y, _dir) = values.pos("dest")?;

        let me = broadcaster
            .sessions()
            .get(session)
            .ok_or(ProtocolError::Handler {
                kind: PacketKind::RequestMove.name(),
                reason: "session gone".into(),
            })?;
        let (src_x, src_y) = me.position();
        me.set_position(dst_x, dst_y);

        let notify = FieldValues::new()
            .with("gid", session.get())
            .with(
                "move",
                FieldValue::Move {
                    src_x,
                    src_y,
                    dst_x,
                    dst_y,
                    src_cell: 8,
                    dst_cell: 8,
                },
            )
            .with("server_tick", tick_ms(started));
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: false,
            },
            PacketKind::NotifyMove,
            &notify,
        );
        Ok(())
    });
}

/// Action request: relay the action to the visible area.
fn register_request_action(
    handlers: &mut HandlerRegistry,
    broadcaster: Arc<Broadcaster>,
    started: Instant,
) {
    handlers.register(PacketKind::RequestAction, move |session, values| {
        let target_id = values.u32("target_id")?;
        let action = values.u8("action")?;

        let notify = FieldValues::new()
            .with("src_id", session.get())
            .with("target_id", target_id)
            .with("server_tick", tick_ms(started))
            .with("src_speed", 500i32)
            .with("target_speed", 500i32)
            .with("damage", 0i32)
            .with("is_sp_damage", 0u8)
            .with("count", 1i16)
            .with("action", action)
            .with("left_damage", 0i32);
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: true,
            },
            PacketKind::NotifyAction,
            &notify,
        );
        Ok(())
    });
}

/// Public chat: echo to the speaker, relay to everyone nearby.
fn register_request_chat(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::RequestChat, move |session, values| {
        let message = values.str("message")?.to_string();

        let echo = FieldValues::new().with("message", message.clone());
        broadcaster.dispatch(&SendTarget::Session(session), PacketKind::OwnChat, &echo);

        let area = FieldValues::new()
            .with("source_id", session.get())
            .with("message", message);
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: false,
            },
            PacketKind::NotifyChat,
            &area,
        );
        Ok(())
    });
}

/// Whisper: deliver by name, ack the sender with the delivery result.
fn register_whisper_to(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::WhisperTo, move |session, values| {
        let target_name = values.str("target_name")?.to_string();
        let message = values.str("message")?.to_string();

        let sender_name = broadcaster
            .sessions()
            .get(session)
            .map(|s| s.name())
            .unwrap_or_default();

        match broadcaster.sessions().by_name(&target_name) {
            Some(target) => {
                let delivery = FieldValues::new()
                    .with("sender_char_id", session.get())
                    .with("is_admin", 0u8)
                    .with("sender_name", sender_name)
                    .with("message", message);
                broadcaster.dispatch(
                    &SendTarget::Session(target.id()),
                    PacketKind::WhisperFrom,
                    &delivery,
                );

                let ack = FieldValues::new()
                    .with("result", 0u8)
                    .with("char_id", target.id().get());
                broadcaster.dispatch(&SendTarget::Session(session), PacketKind::WhisperAck, &ack);
            }
            None => {
                let ack = FieldValues::new()
                    .with("result", 1u8) // target not found
                    .with("char_id", 0u32);
                broadcaster.dispatch(&SendTarget::Session(session), PacketKind::WhisperAck, &ack);
            }
        }
        Ok(())
    });
}

/// Ground pickup: remove the object from view, confirm the inventory add.
fn register_take_item(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::TakeItem, move |session, values| {
        let object_id = values.u32("object_id")?;

        let gone = FieldValues::new().with("object_id", object_id);
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: true,
            },
            PacketKind::ItemDisappear,
            &gone,
        );

        let ack = FieldValues::new()
            .with("index", 2u16)
            .with("amount", 1u16)
            .with("item_id", 512u32) // apple
            .with("identified", 1u8)
            .with("damaged", 0u8)
            .with("refine", 0u8)
            .with("cards", vec![0u8; 8])
            .with("location", 0u32)
            .with("item_type", 0u8)
            .with("result", 0u8)
            .with("expire_time", 0u32)
            .with("options", Vec::<FieldValues>::new());
        broadcaster.dispatch(&SendTarget::Session(session), PacketKind::ItemPickupAck, &ack);
        Ok(())
    });
}

/// Inventory drop: confirm the removal, show the ground item nearby.
fn register_drop_item(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::DropItem, move |session, values| {
        let index = values.u16("index")?;
        let amount = values.u16("amount")?;

        let ack = FieldValues::new().with("index", index).with("amount", amount);
        broadcaster.dispatch(
            &SendTarget::Session(session),
            PacketKind::InventoryRemoveAck,
            &ack,
        );

        let (x, y) = broadcaster
            .sessions()
            .get(session)
            .map(|s| s.position())
            .unwrap_or((START_X, START_Y));
        let object_id = (session.get() << 16) | u32::from(index);
        let entry = FieldValues::new()
            .with("object_id", object_id)
            .with("item_id", 512u32)
            .with("item_type", 0u16)
            .with("identified", 1u8)
            .with("x", x)
            .with("y", y)
            .with("sub_x", 8u8)
            .with("sub_y", 8u8)
            .with("amount", amount)
            .with("show_drop_effect", 0u8)
            .with("drop_effect_mode", 0u16);
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: true,
            },
            PacketKind::ItemFallEntry,
            &entry,
        );
        Ok(())
    });
}

/// Item use: consume and report the stat change.
fn register_use_item(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::UseItem, move |session, values| {
        let index = values.u16("index")?;
        let _target = values.u32("target_id")?;

        let removed = FieldValues::new().with("index", index).with("amount", 1u16);
        broadcaster.dispatch(
            &SendTarget::Session(session),
            PacketKind::InventoryRemoveAck,
            &removed,
        );

        // parameter 5 is current HP in the client's status table
        let hp = FieldValues::new()
            .with("status_type", 5u16)
            .with("value", 42u32);
        broadcaster.dispatch(&SendTarget::Session(session), PacketKind::StatusChange, &hp);
        Ok(())
    });
}

/// Return to character select: vanish from the map.
fn register_restart_request(handlers: &mut HandlerRegistry, broadcaster: Arc<Broadcaster>) {
    handlers.register(PacketKind::RestartRequest, move |session, values| {
        let restart_type = values.u8("restart_type")?;
        tracing::info!(session = session.get(), restart_type, "restart requested");

        let vanish = FieldValues::new()
            .with("gid", session.get())
            .with("vanish_type", 2u8); // logged out
        broadcaster.dispatch(
            &SendTarget::AreaAround {
                anchor: session,
                radius: VIEW_RADIUS,
                include_anchor: false,
            },
            PacketKind::NotifyVanish,
            &vanish,
        );

        if let Some(me) = broadcaster.sessions().get(session) {
            me.set_map(None);
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use roserver_core::{PacketVer, SessionId};
    use roserver_network::{Session, SessionRegistry};
    use roserver_protocol::{
        codecs, deserialize_variant, serialize, standard_registry, Dispatcher, DispatchOutcome,
        LayoutRegistry, OpcodeTable,
    };
    use std::sync::Arc;

    const VER: PacketVer = PacketVer(20180620);

    struct Harness {
        registry: Arc<LayoutRegistry>,
        dispatcher: Dispatcher,
        sessions: Arc<SessionRegistry>,
    }

    fn harness() -> Harness {
        let registry = Arc::new(standard_registry());
        let sessions = Arc::new(SessionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone(), sessions.clone()));

        let mut handlers = HandlerRegistry::new();
        register_all(&mut handlers, broadcaster, Instant::now());

        let table = Arc::new(OpcodeTable::build(&registry, VER).unwrap());
        Harness {
            registry,
            dispatcher: Dispatcher::new(table, handlers),
            sessions,
        }
    }

    fn connect(h: &Harness, id: u32) -> Arc<Session> {
        let session = Arc::new(Session::new(
            SessionId::new(id),
            "127.0.0.1:6121".parse().unwrap(),
            VER,
        ));
        h.sessions.insert(session.clone());
        session
    }

    /// Forge a client frame for an inbound kind.
    fn client_frame(h: &Harness, kind: PacketKind, values: &FieldValues) -> Vec<u8> {
        serialize(&h.registry, kind, values, VER).unwrap().to_vec()
    }

    fn enter(h: &Harness, session: &Arc<Session>, char_id: u32) {
        let frame = client_frame(
            h,
            PacketKind::EnterMap,
            &FieldValues::new()
                .with("account_id", 2_000_000u32)
                .with("char_id", char_id)
                .with("login_id1", 0u32)
                .with("client_tick", 0u32)
                .with("sex", 1u8),
        );
        let outcome = h.dispatcher.dispatch(session.id(), &frame);
        assert!(matches!(outcome, DispatchOutcome::Handled(PacketKind::EnterMap)));
    }

    #[test]
    fn test_enter_map_accepts_and_positions() {
        let h = harness();
        let session = connect(&h, 1);
        enter(&h, &session, 150001);

        assert_eq!(session.map(), Some(START_MAP));
        assert_eq!(session.position(), (START_X, START_Y));
        assert_eq!(session.name(), "Char150001");

        let frames = session.drain_outbound();
        assert_eq!(frames.len(), 1);
        assert_eq!(codecs::get_u16(&frames[0], 0), 0x0a18); // 2014+ accept layout
        assert_eq!(frames[0].len(), 14);
    }

    #[test]
    fn test_chat_echoes_and_relays_to_area() {
        let h = harness();
        let speaker = connect(&h, 1);
        let near = connect(&h, 2);
        let far = connect(&h, 3);
        enter(&h, &speaker, 1);
        enter(&h, &near, 2);
        enter(&h, &far, 3);
        far.set_position(START_X + 100, START_Y);
        for s in [&speaker, &near, &far] {
            s.drain_outbound();
        }

        let frame = client_frame(
            &h,
            PacketKind::RequestChat,
            &FieldValues::new().with("message", "Char1 : hello"),
        );
        h.dispatcher.dispatch(speaker.id(), &frame);

        // speaker gets the own-chat echo only
        let mine = speaker.drain_outbound();
        assert_eq!(mine.len(), 1);
        assert_eq!(codecs::get_u16(&mine[0], 0), 0x008e);

        // the nearby session gets the attributed line
        let theirs = near.drain_outbound();
        assert_eq!(theirs.len(), 1);
        assert_eq!(codecs::get_u16(&theirs[0], 0), 0x008d);
        assert_eq!(codecs::get_u32(&theirs[0], 4), 1);

        // out-of-range session hears nothing
        assert_eq!(far.queued(), 0);
    }

    #[test]
    fn test_whisper_routes_by_name() {
        let h = harness();
        let sender = connect(&h, 1);
        let target = connect(&h, 2);
        enter(&h, &sender, 10);
        enter(&h, &target, 20);
        sender.drain_outbound();
        target.drain_outbound();

        let frame = client_frame(
            &h,
            PacketKind::WhisperTo,
            &FieldValues::new()
                .with("target_name", "Char20")
                .with("message", "psst"),
        );
        h.dispatcher.dispatch(sender.id(), &frame);

        let delivered = target.drain_outbound();
        assert_eq!(delivered.len(), 1);
        assert_eq!(codecs::get_u16(&delivered[0], 0), 0x09de);
        let variant = h
            .registry
            .resolve(PacketKind::WhisperFrom, VER)
            .unwrap();
        let values = deserialize_variant(variant, &delivered[0]).unwrap();
        assert_eq!(values.str("sender_name").unwrap(), "Char10");
        assert_eq!(values.str("message").unwrap(), "psst");

        let acks = sender.drain_outbound();
        assert_eq!(acks.len(), 1);
        assert_eq!(codecs::get_u8(&acks[0], 2), 0); // delivered
    }

    #[test]
    fn test_whisper_to_unknown_name_acks_failure() {
        let h = harness();
        let sender = connect(&h, 1);
        enter(&h, &sender, 10);
        sender.drain_outbound();

        let frame = client_frame(
            &h,
            PacketKind::WhisperTo,
            &FieldValues::new()
                .with("target_name", "Nobody")
                .with("message", "hello?"),
        );
        h.dispatcher.dispatch(sender.id(), &frame);

        let acks = sender.drain_outbound();
        assert_eq!(acks.len(), 1);
        assert_eq!(codecs::get_u16(&acks[0], 0), 0x09df);
        assert_eq!(codecs::get_u8(&acks[0], 2), 1); // target not found
    }

    #[test]
    fn test_pickup_produces_versioned_ack() {
        let h = harness();
        let session = connect(&h, 1);
        enter(&h, &session, 1);
        session.drain_outbound();

        let frame = client_frame(
            &h,
            PacketKind::TakeItem,
            &FieldValues::new().with("object_id", 9001u32),
        );
        h.dispatcher.dispatch(session.id(), &frame);

        let frames = session.drain_outbound();
        assert_eq!(frames.len(), 2); // disappear + pickup ack
        assert_eq!(codecs::get_u16(&frames[0], 0), 0x00a1);
        assert_eq!(codecs::get_u32(&frames[0], 2), 9001);
        assert_eq!(codecs::get_u16(&frames[1], 0), 0x0a0c);
        assert_eq!(frames[1].len(), 34); // zero options
    }

    #[test]
    fn test_unknown_opcode_leaves_session_open() {
        let h = harness();
        let session = connect(&h, 1);
        enter(&h, &session, 1);

        let outcome = h.dispatcher.dispatch(session.id(), &[0xef, 0xbe, 0, 0]);
        assert!(matches!(outcome, DispatchOutcome::UnknownOpcode(0xbeef)));
        assert!(!session.is_closed());
        assert!(h.sessions.get(session.id()).is_some());
    }
}
