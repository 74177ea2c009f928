//! # Send-Target Resolver
//!
//! Expands a logical destination into concrete sessions and enqueues a
//! serialized packet on each. Because sessions may have negotiated
//! different client versions, serialization runs per target: one logical
//! broadcast can put differently laid-out bytes on different wires.
//!
//! A single failing target never aborts a broadcast — the failure is
//! logged, the target skipped, and the remaining sessions still get
//! their packet.

use crate::registry::SessionRegistry;
use crate::session::Session;
use roserver_core::{GuildId, MapId, PartyId, SessionId};
use roserver_protocol::{serialize, FieldValues, LayoutRegistry, PacketKind};
use std::sync::Arc;

/// Logical destination for an outbound packet (closed set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    /// Every live session.
    All,

    /// Every session currently on a map.
    Map(MapId),

    /// Sessions on the anchor's map within a square radius of its
    /// position (the client's visible-area semantics use Chebyshev
    /// distance). `include_anchor` controls whether the anchor itself
    /// receives the packet.
    AreaAround {
        anchor: SessionId,
        radius: u16,
        include_anchor: bool,
    },

    /// Every session in a party, optionally excluding one member
    /// (typically the originator).
    Party {
        party: PartyId,
        exclude: Option<SessionId>,
    },

    /// Every session in a guild, optionally excluding one member.
    Guild {
        guild: GuildId,
        exclude: Option<SessionId>,
    },

    /// Exactly one session.
    Session(SessionId),
}

/// Resolves send targets and fans serialized packets out to them.
pub struct Broadcaster {
    layouts: Arc<LayoutRegistry>,
    sessions: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(layouts: Arc<LayoutRegistry>, sessions: Arc<SessionRegistry>) -> Self {
        Self { layouts, sessions }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Serialize `kind` for every resolved target and enqueue it.
    ///
    /// Returns the number of sessions actually enqueued; zero is valid
    /// (an empty map, a one-member party with `exclude` set). Each
    /// session gets bytes laid out for its own negotiated version. A
    /// per-target serialize failure is logged and skipped.
    pub fn dispatch(&self, target: &SendTarget, kind: PacketKind, values: &FieldValues) -> usize {
        let targets = self.resolve(target);
        let mut enqueued = 0;

        for session in &targets {
            match serialize(&self.layouts, kind, values, session.packet_ver()) {
                Ok(buf) => {
                    session.enqueue(buf.freeze());
                    enqueued += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        session = session.id().get(),
                        kind = %kind,
                        ver = %session.packet_ver(),
                        error = %e,
                        "skipping target, serialization failed"
                    );
                }
            }
        }

        tracing::trace!(kind = %kind, targets = targets.len(), enqueued, "broadcast");
        enqueued
    }

    /// Expand a target to its concrete sessions, sorted by id.
    fn resolve(&self, target: &SendTarget) -> Vec<Arc<Session>> {
        match target {
            SendTarget::All => self.sessions.all(),

            SendTarget::Map(map) => self.sessions.on_map(*map),

            SendTarget::AreaAround {
                anchor,
                radius,
                include_anchor,
            } => {
                let Some(anchor_session) = self.sessions.get(*anchor) else {
                    return Vec::new();
                };
                let Some(map) = anchor_session.map() else {
                    return Vec::new();
                };
                let (ax, ay) = anchor_session.position();
                self.sessions
                    .on_map(map)
                    .into_iter()
                    .filter(|s| {
                        if s.id() == *anchor {
                            return *include_anchor;
                        }
                        let (x, y) = s.position();
                        let dx = x.abs_diff(ax);
                        let dy = y.abs_diff(ay);
                        dx.max(dy) <= *radius
                    })
                    .collect()
            }

            SendTarget::Party { party, exclude } => self
                .sessions
                .in_party(*party)
                .into_iter()
                .filter(|s| Some(s.id()) != *exclude)
                .collect(),

            SendTarget::Guild { guild, exclude } => self
                .sessions
                .in_guild(*guild)
                .into_iter()
                .filter(|s| Some(s.id()) != *exclude)
                .collect(),

            SendTarget::Session(id) => self.sessions.get(*id).into_iter().collect(),
        }
    }
}
