//! # Session Registry
//!
//! Tracks every live session. Insertions and removals happen on accept
//! and disconnect; the broadcast path iterates concurrently without a
//! global lock (DashMap shards internally).

use crate::session::Session;
use dashmap::DashMap;
use roserver_core::{GuildId, MapId, PartyId, SessionId};
use std::sync::Arc;

/// All live sessions, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.id(), session);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of every session, sorted by id so fan-out order is
    /// deterministic.
    pub fn all(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    /// Sessions currently on `map`, sorted by id.
    pub fn on_map(&self, map: MapId) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().map() == Some(map))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    /// Sessions in `party`, sorted by id.
    pub fn in_party(&self, party: PartyId) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().party() == Some(party))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    /// Sessions in `guild`, sorted by id.
    pub fn in_guild(&self, guild: GuildId) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().guild() == Some(guild))
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.id());
        sessions
    }

    /// Find a session by announced character name (whisper routing).
    pub fn by_name(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| entry.value().clone())
    }

    /// Number of sessions on `map`.
    pub fn count_on_map(&self, map: MapId) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().map() == Some(map))
            .count()
    }
}
