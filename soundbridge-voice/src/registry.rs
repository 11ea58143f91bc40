//! One-session-per-guild bookkeeping
//!
//! Authoritative map from guild to its live session, plus the per-guild
//! generation counters that outlive individual sessions. The registry has
//! no locks of its own; the connection manager serializes all access.

use crate::session::VoiceSession;
use soundbridge_common::ids::GuildId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<GuildId, Arc<VoiceSession>>,
    generations: HashMap<GuildId, u64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live session for a guild, if any
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<VoiceSession>> {
        self.sessions.get(&guild_id).cloned()
    }

    /// Install a session, returning any prior entry.
    ///
    /// The caller is responsible for destroying the prior session first.
    pub fn put(&mut self, session: Arc<VoiceSession>) -> Option<Arc<VoiceSession>> {
        self.sessions.insert(session.guild_id(), session)
    }

    /// Remove a guild's session; no-op if absent
    pub fn remove(&mut self, guild_id: GuildId) -> Option<Arc<VoiceSession>> {
        self.sessions.remove(&guild_id)
    }

    /// Next generation number for a guild; monotonic across sessions
    pub fn next_generation(&mut self, guild_id: GuildId) -> u64 {
        let counter = self.generations.entry(guild_id).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Generation currently assigned to the guild (0 if never connected)
    pub fn current_generation(&self, guild_id: GuildId) -> u64 {
        self.generations.get(&guild_id).copied().unwrap_or(0)
    }

    /// Bump the generation without installing a session.
    ///
    /// Makes any callback armed against the old generation a no-op.
    pub fn invalidate(&mut self, guild_id: GuildId) {
        self.next_generation(guild_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
