//! Event system for the soundbridge voice core
//!
//! One-to-many event broadcasting over `tokio::sync::broadcast`. Components
//! emit lifecycle events without knowing who listens; command handlers or an
//! SSE layer can subscribe. Emission never blocks and a missing receiver is
//! not an error.

use crate::ids::{ChannelId, GuildId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Voice core event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoiceEvent {
    /// A voice session reached Ready
    SessionConnected {
        guild_id: GuildId,
        channel_id: ChannelId,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A voice session was explicitly torn down
    SessionDestroyed {
        guild_id: GuildId,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Transport auto-recovery did not progress in time; session destroyed
    ReconnectAbandoned {
        guild_id: GuildId,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A named-asset playback started
    PlaybackStarted {
        guild_id: GuildId,
        asset: String,
        ephemeral: bool,
        timestamp: DateTime<Utc>,
    },

    /// A playback reached a terminal state
    ///
    /// `completed` is false when the audio pipeline reported an error.
    PlaybackFinished {
        guild_id: GuildId,
        asset: String,
        completed: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`VoiceEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoiceEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    pub fn emit(&self, event: VoiceEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
