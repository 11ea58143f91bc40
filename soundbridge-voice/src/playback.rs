//! Named-asset playback with per-guild mutual exclusion
//!
//! A guild runs at most one playback at a time. The busy flag is a slot in
//! a map, reserved atomically before any other work, so a racing request
//! fails fast with `Busy` and mutates nothing. When no session exists the
//! orchestrator can auto-join the requester's channel; such an ephemeral
//! session is torn down again when the playback ends, on every path.

use crate::connection::ConnectionManager;
use crate::error::PlaybackError;
use crate::gateway::{AssetResolver, TrackEnd, TrackHandle, VoiceChannelHandle};
use chrono::Utc;
use soundbridge_common::events::{EventBus, VoiceEvent};
use soundbridge_common::ids::GuildId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One in-flight playback for a guild.
///
/// Presence in the slot map *is* the busy flag; removing the entry is the
/// exactly-once release, however the playback ends.
#[derive(Debug, Clone)]
struct PlaybackSlot {
    asset: String,
    /// Session was auto-created for this playback and leaves with it
    ephemeral: bool,
    /// Generation of the session the playback was attached to
    generation: u64,
}

/// Handle returned to the command layer for a started playback
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    pub guild_id: GuildId,
    pub asset: String,
    pub ephemeral: bool,
}

type SlotMap = Mutex<HashMap<GuildId, PlaybackSlot>>;

/// Accepts playback requests and serializes them per guild
pub struct PlaybackOrchestrator {
    connections: Arc<ConnectionManager>,
    resolver: Arc<dyn AssetResolver>,
    slots: Arc<SlotMap>,
    events: EventBus,
}

impl PlaybackOrchestrator {
    pub fn new(
        connections: Arc<ConnectionManager>,
        resolver: Arc<dyn AssetResolver>,
        events: EventBus,
    ) -> Self {
        Self {
            connections,
            resolver,
            slots: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Whether a playback is currently in flight for the guild
    pub fn busy(&self, guild_id: GuildId) -> bool {
        lock_slots(&self.slots).contains_key(&guild_id)
    }

    /// Play a named asset in the guild's voice session.
    ///
    /// With no live session, the requester's own channel (when given) is
    /// auto-joined for the duration of this one playback. Fails fast with
    /// [`PlaybackError::Busy`] while another playback is in flight; every
    /// other failure clears the busy flag and tears down any session that
    /// was auto-created for this call.
    pub async fn play_named(
        &self,
        guild_id: GuildId,
        name: &str,
        requester_channel: Option<VoiceChannelHandle>,
    ) -> Result<PlaybackHandle, PlaybackError> {
        {
            let mut slots = lock_slots(&self.slots);
            if slots.contains_key(&guild_id) {
                debug!(%guild_id, asset = name, "playback refused: busy");
                return Err(PlaybackError::Busy);
            }
            slots.insert(
                guild_id,
                PlaybackSlot {
                    asset: name.to_string(),
                    ephemeral: false,
                    generation: 0,
                },
            );
        }

        match self.start_playback(guild_id, name, requester_channel).await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                // Unconditional cleanup: clear busy and tear down a session
                // auto-created for this request, whatever step failed
                release_slot(&self.slots, &self.connections, guild_id).await;
                Err(err)
            }
        }
    }

    async fn start_playback(
        &self,
        guild_id: GuildId,
        name: &str,
        requester_channel: Option<VoiceChannelHandle>,
    ) -> Result<PlaybackHandle, PlaybackError> {
        let resource = self
            .resolver
            .resolve(guild_id, name)
            .await
            .ok_or_else(|| PlaybackError::UnknownAsset(name.to_string()))?;

        let (session, ephemeral) = match self.connections.session(guild_id).await {
            Some(session) => (session, false),
            None => match requester_channel {
                Some(channel) => {
                    debug!(%guild_id, channel_id = %channel.channel_id, "no session; auto-joining requester's channel");
                    let session = self.connections.connect(channel).await?;
                    (session, true)
                }
                None => return Err(PlaybackError::NoVoiceTarget),
            },
        };

        // Record what cleanup must undo before attaching the track
        {
            let mut slots = lock_slots(&self.slots);
            if let Some(slot) = slots.get_mut(&guild_id) {
                slot.ephemeral = ephemeral;
                slot.generation = session.generation();
            }
        }

        let track = session
            .play(resource)
            .await
            .map_err(PlaybackError::PlaybackFailed)?;

        info!(%guild_id, asset = name, ephemeral, "playback started");
        self.events.emit(VoiceEvent::PlaybackStarted {
            guild_id,
            asset: name.to_string(),
            ephemeral,
            timestamp: Utc::now(),
        });

        self.watch_track(guild_id, name.to_string(), track);

        Ok(PlaybackHandle {
            guild_id,
            asset: name.to_string(),
            ephemeral,
        })
    }

    /// Observe the track's terminal state and release the slot exactly once
    fn watch_track(&self, guild_id: GuildId, asset: String, track: Box<dyn TrackHandle>) {
        let slots = Arc::clone(&self.slots);
        let connections = Arc::clone(&self.connections);
        let events = self.events.clone();

        tokio::spawn(async move {
            let end = track.finished().await;
            let completed = matches!(end, TrackEnd::Finished);
            match &end {
                TrackEnd::Finished => debug!(%guild_id, %asset, "playback finished"),
                TrackEnd::Errored(reason) => {
                    warn!(%guild_id, %asset, %reason, "playback ended with error")
                }
            }

            if let Some(slot) = release_slot(&slots, &connections, guild_id).await {
                events.emit(VoiceEvent::PlaybackFinished {
                    guild_id,
                    asset: slot.asset,
                    completed,
                    timestamp: Utc::now(),
                });
            }
        });
    }
}

/// Take the guild's slot if present and undo what it recorded.
///
/// The map removal is the consumed marker: only the first caller gets the
/// slot, so cleanup runs exactly once no matter how many paths race here.
/// An ephemeral session is only torn down while its generation still owns
/// the guild; a manual disconnect or newer connect wins.
async fn release_slot(
    slots: &SlotMap,
    connections: &Arc<ConnectionManager>,
    guild_id: GuildId,
) -> Option<PlaybackSlot> {
    let slot = lock_slots(slots).remove(&guild_id)?;
    if slot.ephemeral {
        connections
            .disconnect_if_generation(guild_id, slot.generation)
            .await;
    }
    Some(slot)
}

/// Slot map guard; recovers from poisoning since slots stay consistent
fn lock_slots(slots: &SlotMap) -> MutexGuard<'_, HashMap<GuildId, PlaybackSlot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
