//! Session establishment, teardown, and reconnect supervision
//!
//! `connect` never reuses an existing session: the old one is destroyed
//! first, so a guild can never hold two stacked connections. After an
//! unexpected `Disconnected` the transport gets a bounded grace window to
//! recover on its own; if nothing happens the supervisor destroys the
//! session rather than retrying forever. Generation numbers, not locks,
//! arbitrate between a supervisor, a manual disconnect, and a newer connect.

use crate::error::ConnectError;
use crate::gateway::{StateFeed, VoiceChannelHandle, VoiceGateway};
use crate::registry::SessionRegistry;
use crate::session::{ConnectionState, VoiceSession};
use chrono::Utc;
use soundbridge_common::config::VoiceSettings;
use soundbridge_common::events::{EventBus, VoiceEvent};
use soundbridge_common::ids::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Opens and tears down voice sessions, one per guild at most
pub struct ConnectionManager {
    gateway: Arc<dyn VoiceGateway>,
    registry: Mutex<SessionRegistry>,
    events: EventBus,
    connect_timeout: Duration,
    reconnect_grace: Duration,
}

impl ConnectionManager {
    pub fn new(gateway: Arc<dyn VoiceGateway>, settings: &VoiceSettings, events: EventBus) -> Self {
        Self {
            gateway,
            registry: Mutex::new(SessionRegistry::new()),
            events,
            connect_timeout: settings.connect_timeout(),
            reconnect_grace: settings.reconnect_grace(),
        }
    }

    /// Live session for a guild, if any
    pub async fn session(&self, guild_id: GuildId) -> Option<Arc<VoiceSession>> {
        self.registry.lock().await.get(guild_id)
    }

    /// Open a voice session on the given channel.
    ///
    /// Any existing session for the guild is destroyed first, never reused.
    /// The new session must reach `Ready` within the configured budget;
    /// otherwise it is destroyed, removed, and the call fails with
    /// [`ConnectError::Timeout`]. A gateway refusal surfaces as
    /// [`ConnectError::Rejected`] and leaves the registry untouched. An
    /// attempt whose generation is overtaken while the gateway join is in
    /// flight discards its own transport and fails rejected; the newer
    /// attempt's session is never displaced.
    pub async fn connect(
        self: &Arc<Self>,
        channel: VoiceChannelHandle,
    ) -> Result<Arc<VoiceSession>, ConnectError> {
        let guild_id = channel.guild_id;

        let (generation, prior) = {
            let mut registry = self.registry.lock().await;
            (registry.next_generation(guild_id), registry.remove(guild_id))
        };
        if let Some(prior) = prior {
            debug!(%guild_id, prior_generation = prior.generation(), "replacing existing session");
            prior.destroy().await;
        }

        let (state_tx, _) = watch::channel(ConnectionState::Signalling);
        let states: StateFeed = Arc::new(state_tx);
        let transport = self.gateway.join(&channel, Arc::clone(&states)).await?;
        let session = Arc::new(VoiceSession::new(
            channel.clone(),
            generation,
            states,
            transport,
        ));

        // Install only while this attempt still owns the guild's newest
        // generation; a connect or disconnect that ran during `join` wins.
        let (installed, displaced) = {
            let mut registry = self.registry.lock().await;
            if registry.current_generation(guild_id) == generation {
                (true, registry.put(Arc::clone(&session)))
            } else {
                (false, None)
            }
        };
        if !installed {
            debug!(%guild_id, generation, "connect overtaken during join; discarding attempt");
            session.destroy().await;
            return Err(superseded());
        }
        // A matching generation means the slot was vacated above and nothing
        // newer has installed; still, never drop a session undestroyed
        if let Some(displaced) = displaced {
            displaced.destroy().await;
        }

        // Armed for this generation only; a manual disconnect or a newer
        // connect makes its destroy a no-op.
        self.spawn_supervisor(Arc::clone(&session));

        debug!(%guild_id, generation, "waiting for session to become ready");
        match session
            .await_state(self.connect_timeout, |s| *s == ConnectionState::Ready)
            .await
        {
            Some(_) => {
                // The wait can race a takeover of the guild; only the attempt
                // that still owns the generation reports success
                if self.registry.lock().await.current_generation(guild_id) != generation {
                    debug!(%guild_id, generation, "connect overtaken while waiting for ready");
                    session.destroy().await;
                    return Err(superseded());
                }
                info!(%guild_id, generation, channel_id = %channel.channel_id, "voice session ready");
                self.events.emit(VoiceEvent::SessionConnected {
                    guild_id,
                    channel_id: channel.channel_id,
                    generation,
                    timestamp: Utc::now(),
                });
                Ok(session)
            }
            None => {
                warn!(%guild_id, generation, "session never became ready; destroying");
                self.remove_if_generation(guild_id, generation).await;
                session.destroy().await;
                Err(ConnectError::Timeout)
            }
        }
    }

    /// Explicit teardown. Returns false if no session exists (idempotent).
    ///
    /// Bumps the guild's generation so any in-flight supervisor or stale
    /// connect completion for the old session becomes a no-op.
    pub async fn disconnect(&self, guild_id: GuildId) -> bool {
        let removed = {
            let mut registry = self.registry.lock().await;
            let removed = registry.remove(guild_id);
            if removed.is_some() {
                registry.invalidate(guild_id);
            }
            removed
        };

        match removed {
            Some(session) => {
                info!(%guild_id, generation = session.generation(), "voice session disconnected");
                session.destroy().await;
                self.events.emit(VoiceEvent::SessionDestroyed {
                    guild_id,
                    generation: session.generation(),
                    timestamp: Utc::now(),
                });
                true
            }
            None => false,
        }
    }

    /// Teardown that only fires while the registry still holds `generation`.
    ///
    /// Used by ephemeral-playback cleanup: if a manual disconnect or a newer
    /// connect has taken over the guild since the playback was attached,
    /// this does nothing.
    pub async fn disconnect_if_generation(&self, guild_id: GuildId, generation: u64) -> bool {
        let removed = {
            let mut registry = self.registry.lock().await;
            match registry.get(guild_id) {
                Some(session) if session.generation() == generation => {
                    let removed = registry.remove(guild_id);
                    registry.invalidate(guild_id);
                    removed
                }
                _ => None,
            }
        };

        match removed {
            Some(session) => {
                info!(%guild_id, generation, "ephemeral voice session disconnected");
                session.destroy().await;
                self.events.emit(VoiceEvent::SessionDestroyed {
                    guild_id,
                    generation,
                    timestamp: Utc::now(),
                });
                true
            }
            None => false,
        }
    }

    /// Remove the guild's session only if it is still the given generation
    async fn remove_if_generation(
        &self,
        guild_id: GuildId,
        generation: u64,
    ) -> Option<Arc<VoiceSession>> {
        let mut registry = self.registry.lock().await;
        match registry.get(guild_id) {
            Some(session) if session.generation() == generation => registry.remove(guild_id),
            _ => None,
        }
    }

    /// Watch a session for unexpected drops, for the lifetime of its
    /// generation.
    ///
    /// On `Disconnected` the transport gets `reconnect_grace` to show signs
    /// of recovery (`Signalling` or `Connecting`). If it does, supervision
    /// continues; if not, the session is destroyed, generation permitting.
    fn spawn_supervisor(self: &Arc<Self>, session: Arc<VoiceSession>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let guild_id = session.guild_id();
            let generation = session.generation();
            let mut states = session.subscribe();

            loop {
                let state = match states
                    .wait_for(|s| {
                        matches!(s, ConnectionState::Disconnected | ConnectionState::Destroyed)
                    })
                    .await
                {
                    Ok(state) => *state,
                    Err(_) => return,
                };
                if state == ConnectionState::Destroyed {
                    return;
                }

                debug!(%guild_id, generation, "transport dropped; waiting for auto-recovery");
                // Copy out of the watch borrow before the teardown awaits
                // below; the guard must not live across them
                let recovery = match timeout(
                    manager.reconnect_grace,
                    states.wait_for(|s| *s != ConnectionState::Disconnected),
                )
                .await
                {
                    Ok(Ok(state)) => Some(*state),
                    Ok(Err(_)) => return,
                    Err(_) => None,
                };

                match recovery {
                    Some(ConnectionState::Destroyed) => return,
                    // Signalling/Connecting (or straight back to Ready):
                    // recovery is in progress, keep supervising
                    Some(_) => continue,
                    None => {
                        let removed = manager.remove_if_generation(guild_id, generation).await;
                        if let Some(stale) = removed {
                            warn!(%guild_id, generation, "no recovery within grace window; destroying session");
                            stale.destroy().await;
                            manager.events.emit(VoiceEvent::ReconnectAbandoned {
                                guild_id,
                                generation,
                                timestamp: Utc::now(),
                            });
                        } else {
                            debug!(%guild_id, generation, "stale supervisor; session no longer ours");
                        }
                        return;
                    }
                }
            }
        });
    }
}

/// Failure for a connect attempt whose generation was overtaken mid-flight
fn superseded() -> ConnectError {
    ConnectError::Rejected("superseded by a newer connect".to_string())
}
