//! Voice session state machine
//!
//! One [`VoiceSession`] per guild at most, owned by the registry. State
//! transitions arrive from the transport through a `watch` channel; waiters
//! observe them with bounded deadlines rather than polling.

use crate::gateway::{AudioResource, StateFeed, TrackHandle, VoiceChannelHandle, VoiceTransport};
use soundbridge_common::ids::GuildId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;

/// Connection lifecycle states
///
/// `Signalling → Connecting → Ready ⇄ Disconnected → Destroyed`.
/// `Destroyed` is terminal and reachable from any state via explicit
/// disconnect or supervisor timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

/// One live voice connection for a guild
///
/// Created by the connection manager, destroyed by it or by the reconnect
/// supervisor. The generation number identifies this connect attempt; any
/// callback armed against an older generation must treat itself as stale.
pub struct VoiceSession {
    channel: VoiceChannelHandle,
    generation: u64,
    states: StateFeed,
    transport: Box<dyn VoiceTransport>,
    destroyed: AtomicBool,
}

impl VoiceSession {
    pub(crate) fn new(
        channel: VoiceChannelHandle,
        generation: u64,
        states: StateFeed,
        transport: Box<dyn VoiceTransport>,
    ) -> Self {
        Self {
            channel,
            generation,
            states,
            transport,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.channel.guild_id
    }

    pub fn channel(&self) -> &VoiceChannelHandle {
        &self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.states.borrow()
    }

    /// Watch future state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.states.subscribe()
    }

    /// Bounded wait until the state satisfies `pred`.
    ///
    /// Returns the observed state, or `None` once `deadline` elapses.
    pub async fn await_state(
        &self,
        deadline: Duration,
        pred: impl FnMut(&ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        let mut rx = self.states.subscribe();
        let outcome = timeout(deadline, rx.wait_for(pred)).await;
        match outcome {
            Ok(Ok(state)) => Some(*state),
            // wait_for only errs when the sender is gone, which means the
            // session itself is gone
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }

    /// Attach a resource to the transport's player and start playback
    pub async fn play(&self, resource: AudioResource) -> Result<Box<dyn TrackHandle>, String> {
        self.transport.play(resource).await
    }

    /// Tear down: publish `Destroyed` and close the transport. Idempotent.
    pub(crate) async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.states.send_replace(ConnectionState::Destroyed);
        self.transport.close().await;
        debug!(
            guild_id = %self.guild_id(),
            generation = self.generation,
            "voice session destroyed"
        );
    }
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("channel", &self.channel)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}
