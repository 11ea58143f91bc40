//! Collaborator seams
//!
//! The voice core does not speak the platform's wire protocol and does not
//! read the asset store itself. Both arrive as trait objects: the platform
//! layer supplies a [`VoiceGateway`], the asset-storage subsystem supplies
//! an [`AssetResolver`].

use crate::error::ConnectError;
use crate::session::ConnectionState;
use async_trait::async_trait;
use soundbridge_common::ids::{ChannelId, GuildId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared handle a transport uses to publish connection state transitions
pub type StateFeed = Arc<watch::Sender<ConnectionState>>;

/// Voice channel reference handed in by the platform layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannelHandle {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Playable audio resource produced by an [`AssetResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioResource {
    /// Asset name as requested (no extension)
    pub name: String,
    /// Backing file on disk
    pub path: PathBuf,
}

/// Terminal outcome of one attached track, delivered exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEnd {
    Finished,
    Errored(String),
}

/// Platform signalling adapter: opens the underlying voice transport.
///
/// Implementations publish state transitions through `states` for the
/// lifetime of the returned transport, starting from `Signalling`.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Open a transport to the given channel.
    ///
    /// A refusal (permissions, invalid channel) surfaces as
    /// [`ConnectError::Rejected`].
    async fn join(
        &self,
        channel: &VoiceChannelHandle,
        states: StateFeed,
    ) -> Result<Box<dyn VoiceTransport>, ConnectError>;
}

/// Live transport backing one session generation
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Attach a resource to the transport's player and start playback
    async fn play(&self, resource: AudioResource) -> Result<Box<dyn TrackHandle>, String>;

    /// Tear down the underlying connection. Idempotent.
    async fn close(&self);
}

/// Handle to one playing track
#[async_trait]
pub trait TrackHandle: Send + Sync {
    /// Resolves once, when the track reaches a terminal state
    async fn finished(self: Box<Self>) -> TrackEnd;
}

/// Asset-storage lookup: guild-scoped named audio resources
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, guild_id: GuildId, name: &str) -> Option<AudioResource>;
}
