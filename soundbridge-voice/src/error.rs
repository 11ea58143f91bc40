//! Error types for soundbridge-voice
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Nothing here is fatal to the process; every failure is
//! scoped to a single guild's request.

use thiserror::Error;

/// Failure to establish a voice session
///
/// Either way the registry is left clean: no half-built session survives
/// a connect failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The session never reached Ready within the connect budget
    #[error("voice connection did not become ready in time")]
    Timeout,

    /// The platform gateway refused to open the connection
    #[error("voice gateway rejected the connection: {0}")]
    Rejected(String),
}

/// Failure of a named-asset playback request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Another playback is in flight for this guild; retry later
    #[error("a playback is already in progress for this guild")]
    Busy,

    /// No asset with the requested name exists for this guild
    #[error("no audio asset named {0:?}")]
    UnknownAsset(String),

    /// No live session and the requester is not in a voice channel
    #[error("no active session and the requester is not in a voice channel")]
    NoVoiceTarget,

    /// Auto-join for this playback failed
    #[error("failed to join a voice channel for playback")]
    ConnectFailed(#[from] ConnectError),

    /// The audio pipeline rejected or aborted the track
    #[error("audio playback failed: {0}")]
    PlaybackFailed(String),
}
