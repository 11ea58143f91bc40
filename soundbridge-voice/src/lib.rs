//! # Soundbridge voice core (soundbridge-voice)
//!
//! Per-guild voice session management: connecting to voice channels on
//! demand, supervising recovery after transport drops, and serializing
//! named-asset playback so a guild never runs two playbacks at once.
//!
//! **Architecture:** one [`ConnectionManager`] owns the session registry and
//! the reconnect supervisors; a [`PlaybackOrchestrator`] layers per-guild
//! mutual exclusion and auto-join/auto-leave on top of it. The platform
//! gateway and the asset store are collaborators behind the traits in
//! [`gateway`].

pub mod assets;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod playback;
pub mod registry;
pub mod session;

pub use connection::ConnectionManager;
pub use error::{ConnectError, PlaybackError};
pub use playback::{PlaybackHandle, PlaybackOrchestrator};
pub use session::{ConnectionState, VoiceSession};
