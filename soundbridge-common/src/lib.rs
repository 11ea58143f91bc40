//! # Soundbridge shared library (soundbridge-common)
//!
//! Types shared across the soundbridge workspace: platform identifiers,
//! the event bus, configuration loading, and logging setup.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod logging;

pub use error::{Error, Result};
