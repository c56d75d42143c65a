//! # Kiosk Tag Playback Library (kiosk-tp)
//!
//! Plays the video associated with an NFC tag whenever the tag is scanned.
//!
//! **Pipeline:** serial reader → tag stream parser → playback supervisor →
//! external player process. Exactly one player is intended to run at a time;
//! a new scan supersedes the current player.

pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod playback;
pub mod serial;

pub use error::{Error, Result};
pub use mapping::TagVideoMapping;
pub use pipeline::run_pipeline;
pub use playback::{PlaybackEvent, PlaybackSupervisor, PlayerCommand};
pub use serial::TagScan;
