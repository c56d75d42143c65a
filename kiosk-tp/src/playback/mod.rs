//! Tag-triggered playback
//!
//! The [`PlaybackSupervisor`] is a single-owner actor: it consumes scan events
//! one at a time, so terminating the previous player and launching the next
//! is one serialized step. Rapid scans queue behind each other instead of
//! racing on the tracked session.

pub mod events;
pub mod player;
pub mod session;
pub mod supervisor;

pub use events::PlaybackEvent;
pub use player::{PlaybackError, PlayerCommand};
pub use session::{SessionSnapshot, SessionState};
pub use supervisor::{PlaybackSupervisor, ScanOutcome};
