//! Playback diagnostics events
//!
//! Broadcast by the supervisor for logging and observers. Nothing consumes
//! them for control decisions.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A player process was launched for a scanned tag
    Started {
        session_id: u64,
        uid: String,
        path: PathBuf,
        pid: Option<u32>,
    },

    /// The active player was asked to terminate because a new tag arrived
    Superseded { session_id: u64, uid: String },

    /// A player process exited
    Exited {
        session_id: u64,
        uid: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// True when the exit followed a termination request
        terminated: bool,
    },

    /// Scanned UID has no mapping entry
    UnknownTag { uid: String },

    /// Mapped video file is missing or unreadable
    MissingFile { uid: String, path: PathBuf, reason: String },

    /// Player process could not be launched
    StartFailed { uid: String, path: PathBuf, reason: String },
}
