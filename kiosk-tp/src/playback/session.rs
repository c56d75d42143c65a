//! Tracked playback session

use std::path::PathBuf;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Player launched and not known to have exited
    Playing,
    /// Termination requested, exit not yet observed
    Stopping,
    /// Player process exited
    Exited,
}

/// The supervisor's record of the intended active player
#[derive(Debug)]
pub struct PlaybackSession {
    pub id: u64,
    pub uid: String,
    pub path: PathBuf,
    pub pid: Option<u32>,
    pub state: SessionState,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl PlaybackSession {
    pub fn new(id: u64, uid: String, path: PathBuf, pid: Option<u32>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            id,
            uid,
            path,
            pid,
            state: SessionState::Playing,
            stop_tx: Some(stop_tx),
        }
    }

    /// Ask the reaper to terminate the player; returns immediately
    ///
    /// Returns false when the player had already exited.
    pub fn request_stop(&mut self) -> bool {
        if self.state == SessionState::Exited {
            return false;
        }
        self.state = SessionState::Stopping;
        match self.stop_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn mark_exited(&mut self) {
        self.state = SessionState::Exited;
        self.stop_tx = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            uid: self.uid.clone(),
            path: self.path.clone(),
            pid: self.pid,
            state: self.state,
        }
    }
}

/// Read-only view of the tracked session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: u64,
    pub uid: String,
    pub path: PathBuf,
    pub pid: Option<u32>,
    pub state: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_stop_signals_once() {
        let (tx, mut rx) = oneshot::channel();
        let mut session = PlaybackSession::new(1, "A".to_string(), PathBuf::from("/a.mp4"), Some(42), tx);

        assert!(session.request_stop());
        assert_eq!(session.state, SessionState::Stopping);
        assert!(rx.try_recv().is_ok());
        assert!(!session.request_stop());
    }

    #[test]
    fn test_exited_session_ignores_stop() {
        let (tx, _rx) = oneshot::channel();
        let mut session = PlaybackSession::new(1, "A".to_string(), PathBuf::from("/a.mp4"), None, tx);

        session.mark_exited();
        assert!(!session.request_stop());
        assert_eq!(session.state, SessionState::Exited);
    }
}
