//! Playback supervisor actor
//!
//! Owns the tracked [`PlaybackSession`] outright. Scans are handled one at a
//! time by [`PlaybackSupervisor::run`]; reaper tasks never touch the session,
//! they report exits back over a channel and the actor applies them.

use super::events::PlaybackEvent;
use super::player::PlayerCommand;
use super::session::{PlaybackSession, SessionSnapshot, SessionState};
use crate::mapping::TagVideoMapping;
use crate::serial::TagScan;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a single scan did to the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Started { session_id: u64 },
    UnknownTag,
    MissingFile,
    StartFailed,
}

/// Sent by a reaper once its player has exited
#[derive(Debug)]
struct ExitNotice {
    session_id: u64,
}

pub struct PlaybackSupervisor {
    mapping: Arc<TagVideoMapping>,
    player: PlayerCommand,
    current: Option<PlaybackSession>,
    next_session_id: u64,
    reapers: JoinSet<()>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
    exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackSupervisor {
    pub fn new(mapping: Arc<TagVideoMapping>, player: PlayerCommand) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            mapping,
            player,
            current: None,
            next_session_id: 1,
            reapers: JoinSet::new(),
            exit_tx,
            exit_rx,
            events,
        }
    }

    /// Subscribe to playback diagnostics
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the tracked session, if any
    pub fn current(&self) -> Option<SessionSnapshot> {
        self.current.as_ref().map(PlaybackSession::snapshot)
    }

    /// Process scans until cancelled or the scan channel closes, then shut down
    pub async fn run(mut self, mut scans: mpsc::Receiver<TagScan>, cancel: CancellationToken) {
        info!(mappings = self.mapping.len(), player = %self.player.program, "Playback supervisor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Playback supervisor cancelled");
                    break;
                }
                scan = scans.recv() => match scan {
                    Some(scan) => {
                        self.handle_scan(&scan).await;
                    }
                    None => {
                        debug!("Scan channel closed");
                        break;
                    }
                },
                Some(notice) = self.exit_rx.recv() => self.apply_exit(notice),
                Some(joined) = self.reapers.join_next(), if !self.reapers.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Player reaper task failed");
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Apply one scan: lookup, verify, supersede, launch
    pub async fn handle_scan(&mut self, scan: &TagScan) -> ScanOutcome {
        self.drain_exits();

        let path = match self.mapping.resolve(&scan.uid) {
            Some(path) => path.to_path_buf(),
            None => {
                debug!(uid = %scan.uid, "No video mapped for tag");
                self.emit(PlaybackEvent::UnknownTag { uid: scan.uid.clone() });
                return ScanOutcome::UnknownTag;
            }
        };

        if let Err(e) = tokio::fs::metadata(&path).await {
            warn!(uid = %scan.uid, path = %path.display(), error = %e, "Mapped video file not found");
            self.emit(PlaybackEvent::MissingFile {
                uid: scan.uid.clone(),
                path,
                reason: e.to_string(),
            });
            return ScanOutcome::MissingFile;
        }

        self.supersede_current();

        let child = match self.player.spawn(&path) {
            Ok(child) => child,
            Err(e) => {
                error!(uid = %scan.uid, error = %e, "Failed to start player");
                self.emit(PlaybackEvent::StartFailed {
                    uid: scan.uid.clone(),
                    path,
                    reason: e.to_string(),
                });
                return ScanOutcome::StartFailed;
            }
        };

        let session_id = self.next_session_id;
        self.next_session_id += 1;
        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();

        self.reapers.spawn(reap(
            child,
            session_id,
            scan.uid.clone(),
            stop_rx,
            self.events.clone(),
            self.exit_tx.clone(),
        ));

        info!(
            session_id,
            uid = %scan.uid,
            pid = ?pid,
            command = %self.player.describe(&path),
            "Playback started"
        );
        self.emit(PlaybackEvent::Started {
            session_id,
            uid: scan.uid.clone(),
            path: path.clone(),
            pid,
        });
        self.current = Some(PlaybackSession::new(session_id, scan.uid.clone(), path, pid, stop_tx));

        ScanOutcome::Started { session_id }
    }

    /// Terminate the active player and wait for every reaper to finish
    pub async fn shutdown(&mut self) {
        if let Some(session) = self.current.as_mut() {
            if session.request_stop() {
                info!(session_id = session.id, uid = %session.uid, "Stopping player for shutdown");
            }
        }

        while let Some(joined) = self.reapers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Player reaper task failed");
            }
        }
        self.drain_exits();
        info!("Playback supervisor stopped");
    }

    /// Ask the active player to stop without waiting for it
    fn supersede_current(&mut self) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.state != SessionState::Playing {
            return;
        }
        if session.request_stop() {
            info!(session_id = session.id, uid = %session.uid, "Superseding active player");
            let event = PlaybackEvent::Superseded {
                session_id: session.id,
                uid: session.uid.clone(),
            };
            self.emit(event);
        }
    }

    fn drain_exits(&mut self) {
        while let Ok(notice) = self.exit_rx.try_recv() {
            self.apply_exit(notice);
        }
    }

    fn apply_exit(&mut self, notice: ExitNotice) {
        if let Some(session) = self.current.as_mut() {
            if session.id == notice.session_id {
                session.mark_exited();
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Wait for a player to exit, killing it first if a stop is requested
async fn reap(
    mut child: Child,
    session_id: u64,
    uid: String,
    stop_rx: oneshot::Receiver<()>,
    events: broadcast::Sender<PlaybackEvent>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
) {
    let (status, terminated) = tokio::select! {
        status = child.wait() => (status, false),
        _ = stop_rx => {
            if let Err(e) = child.start_kill() {
                warn!(session_id, error = %e, "Failed to signal player");
            }
            (child.wait().await, true)
        }
    };

    let code = match status {
        Ok(status) => {
            if terminated {
                info!(session_id, uid = %uid, status = %status, "Player terminated");
            } else if status.success() {
                info!(session_id, uid = %uid, "Player exited");
            } else {
                warn!(session_id, uid = %uid, status = %status, "Player exited with failure");
            }
            status.code()
        }
        Err(e) => {
            error!(session_id, uid = %uid, error = %e, "Failed to wait for player");
            None
        }
    };

    // Notice first, so observers of `Exited` see the session already marked
    let _ = exit_tx.send(ExitNotice { session_id });
    let _ = events.send(PlaybackEvent::Exited {
        session_id,
        uid,
        code,
        terminated,
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        video_a: PathBuf,
        video_b: PathBuf,
        mapping: Arc<TagVideoMapping>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let video_a = dir.path().join("a.mp4");
        let video_b = dir.path().join("b.mp4");
        std::fs::write(&video_a, b"a").unwrap();
        std::fs::write(&video_b, b"b").unwrap();
        let mapping = Arc::new(
            [
                ("A".to_string(), video_a.clone()),
                ("B".to_string(), video_b.clone()),
                ("GONE".to_string(), dir.path().join("gone.mp4")),
            ]
            .into_iter()
            .collect(),
        );
        Fixture {
            _dir: dir,
            video_a,
            video_b,
            mapping,
        }
    }

    fn shell_player(script: &str) -> PlayerCommand {
        PlayerCommand::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "player".to_string()],
        )
    }

    async fn wait_for_exit(rx: &mut broadcast::Receiver<PlaybackEvent>, id: u64) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await.unwrap() {
                    event @ PlaybackEvent::Exited { session_id, .. } if session_id == id => {
                        return event
                    }
                    _ => continue,
                }
            }
        })
        .await
        .expect("player should exit")
    }

    #[tokio::test]
    async fn test_new_scan_supersedes_active_player() {
        let fx = fixture();
        let mut supervisor = PlaybackSupervisor::new(fx.mapping.clone(), shell_player("sleep 30"));
        let mut events = supervisor.subscribe();

        assert_eq!(
            supervisor.handle_scan(&TagScan::new("A")).await,
            ScanOutcome::Started { session_id: 1 }
        );
        let first = supervisor.current().unwrap();
        assert_eq!(first.path, fx.video_a);
        assert_eq!(first.state, SessionState::Playing);

        assert_eq!(
            supervisor.handle_scan(&TagScan::new("B")).await,
            ScanOutcome::Started { session_id: 2 }
        );
        let second = supervisor.current().unwrap();
        assert_eq!(second.uid, "B");
        assert_eq!(second.path, fx.video_b);

        match wait_for_exit(&mut events, 1).await {
            PlaybackEvent::Exited { terminated, code, .. } => {
                assert!(terminated);
                assert_eq!(code, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(supervisor.current().unwrap().state, SessionState::Playing);

        supervisor.shutdown().await;
        assert_eq!(supervisor.current().unwrap().state, SessionState::Exited);
    }

    #[tokio::test]
    async fn test_unknown_tag_leaves_session_alone() {
        let fx = fixture();
        let mut supervisor = PlaybackSupervisor::new(fx.mapping.clone(), shell_player("sleep 30"));
        let mut events = supervisor.subscribe();

        supervisor.handle_scan(&TagScan::new("A")).await;
        assert_eq!(
            supervisor.handle_scan(&TagScan::new("ZZ")).await,
            ScanOutcome::UnknownTag
        );

        let current = supervisor.current().unwrap();
        assert_eq!(current.uid, "A");
        assert_eq!(current.state, SessionState::Playing);

        let mut saw_unknown = false;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, PlaybackEvent::Superseded { .. }));
            saw_unknown |= event == PlaybackEvent::UnknownTag { uid: "ZZ".to_string() };
        }
        assert!(saw_unknown);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_not_played() {
        let fx = fixture();
        let mut supervisor = PlaybackSupervisor::new(fx.mapping.clone(), shell_player("sleep 30"));

        assert_eq!(
            supervisor.handle_scan(&TagScan::new("GONE")).await,
            ScanOutcome::MissingFile
        );
        assert!(supervisor.current().is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_does_not_track_session() {
        let fx = fixture();
        let player = PlayerCommand::new("/nonexistent/kiosk-player", Vec::new());
        let mut supervisor = PlaybackSupervisor::new(fx.mapping.clone(), player);
        let mut events = supervisor.subscribe();

        assert_eq!(
            supervisor.handle_scan(&TagScan::new("A")).await,
            ScanOutcome::StartFailed
        );
        assert!(supervisor.current().is_none());
        assert!(matches!(
            events.try_recv().unwrap(),
            PlaybackEvent::StartFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_natural_exit_is_recorded() {
        let fx = fixture();
        let mut supervisor = PlaybackSupervisor::new(fx.mapping.clone(), shell_player("exit 3"));
        let mut events = supervisor.subscribe();

        supervisor.handle_scan(&TagScan::new("A")).await;
        match wait_for_exit(&mut events, 1).await {
            PlaybackEvent::Exited { code, terminated, .. } => {
                assert_eq!(code, Some(3));
                assert!(!terminated);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Exits are applied when the next scan is handled
        supervisor.handle_scan(&TagScan::new("ZZ")).await;
        let current = supervisor.current().unwrap();
        assert_eq!(current.uid, "A");
        assert_eq!(current.state, SessionState::Exited);
    }

    #[tokio::test]
    async fn test_run_stops_player_on_cancel() {
        let fx = fixture();
        let supervisor = PlaybackSupervisor::new(fx.mapping.clone(), shell_player("sleep 30"));
        let mut events = supervisor.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervisor.run(rx, cancel.clone()));

        tx.send(TagScan::new("A")).await.unwrap();
        let started = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(started, PlaybackEvent::Started { session_id: 1, .. }));

        cancel.cancel();
        match wait_for_exit(&mut events, 1).await {
            PlaybackEvent::Exited { terminated, .. } => assert!(terminated),
            other => panic!("unexpected event: {other:?}"),
        }
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor should stop")
            .unwrap();
    }
}
