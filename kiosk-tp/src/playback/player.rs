//! External player invocation

use kiosk_common::config::PlaybackConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to start {program} for {}: {source}", path.display())]
    Spawn {
        program: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How to launch the player: `program args… <video path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Set on the child when the environment lacks `XDG_RUNTIME_DIR`
    pub xdg_runtime_dir: Option<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            xdg_runtime_dir: None,
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            program: config.player_program.clone(),
            args: config.player_args.clone(),
            xdg_runtime_dir: config.xdg_runtime_dir.clone(),
        }
    }

    /// Full command line for `path`, for logging
    pub fn describe(&self, path: &Path) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.push(path.display().to_string());
        parts.join(" ")
    }

    pub fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if std::env::var_os("XDG_RUNTIME_DIR").is_none() {
            if let Some(dir) = &self.xdg_runtime_dir {
                cmd.env("XDG_RUNTIME_DIR", dir);
            }
        }
        cmd
    }

    /// Launch the player without waiting for it to finish
    pub fn spawn(&self, path: &Path) -> Result<Child, PlaybackError> {
        self.command(path).spawn().map_err(|source| PlaybackError::Spawn {
            program: self.program.clone(),
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_mpv_invocation() {
        let player = PlayerCommand::from_config(&PlaybackConfig::default());
        assert_eq!(
            player.describe(Path::new("/videos/a.mp4")),
            "mpv --msg-level=all=v --no-audio --fs --loop /videos/a.mp4"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let player = PlayerCommand::new("/nonexistent/kiosk-player", Vec::new());
        let err = player.spawn(Path::new("/videos/a.mp4")).unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
    }
}
