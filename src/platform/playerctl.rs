use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;

use super::{PlaybackStatus, PlayerHandle, PlayerQuery, TrackMetadata};
use crate::config::PlayerctlSettings;

// Unit separator, absent from any sane title or artist.
const FIELD_SEPARATOR: char = '\u{1f}';
const METADATA_FORMAT: &str = "{{xesam:title}}\u{1f}{{xesam:artist}}\u{1f}{{xesam:url}}";

pub struct Playerctl {
    path: String,
    timeout: Duration,
}

impl Playerctl {
    pub fn new(settings: &PlayerctlSettings) -> Self {
        Self {
            path: settings.path.clone(),
            timeout: settings.timeout,
        }
    }

    /// Runs playerctl and returns its trimmed stdout, or an empty string on any failure.
    async fn run(&self, args: &[&str]) -> String {
        let output = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match time::timeout(self.timeout, output).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(Ok(output)) => {
                trace!("{} {args:?} exited with {}", self.path, output.status);
                String::new()
            }
            Ok(Err(e)) => {
                debug!("Failed to run {} {args:?}: {e}", self.path);
                String::new()
            }
            Err(_) => {
                debug!("{} {args:?} timed out after {:?}", self.path, self.timeout);
                String::new()
            }
        }
    }
}

impl PlayerQuery for Playerctl {
    async fn list_players(&self) -> Vec<PlayerHandle> {
        parse_player_list(&self.run(&["-l"]).await)
    }

    async fn status_of(&self, handle: &str) -> PlaybackStatus {
        PlaybackStatus::parse(&self.run(&["-p", handle, "status"]).await)
    }

    async fn metadata_of(&self, handle: &str) -> TrackMetadata {
        let line = self
            .run(&["-p", handle, "metadata", "--format", METADATA_FORMAT])
            .await;
        parse_metadata_line(&line)
    }
}

fn parse_player_list(output: &str) -> Vec<PlayerHandle> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_metadata_line(line: &str) -> TrackMetadata {
    let mut fields = line.splitn(3, FIELD_SEPARATOR);
    let title = fields.next().unwrap_or_default();
    let artist = fields.next().unwrap_or_default();
    let url = fields.next().unwrap_or_default();
    TrackMetadata::new(title, artist, url)
}
