use chrono::{DateTime, Utc};

use crate::discovery::is_web_url;
use crate::platform::PlaybackStatus;

// Longest text the presence service accepts in a single field.
const MAX_TEXT_LEN: usize = 128;
const MAX_LABEL_LEN: usize = 32;

pub struct PresenceSettings {
    pub large_image: String,
    pub large_text: String,
    pub small_play: String,
    pub small_pause: String,
    pub unknown_artist: String,
    pub source_label: String,
    pub source_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub url: String,
}

/// Everything published about the current track. Two presences are the same
/// update exactly when they compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presence {
    pub details: String,
    pub state: String,
    /// Unix seconds the elapsed counter runs from.
    pub start: i64,
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
    pub buttons: Vec<Button>,
}

pub struct Track<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub url: &'a str,
    pub status: PlaybackStatus,
    pub started_at: DateTime<Utc>,
}

/// The artist as shown to people, with the placeholder for a missing one.
pub fn display_artist<'a>(settings: &'a PresenceSettings, artist: &'a str) -> &'a str {
    if artist.is_empty() {
        &settings.unknown_artist
    } else {
        artist
    }
}

pub fn build(settings: &PresenceSettings, track: &Track) -> Presence {
    let artist = display_artist(settings, track.artist);

    let (small_image, small_text) = match track.status {
        PlaybackStatus::Paused => (&settings.small_pause, "⏸ Paused"),
        PlaybackStatus::Playing | PlaybackStatus::Stopped | PlaybackStatus::Unknown => {
            (&settings.small_play, "▶ Playing")
        }
    };

    let mut buttons = Vec::with_capacity(2);
    if is_web_url(track.url) {
        let label = if track.status == PlaybackStatus::Playing {
            "🎧 Play"
        } else {
            "🎧 Open"
        };
        buttons.push(Button {
            label: label.to_string(),
            url: track.url.to_string(),
        });
    }
    buttons.push(Button {
        label: truncate(&settings.source_label, MAX_LABEL_LEN),
        url: settings.source_url.clone(),
    });

    Presence {
        details: truncate(&format!("♪  {}", track.title), MAX_TEXT_LEN),
        state: truncate(&format!("— {artist}"), MAX_TEXT_LEN),
        start: track.started_at.timestamp(),
        large_image: settings.large_image.clone(),
        large_text: truncate(&settings.large_text, MAX_TEXT_LEN),
        small_image: small_image.clone(),
        small_text: small_text.to_string(),
        buttons,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
