mod playerctl;
pub use playerctl::Playerctl;

#[cfg(all(unix, not(target_os = "macos")))]
mod mpris;
#[cfg(all(unix, not(target_os = "macos")))]
pub use self::mpris::Mpris;

use std::cell::RefCell;

use crate::config::{Backend, Config};

/// Identifier of one player instance as reported by the media-control interface.
pub type PlayerHandle = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    Unknown,
}

impl PlaybackStatus {
    /// Parses the free-text status of a player, tolerating padding and case.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("playing") {
            Self::Playing
        } else if text.eq_ignore_ascii_case("paused") {
            Self::Paused
        } else if text.eq_ignore_ascii_case("stopped") {
            Self::Stopped
        } else {
            Self::Unknown
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub url: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: &str, artist: &str, url: &str) -> Self {
        let url = url.trim();
        Self {
            title: title.trim().to_string(),
            artist: artist.trim().to_string(),
            url: (!url.is_empty()).then(|| url.to_string()),
        }
    }
}

/// Best-effort view over the media players of the machine.
///
/// Implementations never fail: a query that errors or times out yields an
/// empty list, [`PlaybackStatus::Unknown`] or empty metadata.
pub trait PlayerQuery {
    async fn list_players(&self) -> Vec<PlayerHandle>;

    async fn status_of(&self, handle: &str) -> PlaybackStatus;

    async fn metadata_of(&self, handle: &str) -> TrackMetadata;
}

/// Players found by the last enumeration, looked up by handle until the next one.
pub struct Listed<P> {
    players: RefCell<Vec<(PlayerHandle, P)>>,
}

impl<P> Default for Listed<P> {
    fn default() -> Self {
        Self {
            players: RefCell::new(Vec::new()),
        }
    }
}

impl<P> Listed<P> {
    /// Replaces the remembered players and returns their handles in order.
    pub fn replace(&self, players: Vec<(PlayerHandle, P)>) -> Vec<PlayerHandle> {
        let handles = players.iter().map(|(handle, _)| handle.clone()).collect();
        *self.players.borrow_mut() = players;
        handles
    }

    pub fn with<R>(&self, handle: &str, f: impl FnOnce(&P) -> R) -> Option<R> {
        self.players
            .borrow()
            .iter()
            .find(|(listed, _)| listed == handle)
            .map(|(_, player)| f(player))
    }
}

pub enum MediaPlayer {
    Playerctl(Playerctl),
    #[cfg(all(unix, not(target_os = "macos")))]
    Mpris(Mpris),
}

impl MediaPlayer {
    pub fn new(config: &Config) -> Self {
        match config.backend {
            Backend::Playerctl => Self::Playerctl(Playerctl::new(&config.playerctl)),
            #[cfg(all(unix, not(target_os = "macos")))]
            Backend::Mpris => match Mpris::new() {
                Ok(mpris) => Self::Mpris(mpris),
                Err(e) => {
                    warn!("MPRIS is unavailable, falling back to playerctl: {e}");
                    Self::Playerctl(Playerctl::new(&config.playerctl))
                }
            },
            #[cfg(not(all(unix, not(target_os = "macos"))))]
            Backend::Mpris => {
                warn!("MPRIS is not supported on this platform, falling back to playerctl");
                Self::Playerctl(Playerctl::new(&config.playerctl))
            }
        }
    }
}

impl PlayerQuery for MediaPlayer {
    async fn list_players(&self) -> Vec<PlayerHandle> {
        match self {
            Self::Playerctl(player) => player.list_players().await,
            #[cfg(all(unix, not(target_os = "macos")))]
            Self::Mpris(player) => player.list_players().await,
        }
    }

    async fn status_of(&self, handle: &str) -> PlaybackStatus {
        match self {
            Self::Playerctl(player) => player.status_of(handle).await,
            #[cfg(all(unix, not(target_os = "macos")))]
            Self::Mpris(player) => player.status_of(handle).await,
        }
    }

    async fn metadata_of(&self, handle: &str) -> TrackMetadata {
        match self {
            Self::Playerctl(player) => player.metadata_of(handle).await,
            #[cfg(all(unix, not(target_os = "macos")))]
            Self::Mpris(player) => player.metadata_of(handle).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Listed, PlaybackStatus, TrackMetadata};
    use std::cell::Cell;

    #[test]
    fn listed_players_are_found_until_next_enumeration() {
        let listed = Listed::default();
        let handles = listed.replace(vec![
            ("org.mpris.MediaPlayer2.spotify".to_string(), 1),
            ("org.mpris.MediaPlayer2.vlc".to_string(), 2),
        ]);
        assert_eq!(
            handles,
            vec![
                "org.mpris.MediaPlayer2.spotify".to_string(),
                "org.mpris.MediaPlayer2.vlc".to_string()
            ]
        );

        let lookups = Cell::new(0);
        let found = listed.with("org.mpris.MediaPlayer2.vlc", |player| {
            lookups.set(lookups.get() + 1);
            *player
        });
        assert_eq!(found, Some(2));
        assert_eq!(lookups.get(), 1);

        listed.replace(vec![("org.mpris.MediaPlayer2.mpv".to_string(), 3)]);
        assert_eq!(listed.with("org.mpris.MediaPlayer2.vlc", |player| *player), None);
        assert_eq!(listed.with("org.mpris.MediaPlayer2.mpv", |player| *player), Some(3));
    }

    #[test]
    fn parses_status_case_insensitively() {
        assert_eq!(PlaybackStatus::parse("Playing"), PlaybackStatus::Playing);
        assert_eq!(PlaybackStatus::parse("  PAUSED\n"), PlaybackStatus::Paused);
        assert_eq!(PlaybackStatus::parse("stopped"), PlaybackStatus::Stopped);
        assert_eq!(PlaybackStatus::parse(""), PlaybackStatus::Unknown);
        assert_eq!(PlaybackStatus::parse("buffering"), PlaybackStatus::Unknown);
    }

    #[test]
    fn blank_url_is_absent() {
        let metadata = TrackMetadata::new(" Song ", "Artist ", "  ");
        assert_eq!(metadata.title, "Song");
        assert_eq!(metadata.artist, "Artist");
        assert_eq!(metadata.url, None);
    }
}
