use ::mpris::{Player, PlayerFinder};

use super::{Listed, PlaybackStatus, PlayerHandle, PlayerQuery, TrackMetadata};

/// Queries players directly over the D-Bus session bus; handles are bus names.
///
/// The bus is enumerated once per `list_players`; status and metadata are read
/// from the players found then.
pub struct Mpris {
    player_finder: PlayerFinder,
    players: Listed<Player>,
}

impl Mpris {
    pub fn new() -> anyhow::Result<Self> {
        let player_finder =
            PlayerFinder::new().map_err(|e| anyhow::anyhow!("D-Bus connection failed: {e}"))?;
        Ok(Self {
            player_finder,
            players: Listed::default(),
        })
    }
}

impl PlayerQuery for Mpris {
    async fn list_players(&self) -> Vec<PlayerHandle> {
        let players = match self.player_finder.find_all() {
            Ok(players) => players
                .into_iter()
                .map(|player| (player.bus_name().to_string(), player))
                .collect(),
            Err(e) => {
                debug!("Failed to enumerate MPRIS players: {e}");
                Vec::new()
            }
        };
        self.players.replace(players)
    }

    async fn status_of(&self, handle: &str) -> PlaybackStatus {
        self.players
            .with(handle, |player| match player.get_playback_status() {
                Ok(::mpris::PlaybackStatus::Playing) => PlaybackStatus::Playing,
                Ok(::mpris::PlaybackStatus::Paused) => PlaybackStatus::Paused,
                Ok(::mpris::PlaybackStatus::Stopped) => PlaybackStatus::Stopped,
                Err(e) => {
                    debug!("No playback status for {handle}: {e}");
                    PlaybackStatus::Unknown
                }
            })
            .unwrap_or(PlaybackStatus::Unknown)
    }

    async fn metadata_of(&self, handle: &str) -> TrackMetadata {
        self.players
            .with(handle, |player| {
                let metadata = match player.get_metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!("No correct metadata found for the player {handle}: {e}");
                        return TrackMetadata::default();
                    }
                };

                let artists = metadata
                    .artists()
                    .or_else(|| metadata.album_artists())
                    .map(|artists| artists.join(", "))
                    .unwrap_or_default();

                TrackMetadata::new(
                    metadata.title().unwrap_or_default(),
                    &artists,
                    metadata.url().unwrap_or_default(),
                )
            })
            .unwrap_or_default()
    }
}
