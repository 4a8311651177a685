use crate::platform::{PlaybackStatus, PlayerHandle};

/// Picks the player to report: the first one playing, else the first one
/// paused, else the first one enumerated.
pub fn select_active(
    players: &[(PlayerHandle, PlaybackStatus)],
) -> Option<&(PlayerHandle, PlaybackStatus)> {
    players
        .iter()
        .find(|(_, status)| *status == PlaybackStatus::Playing)
        .or_else(|| {
            players
                .iter()
                .find(|(_, status)| *status == PlaybackStatus::Paused)
        })
        .or_else(|| players.first())
}

/// Include/exclude lists applied to player handles before selection.
#[derive(Debug, Default)]
pub struct PlayerFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PlayerFilter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: split_names(include),
            exclude: split_names(exclude),
        }
    }

    pub fn allows(&self, handle: &str) -> bool {
        let handle = handle.to_lowercase();
        let included =
            self.include.is_empty() || self.include.iter().any(|name| handle.contains(name));
        included && !self.exclude.iter().any(|name| handle.contains(name))
    }

    pub fn apply(&self, handles: Vec<PlayerHandle>) -> Vec<PlayerHandle> {
        handles
            .into_iter()
            .filter(|handle| {
                let allowed = self.allows(handle);
                if !allowed {
                    trace!("Ignoring filtered player {handle}");
                }
                allowed
            })
            .collect()
    }
}

fn split_names(names: Option<&str>) -> Vec<String> {
    names
        .unwrap_or_default()
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}
