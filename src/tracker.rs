use chrono::{DateTime, Utc};

struct Session {
    title: String,
    artist: String,
    started_at: DateTime<Utc>,
}

/// Remembers when the current track began so the elapsed counter survives
/// play/pause toggles and metadata polls.
#[derive(Default)]
pub struct TrackTracker {
    session: Option<Session>,
}

impl TrackTracker {
    pub fn observe(&mut self, title: &str, artist: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(session) = &self.session {
            if session.title == title && session.artist == artist {
                return session.started_at;
            }
        }

        debug!("Track changed to {title:?} by {artist:?}");
        self.session = Some(Session {
            title: title.to_string(),
            artist: artist.to_string(),
            started_at: now,
        });
        now
    }
}
