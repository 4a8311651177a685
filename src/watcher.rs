use chrono::{DateTime, Utc};

use crate::discovery::{resolve_current_url, DiscoverySettings, PageSource};
use crate::platform::PlayerQuery;
use crate::presence::{self, Presence, PresenceSettings, Track};
use crate::selector::{select_active, PlayerFilter};
use crate::tracker::TrackTracker;
use crate::transport::PresenceTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// No player is available.
    Idle,
    /// A player with a usable title is published.
    Tracking,
    /// A player is active but reports no title.
    Suppressed,
}

pub struct Settings {
    pub filter: PlayerFilter,
    pub presence: PresenceSettings,
    pub discovery: DiscoverySettings,
}

/// Reconciles the active player with the published presence, one poll at a time.
pub struct Watcher<Q, D, T> {
    query: Q,
    discovery: D,
    transport: T,
    settings: Settings,
    tracker: TrackTracker,
    published: Option<Presence>,
    state: State,
}

impl<Q, D, T> Watcher<Q, D, T>
where
    Q: PlayerQuery,
    D: PageSource,
    T: PresenceTransport,
{
    pub fn new(query: Q, discovery: D, transport: T, settings: Settings) -> Self {
        Self {
            query,
            discovery,
            transport,
            settings,
            tracker: TrackTracker::default(),
            published: None,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub async fn poll(&mut self, now: DateTime<Utc>) {
        let handles = self.settings.filter.apply(self.query.list_players().await);
        let mut players = Vec::with_capacity(handles.len());
        for handle in handles {
            let status = self.query.status_of(&handle).await;
            players.push((handle, status));
        }

        let Some((handle, status)) = select_active(&players) else {
            self.clear("no player").await;
            self.transition(State::Idle);
            return;
        };

        let metadata = self.query.metadata_of(handle).await;
        if metadata.title.is_empty() {
            self.clear("no title").await;
            self.transition(State::Suppressed);
            return;
        }

        let started_at = self.tracker.observe(&metadata.title, &metadata.artist, now);
        let url = resolve_current_url(
            metadata.url.as_deref(),
            &self.discovery,
            &self.settings.discovery,
        )
        .await;
        let presence = presence::build(
            &self.settings.presence,
            &Track {
                title: &metadata.title,
                artist: &metadata.artist,
                url: &url,
                status: *status,
                started_at,
            },
        );

        if self.published.as_ref() == Some(&presence) {
            self.transition(State::Tracking);
            return;
        }

        match self.transport.update(&presence).await {
            Ok(()) => {
                info!(
                    "♪ {} — {} [{status:?}] from {handle}",
                    presence::display_artist(&self.settings.presence, &metadata.artist),
                    metadata.title
                );
                self.published = Some(presence);
                self.transition(State::Tracking);
            }
            Err(e) => warn!("Failed to publish presence: {e:?}"),
        }
    }

    /// Clears the published presence, if any.
    pub async fn clear(&mut self, reason: &str) {
        if self.published.take().is_none() {
            return;
        }

        match self.transport.clear().await {
            Ok(()) => info!("Presence cleared ({reason})"),
            Err(e) => warn!("Failed to clear presence ({reason}): {e:?}"),
        }
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            debug!("{:?} -> {state:?}", self.state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Settings, State, Watcher};
    use crate::discovery::{DiscoverySettings, PageSource};
    use crate::platform::{PlaybackStatus, PlayerHandle, PlayerQuery, TrackMetadata};
    use crate::presence::{Presence, PresenceSettings};
    use crate::selector::PlayerFilter;
    use crate::transport::PresenceTransport;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Players = Rc<RefCell<Vec<(&'static str, PlaybackStatus, TrackMetadata)>>>;

    struct FakePlayers(Players);

    impl PlayerQuery for FakePlayers {
        async fn list_players(&self) -> Vec<PlayerHandle> {
            self.0
                .borrow()
                .iter()
                .map(|(handle, _, _)| (*handle).to_string())
                .collect()
        }

        async fn status_of(&self, handle: &str) -> PlaybackStatus {
            self.0
                .borrow()
                .iter()
                .find(|(h, _, _)| *h == handle)
                .map_or(PlaybackStatus::Unknown, |(_, status, _)| *status)
        }

        async fn metadata_of(&self, handle: &str) -> TrackMetadata {
            self.0
                .borrow()
                .iter()
                .find(|(h, _, _)| *h == handle)
                .map(|(_, _, metadata)| metadata.clone())
                .unwrap_or_default()
        }
    }

    struct NoPages;

    impl PageSource for NoPages {
        async fn candidate_urls(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Update(Presence),
        Clear,
    }

    #[derive(Default)]
    struct FakeTransport {
        calls: Rc<RefCell<Vec<Call>>>,
        failing: Rc<RefCell<bool>>,
    }

    impl PresenceTransport for FakeTransport {
        async fn connect(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn update(&mut self, presence: &Presence) -> anyhow::Result<()> {
            if *self.failing.borrow() {
                anyhow::bail!("transport down");
            }
            self.calls.borrow_mut().push(Call::Update(presence.clone()));
            Ok(())
        }

        async fn clear(&mut self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(Call::Clear);
            Ok(())
        }
    }

    struct Harness {
        players: Players,
        calls: Rc<RefCell<Vec<Call>>>,
        failing: Rc<RefCell<bool>>,
        watcher: Watcher<FakePlayers, NoPages, FakeTransport>,
    }

    fn harness() -> Harness {
        let players: Players = Rc::default();
        let transport = FakeTransport::default();
        let calls = Rc::clone(&transport.calls);
        let failing = Rc::clone(&transport.failing);
        let settings = Settings {
            filter: PlayerFilter::default(),
            presence: PresenceSettings {
                large_image: "soundcloud".to_string(),
                large_text: "SoundCloud".to_string(),
                small_play: "play".to_string(),
                small_pause: "pause".to_string(),
                unknown_artist: "Unknown".to_string(),
                source_label: "Source".to_string(),
                source_url: "https://github.com/example/media-presence".to_string(),
            },
            discovery: DiscoverySettings {
                ports: Vec::new(),
                paths: Vec::new(),
                timeout: std::time::Duration::from_millis(500),
                media_domains: vec!["soundcloud.com".to_string()],
                fallback_url: "https://soundcloud.com/".to_string(),
            },
        };
        Harness {
            watcher: Watcher::new(FakePlayers(Rc::clone(&players)), NoPages, transport, settings),
            players,
            calls,
            failing,
        }
    }

    fn song(title: &str, artist: &str) -> TrackMetadata {
        TrackMetadata::new(title, artist, "")
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn updates(calls: &[Call]) -> Vec<&Presence> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::Update(presence) => Some(presence),
                Call::Clear => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn pushes_only_on_change_and_clears_when_players_leave() {
        let mut h = harness();

        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("Song X", "Artist Y"))];
        h.watcher.poll(at(0)).await;
        assert_eq!(h.calls.borrow().len(), 1);
        assert_eq!(h.watcher.state(), State::Tracking);

        h.watcher.poll(at(5)).await;
        assert_eq!(h.calls.borrow().len(), 1);

        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("Song Z", "Artist Y"))];
        h.watcher.poll(at(10)).await;
        {
            let calls = h.calls.borrow();
            let pushed = updates(&calls);
            assert_eq!(pushed.len(), 2);
            assert_eq!(pushed[0].details, "♪  Song X");
            assert_eq!(pushed[0].start, at(0).timestamp());
            assert_eq!(pushed[1].details, "♪  Song Z");
            assert_eq!(pushed[1].start, at(10).timestamp());
            assert_eq!(pushed[1].buttons[0].url, "https://soundcloud.com/");
        }

        h.players.borrow_mut().clear();
        h.watcher.poll(at(15)).await;
        assert_eq!(h.calls.borrow().last(), Some(&Call::Clear));
        assert_eq!(h.watcher.state(), State::Idle);

        h.watcher.poll(at(20)).await;
        assert_eq!(h.calls.borrow().len(), 3);
    }

    #[tokio::test]
    async fn pause_keeps_start_but_republishes() {
        let mut h = harness();

        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("Song X", "Artist Y"))];
        h.watcher.poll(at(0)).await;
        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Paused, song("Song X", "Artist Y"))];
        h.watcher.poll(at(5)).await;

        let calls = h.calls.borrow();
        let pushed = updates(&calls);
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[1].small_text, "⏸ Paused");
        assert_eq!(pushed[1].start, at(0).timestamp());
    }

    #[tokio::test]
    async fn playing_player_is_preferred() {
        let mut h = harness();

        *h.players.borrow_mut() = vec![
            ("a", PlaybackStatus::Paused, song("Paused song", "")),
            ("b", PlaybackStatus::Playing, song("Playing song", "")),
        ];
        h.watcher.poll(at(0)).await;

        let calls = h.calls.borrow();
        assert_eq!(updates(&calls)[0].details, "♪  Playing song");
    }

    #[tokio::test]
    async fn empty_title_clears_and_suppresses() {
        let mut h = harness();

        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("Song X", "Artist Y"))];
        h.watcher.poll(at(0)).await;
        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("", "Artist Y"))];
        h.watcher.poll(at(5)).await;
        h.watcher.poll(at(10)).await;

        assert_eq!(h.watcher.state(), State::Suppressed);
        let calls = h.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], Call::Clear);
    }

    #[tokio::test]
    async fn nothing_published_means_nothing_to_clear() {
        let mut h = harness();

        h.watcher.poll(at(0)).await;
        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Stopped, song("", ""))];
        h.watcher.poll(at(5)).await;

        assert!(h.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn failed_update_is_retried_next_poll() {
        let mut h = harness();

        *h.players.borrow_mut() = vec![("a", PlaybackStatus::Playing, song("Song X", "Artist Y"))];
        *h.failing.borrow_mut() = true;
        h.watcher.poll(at(0)).await;
        assert!(h.calls.borrow().is_empty());
        assert_eq!(h.watcher.state(), State::Idle);

        *h.failing.borrow_mut() = false;
        h.watcher.poll(at(5)).await;
        assert_eq!(h.watcher.state(), State::Tracking);
        let calls = h.calls.borrow();
        let pushed = updates(&calls);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].start, at(0).timestamp());
    }
}
