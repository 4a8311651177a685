//! Publishing the presence to Discord.
//!
//! The IPC client is blocking, so it lives on its own OS thread and is driven
//! through a channel. Every request waits for the answer at most the configured
//! timeout; a thread that does not answer in time is abandoned and replaced by
//! a fresh one on the next request.

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};
use tokio::sync::oneshot;
use tokio::time;

use crate::presence::Presence;

const CONNECT_ATTEMPTS: u32 = 4;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where the presence is published.
pub trait PresenceTransport {
    async fn connect(&mut self) -> anyhow::Result<()>;

    async fn update(&mut self, presence: &Presence) -> anyhow::Result<()>;

    async fn clear(&mut self) -> anyhow::Result<()>;
}

type Reply = oneshot::Sender<Result<(), String>>;

enum Command {
    Connect(Reply),
    Update(Box<Presence>, Reply),
    Clear(Reply),
}

pub struct DiscordTransport {
    app_id: String,
    timeout: Duration,
    actor: mpsc::Sender<Command>,
    connected: bool,
}

impl DiscordTransport {
    pub fn new(app_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            app_id: app_id.to_string(),
            timeout,
            actor: spawn_actor(app_id)?,
            connected: false,
        })
    }

    /// Connects at startup, retrying a few times while Discord comes up.
    pub async fn init(&mut self) -> anyhow::Result<()> {
        let mut interval = time::interval(CONNECT_RETRY_DELAY);
        interval.tick().await;
        let mut attempts = 1;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempts < CONNECT_ATTEMPTS => {
                    warn!("Failed to connect, retrying: {e}");

                    attempts += 1;
                    interval.tick().await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Failed to connect to Discord after {attempts} attempts"
                    )))
                }
            }
        }
    }

    async fn ensure_connected(&mut self) -> anyhow::Result<()> {
        if !self.connected {
            debug!("Reconnecting to Discord");
            self.connect().await?;
        }
        Ok(())
    }

    async fn request(
        &mut self,
        what: &str,
        command: impl FnOnce(Reply) -> Command,
    ) -> anyhow::Result<()> {
        let (reply, response) = oneshot::channel();
        if self.actor.send(command(reply)).is_err() {
            self.restart()?;
            return Err(anyhow!("{what}: the IPC thread is gone"));
        }

        match time::timeout(self.timeout, response).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                self.connected = false;
                Err(anyhow!("{what}: {e}"))
            }
            Ok(Err(_)) => {
                self.restart()?;
                Err(anyhow!("{what}: the IPC thread is gone"))
            }
            Err(_) => {
                warn!(
                    "Discord IPC did not answer within {:?}, restarting the client",
                    self.timeout
                );
                self.restart()?;
                Err(anyhow!("{what}: timed out"))
            }
        }
    }

    fn restart(&mut self) -> anyhow::Result<()> {
        self.connected = false;
        self.actor = spawn_actor(&self.app_id)?;
        Ok(())
    }
}

impl PresenceTransport for DiscordTransport {
    async fn connect(&mut self) -> anyhow::Result<()> {
        self.request("Discord IPC is unavailable", Command::Connect)
            .await?;
        self.connected = true;
        info!("Connected to Discord IPC");
        Ok(())
    }

    async fn update(&mut self, presence: &Presence) -> anyhow::Result<()> {
        self.ensure_connected().await?;
        self.request("Failed to set Discord activity", |reply| {
            Command::Update(Box::new(presence.clone()), reply)
        })
        .await
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.ensure_connected().await?;
        self.request("Failed to clear Discord activity", Command::Clear)
            .await
    }
}

fn spawn_actor(app_id: &str) -> anyhow::Result<mpsc::Sender<Command>> {
    let (tx, rx) = mpsc::channel();
    let app_id = app_id.to_string();

    std::thread::Builder::new()
        .name("discord-ipc".into())
        .spawn(move || actor_loop(&app_id, &rx))
        .context("Failed to spawn the discord-ipc thread")?;

    Ok(tx)
}

/// Owns the IPC client and runs commands until the transport drops its sender.
fn actor_loop(app_id: &str, rx: &mpsc::Receiver<Command>) {
    let mut client = DiscordIpcClient::new(app_id);

    for command in rx {
        match command {
            Command::Connect(reply) => {
                let _ = reply.send(client.connect().map_err(|e| e.to_string()));
            }
            Command::Update(presence, reply) => {
                let buttons: Vec<_> = presence
                    .buttons
                    .iter()
                    .map(|button| {
                        activity::Button::new(button.label.as_str(), button.url.as_str())
                    })
                    .collect();

                let payload = activity::Activity::new()
                    .activity_type(activity::ActivityType::Listening)
                    .details(presence.details.as_str())
                    .state(presence.state.as_str())
                    .timestamps(activity::Timestamps::new().start(presence.start))
                    .assets(
                        activity::Assets::new()
                            .large_image(presence.large_image.as_str())
                            .large_text(presence.large_text.as_str())
                            .small_image(presence.small_image.as_str())
                            .small_text(presence.small_text.as_str()),
                    )
                    .buttons(buttons);

                let _ = reply.send(client.set_activity(payload).map_err(|e| e.to_string()));
            }
            Command::Clear(reply) => {
                let _ = reply.send(client.clear_activity().map_err(|e| e.to_string()));
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::{DiscordTransport, PresenceTransport};
    use std::os::unix::net::UnixListener;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn unresponsive_ipc_times_out_instead_of_blocking() {
        let dir = tempfile::tempdir().unwrap();
        // Accepts connections through its backlog but never answers the handshake.
        let _listener = UnixListener::bind(dir.path().join("discord-ipc-0")).unwrap();
        std::env::set_var("XDG_RUNTIME_DIR", dir.path());

        let timeout = Duration::from_millis(300);
        let mut transport = DiscordTransport::new("123", timeout).unwrap();

        let started = Instant::now();
        assert!(transport.connect().await.is_err());
        assert!(started.elapsed() < timeout * 3);

        // The stuck thread is replaced, so later calls fail just as fast.
        let started = Instant::now();
        assert!(transport.clear().await.is_err());
        assert!(started.elapsed() < timeout * 3);
    }
}
