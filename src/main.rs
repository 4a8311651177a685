#![warn(clippy::pedantic)]

mod config;
mod discovery;
mod platform;
mod presence;
mod selector;
mod tracker;
mod transport;
mod watcher;

use chrono::Utc;
use clap::Parser;
use config::{Cli, Config};
use discovery::DevtoolsDiscovery;
use platform::MediaPlayer;
use tokio::{signal, time};
use transport::DiscordTransport;
use watcher::{Settings, Watcher};

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity.log_level().unwrap_or(log::Level::Error);
    simple_logger::init_with_level(verbosity)?;

    let config = Config::new(cli);
    if config.app_id.is_empty() {
        anyhow::bail!("No Discord application identifier configured, set app_id or pass --app-id");
    }

    let media_player = MediaPlayer::new(&config);
    let discovery = DevtoolsDiscovery::new(&config.discovery);

    let mut transport = DiscordTransport::new(&config.app_id, config.ipc_timeout)?;
    transport.init().await?;

    let poll_interval = config.poll_interval;
    let mut watcher = Watcher::new(
        media_player,
        discovery,
        transport,
        Settings {
            filter: config.filter,
            presence: config.presence,
            discovery: config.discovery,
        },
    );

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let run = async {
        loop {
            interval.tick().await;
            watcher.poll(Utc::now()).await;
        }
    };

    tokio::select! {
        () = run => {},
        () = ctrl_c => {
            info!("Interruption signal received");
        },
        () = terminate => {
            info!("Terminate signal received");
        },
    }

    debug!("Stopping while {:?}", watcher.state());
    watcher.clear("exit").await;
    Ok(())
}
