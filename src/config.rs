use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::Verbosity;
use serde::Deserialize;

use crate::discovery::DiscoverySettings;
use crate::presence::PresenceSettings;
use crate::selector::PlayerFilter;

const CONFIG_FILE: &str = concat!(env!("CARGO_PKG_NAME"), ".toml");

fn default_poll_time() -> u64 {
    5
}

fn default_playerctl_path() -> String {
    String::from("playerctl")
}

fn default_command_timeout_ms() -> u64 {
    1000
}

fn default_ipc_timeout_ms() -> u64 {
    2000
}

fn default_large_image() -> String {
    String::from("soundcloud")
}

fn default_large_text() -> String {
    String::from("사운드클라우드")
}

fn default_small_play() -> String {
    String::from("play")
}

fn default_small_pause() -> String {
    String::from("pause")
}

fn default_unknown_artist() -> String {
    String::from("알 수 없음")
}

fn default_source_label() -> String {
    String::from("by huoshi")
}

fn default_source_url() -> String {
    String::from("https://github.com/huosh1")
}

fn default_discovery_ports() -> Vec<u16> {
    (9222..=9229).collect()
}

fn default_discovery_paths() -> Vec<String> {
    vec![String::from("/json"), String::from("/json/list")]
}

fn default_discovery_timeout_ms() -> u64 {
    500
}

fn default_media_domains() -> Vec<String> {
    [
        "soundcloud.com",
        "music.youtube.com",
        "youtube.com",
        "open.spotify.com",
        "deezer.com",
        "bandcamp.com",
        "music.apple.com",
        "tidal.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_url() -> String {
    String::from("https://soundcloud.com/")
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Playerctl,
    Mpris,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(
        short,
        long,
        help = "Path to the TOML config file. Defaults to media-presence.toml in the local config directory."
    )]
    config: Option<PathBuf>,

    #[clap(long, help = "Discord application identifier used for the presence.")]
    app_id: Option<String>,

    #[clap(long, help = "Seconds between two polls of the media players. Defaults to 5.")]
    poll_time: Option<u64>,

    #[clap(short, long, value_enum, help = "Media-control backend to query players with.")]
    backend: Option<Backend>,

    #[clap(long, help = "Comma-separated player names to consider, all if not specified.")]
    include: Option<String>,

    #[clap(long, help = "Comma-separated player names to ignore.")]
    exclude: Option<String>,

    #[clap(long, help = "URL used when neither the player nor a browser provides one.")]
    fallback_url: Option<String>,

    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Toml {
    #[serde(default)]
    app_id: String,
    #[serde(default = "default_poll_time")]
    poll_time: u64,
    #[serde(default)]
    backend: Backend,
    #[serde(default = "default_playerctl_path")]
    playerctl_path: String,
    #[serde(default = "default_command_timeout_ms")]
    command_timeout_ms: u64,
    #[serde(default = "default_ipc_timeout_ms")]
    ipc_timeout_ms: u64,
    include: Option<String>,
    exclude: Option<String>,
    #[serde(default = "default_large_image")]
    large_image: String,
    #[serde(default = "default_large_text")]
    large_text: String,
    #[serde(default = "default_small_play")]
    small_play: String,
    #[serde(default = "default_small_pause")]
    small_pause: String,
    #[serde(default = "default_unknown_artist")]
    unknown_artist: String,
    #[serde(default = "default_source_label")]
    source_label: String,
    #[serde(default = "default_source_url")]
    source_url: String,
    #[serde(default = "default_discovery_ports")]
    discovery_ports: Vec<u16>,
    #[serde(default = "default_discovery_paths")]
    discovery_paths: Vec<String>,
    #[serde(default = "default_discovery_timeout_ms")]
    discovery_timeout_ms: u64,
    #[serde(default = "default_media_domains")]
    media_domains: Vec<String>,
    #[serde(default = "default_fallback_url")]
    fallback_url: String,
}

impl Default for Toml {
    fn default() -> Self {
        toml::from_str("").expect("every config key has a default")
    }
}

impl Toml {
    fn new(path: Option<&Path>) -> Self {
        let file = if let Some(path) = path {
            path.to_path_buf()
        } else {
            let Some(config_dir) = dirs::config_local_dir() else {
                warn!("Impossible to find config directory, using default config");
                return Toml::default();
            };
            config_dir.join(CONFIG_FILE)
        };

        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) => {
                debug!("No config read from {}: {e}", file.display());
                return Toml::default();
            }
        };

        toml::from_str(&content).unwrap_or_else(|e| {
            warn!(
                "Failed to parse config file {}, using defaults: {e}",
                file.display()
            );
            Toml::default()
        })
    }
}

pub struct PlayerctlSettings {
    pub path: String,
    pub timeout: Duration,
}

pub struct Config {
    pub app_id: String,
    pub poll_interval: Duration,
    pub ipc_timeout: Duration,
    pub backend: Backend,
    pub playerctl: PlayerctlSettings,
    pub filter: PlayerFilter,
    pub presence: PresenceSettings,
    pub discovery: DiscoverySettings,
}

impl Config {
    pub fn new(cli: Cli) -> Self {
        let toml_data = Toml::new(cli.config.as_deref());
        Self::merge(cli, toml_data)
    }

    fn merge(cli: Cli, toml_data: Toml) -> Self {
        let poll_time = cli.poll_time.unwrap_or(toml_data.poll_time).max(1);

        Config {
            app_id: cli.app_id.unwrap_or(toml_data.app_id),
            poll_interval: Duration::from_secs(poll_time),
            ipc_timeout: Duration::from_millis(toml_data.ipc_timeout_ms),
            backend: cli.backend.unwrap_or(toml_data.backend),
            playerctl: PlayerctlSettings {
                path: toml_data.playerctl_path,
                timeout: Duration::from_millis(toml_data.command_timeout_ms),
            },
            filter: PlayerFilter::new(
                cli.include.or(toml_data.include).as_deref(),
                cli.exclude.or(toml_data.exclude).as_deref(),
            ),
            presence: PresenceSettings {
                large_image: toml_data.large_image,
                large_text: toml_data.large_text,
                small_play: toml_data.small_play,
                small_pause: toml_data.small_pause,
                unknown_artist: toml_data.unknown_artist,
                source_label: toml_data.source_label,
                source_url: toml_data.source_url,
            },
            discovery: DiscoverySettings {
                ports: toml_data.discovery_ports,
                paths: toml_data.discovery_paths,
                timeout: Duration::from_millis(toml_data.discovery_timeout_ms),
                media_domains: toml_data.media_domains,
                fallback_url: cli.fallback_url.unwrap_or(toml_data.fallback_url),
            },
        }
    }
}
