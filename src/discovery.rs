//! Fallback source for the playback URL.
//!
//! Browsers started with remote debugging expose their open pages on a local
//! port. When a player does not report the URL it is playing, the open pages
//! are ranked by how many known media domains they mention and the best one is
//! used instead.

use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;

pub struct DiscoverySettings {
    pub ports: Vec<u16>,
    pub paths: Vec<String>,
    pub timeout: Duration,
    pub media_domains: Vec<String>,
    pub fallback_url: String,
}

/// Lists the URLs of pages that may be playing media, in discovery order.
pub trait PageSource {
    async fn candidate_urls(&self) -> Vec<String>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageList {
    Bare(Vec<Page>),
    Wrapped {
        #[serde(alias = "targets", alias = "tabs")]
        pages: Vec<Page>,
    },
}

impl PageList {
    fn into_urls(self) -> impl Iterator<Item = String> {
        let (Self::Bare(pages) | Self::Wrapped { pages }) = self;
        pages.into_iter().filter_map(|page| page.url)
    }
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    url: Option<String>,
}

/// Probes the `/json` endpoints of local browser debugging ports.
pub struct DevtoolsDiscovery {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl DevtoolsDiscovery {
    pub fn new(settings: &DiscoverySettings) -> Self {
        let endpoints = settings
            .ports
            .iter()
            .flat_map(|port| {
                settings
                    .paths
                    .iter()
                    .map(move |path| format!("http://127.0.0.1:{port}{path}"))
            })
            .collect();

        Self {
            client: reqwest::Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_default(),
            endpoints,
            timeout: settings.timeout,
        }
    }

    async fn probe(&self, endpoint: &str) -> Vec<String> {
        let response = match self
            .client
            .get(endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(e) => {
                trace!("No pages from {endpoint}: {e}");
                return Vec::new();
            }
        };

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                trace!("Failed to read page list from {endpoint}: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<PageList>(&body) {
            Ok(pages) => pages.into_urls().collect(),
            Err(e) => {
                trace!("Unreadable page list from {endpoint}: {e}");
                Vec::new()
            }
        }
    }
}

impl PageSource for DevtoolsDiscovery {
    async fn candidate_urls(&self) -> Vec<String> {
        let probes = self.endpoints.iter().map(|endpoint| self.probe(endpoint));

        let mut urls: Vec<String> = Vec::new();
        for url in join_all(probes).await.into_iter().flatten() {
            if url.starts_with("http") && !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

/// Number of media domains mentioned in `url`.
pub fn rank_url(url: &str, media_domains: &[String]) -> usize {
    media_domains
        .iter()
        .filter(|domain| url.contains(domain.as_str()))
        .count()
}

pub fn is_web_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Returns the player-supplied URL when it is usable, otherwise the best
/// ranked discovered page, otherwise the configured fallback.
pub async fn resolve_current_url(
    metadata_url: Option<&str>,
    source: &impl PageSource,
    settings: &DiscoverySettings,
) -> String {
    if let Some(url) = metadata_url.filter(|url| is_web_url(url)) {
        return url.to_string();
    }

    let candidates = source.candidate_urls().await;
    let mut best: Option<(&String, usize)> = None;
    for url in &candidates {
        let rank = rank_url(url, &settings.media_domains);
        if best.map_or(true, |(_, best_rank)| rank > best_rank) {
            best = Some((url, rank));
        }
    }

    match best {
        Some((url, rank)) => {
            trace!("Discovered {url} with rank {rank}");
            url.clone()
        }
        None => settings.fallback_url.clone(),
    }
}
