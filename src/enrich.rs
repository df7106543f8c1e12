use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client as HttpClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::engine::spotify::SpotifyAuth;
use crate::engine::{Engine, EntityKind};

const VIDEO_STATS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const MB_RECORDING_URL: &str = "https://musicbrainz.org/ws/2/recording";
const LISTEN_COUNT_URL: &str = "https://api.listenbrainz.org/1/popularity/recording";
const SPOTIFY_ARTIST_URL: &str = "https://api.spotify.com/v1/artists";

/// What a popularity number measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Views,
    Listens,
    Followers,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Views => write!(f, "views"),
            SignalKind::Listens => write!(f, "listens"),
            SignalKind::Followers => write!(f, "followers"),
        }
    }
}

/// A single popularity measure for one subject
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentSignal {
    pub kind: SignalKind,
    pub subject: Option<String>,
    pub value: u64,
}

impl EnrichmentSignal {
    /// The well-defined "nothing could be attached" value.
    pub fn neutral(kind: SignalKind) -> Self {
        Self {
            kind,
            subject: None,
            value: 0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.value == 0
    }
}

/// Which enrichment source, if any, a pipeline consults for an item.
///
/// Static table, one row per (engine, kind); the unifier never guesses.
pub fn strategy_for(engine: Engine, kind: EntityKind) -> Option<SignalKind> {
    match (engine, kind) {
        (Engine::Spotify, EntityKind::Track | EntityKind::Album) => Some(SignalKind::Views),
        (Engine::Spotify, EntityKind::Artist) => Some(SignalKind::Followers),
        // YouTube search results already carry their own view counters
        (Engine::YouTube, EntityKind::Track) => Some(SignalKind::Views),
        (Engine::YouTube, _) => None,
        (Engine::MusicBrainz, EntityKind::Track | EntityKind::Album) => Some(SignalKind::Listens),
        (Engine::MusicBrainz, EntityKind::Artist) => None,
    }
}

/// Fetches one popularity signal per subject.
///
/// A missing subject returns the neutral signal with no request issued.
/// Any failure at any hop degrades to the neutral signal; failures are
/// logged, never returned.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    fn kind(&self) -> SignalKind;

    async fn fetch(&self, subject: Option<&str>) -> EnrichmentSignal;
}

fn present(subject: Option<&str>) -> Option<&str> {
    subject.filter(|s| !s.trim().is_empty())
}

// === View counts (YouTube Data API) ===

#[derive(Debug, Deserialize)]
struct StatsResponse {
    items: Option<Vec<StatsItem>>,
}

#[derive(Debug, Deserialize)]
struct StatsItem {
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

/// View-count lookup by video id
pub struct VideoStatsClient {
    http: HttpClient,
    api_key: Option<String>,
}

impl VideoStatsClient {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    async fn lookup(&self, video_id: &str) -> Result<u64> {
        let key = self
            .api_key
            .as_deref()
            .context("no YouTube API key configured")?;

        let response = self
            .http
            .get(VIDEO_STATS_URL)
            .query(&[("part", "statistics"), ("id", video_id), ("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("status {}", response.status()));
        }

        let body: StatsResponse = response.json().await?;
        body.items
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|item| item.statistics)
            .and_then(|stats| stats.view_count)
            .and_then(|count| count.parse().ok())
            .context("no view count in response")
    }
}

#[async_trait]
impl EnrichmentSource for VideoStatsClient {
    fn kind(&self) -> SignalKind {
        SignalKind::Views
    }

    async fn fetch(&self, subject: Option<&str>) -> EnrichmentSignal {
        let Some(video_id) = present(subject) else {
            return EnrichmentSignal::neutral(SignalKind::Views);
        };

        match self.lookup(video_id).await {
            Ok(value) => EnrichmentSignal {
                kind: SignalKind::Views,
                subject: Some(video_id.to_string()),
                value,
            },
            Err(e) => {
                warn!(video_id, "View count lookup failed: {:#}", e);
                EnrichmentSignal::neutral(SignalKind::Views)
            }
        }
    }
}

// === Listen counts (ISRC -> MusicBrainz -> ListenBrainz) ===

#[derive(Debug, Deserialize)]
struct IsrcSearch {
    recordings: Option<Vec<IsrcRecording>>,
}

#[derive(Debug, Deserialize)]
struct IsrcRecording {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListenCount {
    #[serde(default)]
    total_listen_count: Option<u64>,
}

/// Listen-count lookup by industry recording code.
///
/// Two hops: the ISRC resolves to a MusicBrainz recording id, which keys
/// the ListenBrainz popularity lookup.
pub struct ListenCountClient {
    http: HttpClient,
}

impl ListenCountClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn lookup(&self, isrc: &str) -> Result<u64> {
        let query = format!("isrc:{}", isrc);
        let response = self
            .http
            .get(MB_RECORDING_URL)
            .query(&[("query", query.as_str()), ("fmt", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("catalog lookup status {}", response.status()));
        }

        let found: IsrcSearch = response.json().await?;
        let mbid = found
            .recordings
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|r| r.id)
            .context("no recording matches this ISRC")?;

        let response = self
            .http
            .post(LISTEN_COUNT_URL)
            .json(&serde_json::json!({ "recording_mbids": [mbid] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("listen count status {}", response.status()));
        }

        let counts: Vec<ListenCount> = response.json().await?;
        counts
            .into_iter()
            .next()
            .and_then(|c| c.total_listen_count)
            .context("no listen count in response")
    }
}

#[async_trait]
impl EnrichmentSource for ListenCountClient {
    fn kind(&self) -> SignalKind {
        SignalKind::Listens
    }

    async fn fetch(&self, subject: Option<&str>) -> EnrichmentSignal {
        let Some(isrc) = present(subject) else {
            return EnrichmentSignal::neutral(SignalKind::Listens);
        };

        match self.lookup(isrc).await {
            Ok(value) => EnrichmentSignal {
                kind: SignalKind::Listens,
                subject: Some(isrc.to_string()),
                value,
            },
            Err(e) => {
                warn!(isrc, "Listen count lookup failed: {:#}", e);
                EnrichmentSignal::neutral(SignalKind::Listens)
            }
        }
    }
}

// === Follower counts (Spotify artist endpoint) ===

#[derive(Debug, Deserialize)]
struct ArtistStats {
    followers: Option<Followers>,
}

#[derive(Debug, Deserialize)]
struct Followers {
    total: Option<u64>,
}

/// Follower-count lookup by provider-native artist id, sharing the cached
/// client-credentials token with the search adapter
pub struct ArtistStatsClient {
    http: HttpClient,
    auth: Option<Arc<SpotifyAuth>>,
}

impl ArtistStatsClient {
    pub fn new(http: HttpClient, auth: Option<Arc<SpotifyAuth>>) -> Self {
        Self { http, auth }
    }

    async fn lookup(&self, artist_id: &str) -> Result<u64> {
        let auth = self
            .auth
            .as_ref()
            .context("spotify credentials not configured")?;
        let token = auth.bearer_token().await?;

        let url = format!("{}/{}", SPOTIFY_ARTIST_URL, artist_id);
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("status {}", response.status()));
        }

        let stats: ArtistStats = response.json().await?;
        stats
            .followers
            .and_then(|f| f.total)
            .context("no follower count in response")
    }
}

#[async_trait]
impl EnrichmentSource for ArtistStatsClient {
    fn kind(&self) -> SignalKind {
        SignalKind::Followers
    }

    async fn fetch(&self, subject: Option<&str>) -> EnrichmentSignal {
        let Some(artist_id) = present(subject) else {
            return EnrichmentSignal::neutral(SignalKind::Followers);
        };

        match self.lookup(artist_id).await {
            Ok(value) => EnrichmentSignal {
                kind: SignalKind::Followers,
                subject: Some(artist_id.to_string()),
                value,
            },
            Err(e) => {
                warn!(artist_id, "Follower count lookup failed: {:#}", e);
                EnrichmentSignal::neutral(SignalKind::Followers)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table() {
        assert_eq!(
            strategy_for(Engine::Spotify, EntityKind::Track),
            Some(SignalKind::Views)
        );
        assert_eq!(
            strategy_for(Engine::Spotify, EntityKind::Artist),
            Some(SignalKind::Followers)
        );
        assert_eq!(
            strategy_for(Engine::YouTube, EntityKind::Track),
            Some(SignalKind::Views)
        );
        assert_eq!(strategy_for(Engine::YouTube, EntityKind::Artist), None);
        assert_eq!(
            strategy_for(Engine::MusicBrainz, EntityKind::Track),
            Some(SignalKind::Listens)
        );
        assert_eq!(strategy_for(Engine::MusicBrainz, EntityKind::Artist), None);
    }

    #[tokio::test]
    async fn test_missing_subject_returns_neutral_without_a_call() {
        // All three clients bail before touching the network when the
        // subject is absent or blank
        let http = HttpClient::new();

        let views = VideoStatsClient::new(http.clone(), None);
        assert_eq!(
            views.fetch(None).await,
            EnrichmentSignal::neutral(SignalKind::Views)
        );
        assert_eq!(
            views.fetch(Some("")).await,
            EnrichmentSignal::neutral(SignalKind::Views)
        );

        let listens = ListenCountClient::new(http.clone());
        assert_eq!(
            listens.fetch(None).await,
            EnrichmentSignal::neutral(SignalKind::Listens)
        );

        let followers = ArtistStatsClient::new(http, None);
        assert_eq!(
            followers.fetch(Some("  ")).await,
            EnrichmentSignal::neutral(SignalKind::Followers)
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_degrade_to_neutral() {
        // A subject is present but the client has no way to look it up;
        // the failure must not escape as an error
        let http = HttpClient::new();

        let views = VideoStatsClient::new(http.clone(), None);
        let signal = views.fetch(Some("dQw4w9WgXcQ")).await;
        assert!(signal.is_neutral());

        let followers = ArtistStatsClient::new(http, None);
        let signal = followers.fetch(Some("4x1nvY2FN8jxqAFA0DA02H")).await;
        assert!(signal.is_neutral());
    }

    #[test]
    fn test_neutral_signal() {
        let signal = EnrichmentSignal::neutral(SignalKind::Listens);
        assert_eq!(signal.value, 0);
        assert!(signal.subject.is_none());
        assert!(signal.is_neutral());
    }
}
