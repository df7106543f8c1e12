pub mod musicbrainz;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which search engine a result comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Spotify,
    YouTube,
    MusicBrainz,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Spotify => write!(f, "spotify"),
            Engine::YouTube => write!(f, "youtube"),
            Engine::MusicBrainz => write!(f, "musicbrainz"),
        }
    }
}

impl std::str::FromStr for Engine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spotify" | "sp" => Ok(Engine::Spotify),
            "youtube" | "yt" => Ok(Engine::YouTube),
            "musicbrainz" | "mb" => Ok(Engine::MusicBrainz),
            _ => Err(anyhow::anyhow!("Unknown engine: {}", s)),
        }
    }
}

/// The kind of entity a search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Track,
    Album,
    Artist,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Track => write!(f, "track"),
            EntityKind::Album => write!(f, "album"),
            EntityKind::Artist => write!(f, "artist"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "track" | "song" => Ok(EntityKind::Track),
            "album" => Ok(EntityKind::Album),
            "artist" => Ok(EntityKind::Artist),
            _ => Err(anyhow::anyhow!("Unknown entity kind: {}", s)),
        }
    }
}

impl Engine {
    /// Entity kinds this engine can search.
    ///
    /// Single source of truth for the CLI selector and the pre-flight
    /// selection check: an unsupported kind must be rejected before any
    /// request is issued.
    pub fn supported_kinds(self) -> &'static [EntityKind] {
        match self {
            Engine::Spotify => &[EntityKind::Track, EntityKind::Album, EntityKind::Artist],
            // YouTube has no album concept; channels surface as artists
            Engine::YouTube => &[EntityKind::Track, EntityKind::Artist],
            Engine::MusicBrainz => &[EntityKind::Track, EntityKind::Album, EntityKind::Artist],
        }
    }

    pub fn supports(self, kind: EntityKind) -> bool {
        self.supported_kinds().contains(&kind)
    }
}

/// One artist credit as the provider reported it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArtist {
    pub name: String,
    /// Provider-side profile link, when the response carries one
    pub url: Option<String>,
}

/// Nested statistics block, present when the provider response already
/// carries counters (YouTube joins view counts into its search results)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStats {
    pub views: Option<u64>,
}

/// Provider-native record for one search hit.
///
/// Adapters fill whatever their response shape offers; everything beyond
/// the title is optional and defaults to absent. Consumed exactly once by
/// the unifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub engine: Engine,
    pub kind: EntityKind,
    pub title: String,
    /// The provider's own permalink, input to link resolution
    pub canonical_url: Option<String>,
    pub cover_url: Option<String>,
    pub artists: Vec<RawArtist>,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
    pub release_date: Option<String>,
    /// Industry recording code (ISRC) when the provider exposes one
    pub isrc: Option<String>,
    /// Provider-native artist id, for follower enrichment
    pub artist_id: Option<String>,
    /// Video identifier, for view-count enrichment
    pub video_id: Option<String>,
    pub stats: Option<RawStats>,
}

impl RawItem {
    /// A bare record with every optional field absent; adapters fill in
    /// what their response actually carried.
    pub fn new(engine: Engine, kind: EntityKind, title: impl Into<String>) -> Self {
        Self {
            engine,
            kind,
            title: title.into(),
            canonical_url: None,
            cover_url: None,
            artists: Vec::new(),
            album: None,
            duration_secs: None,
            release_date: None,
            isrc: None,
            artist_id: None,
            video_id: None,
            stats: None,
        }
    }
}

/// Why a provider search could not produce results
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("{engine} does not support searching for {kind}s")]
    UnsupportedKind { engine: Engine, kind: EntityKind },
    #[error("{engine} search failed: {message}")]
    Unavailable { engine: Engine, message: String },
}

impl ProviderError {
    pub fn unavailable(engine: Engine, message: impl ToString) -> Self {
        ProviderError::Unavailable {
            engine,
            message: message.to_string(),
        }
    }
}

/// A searchable metadata source.
///
/// Implementations own their request shaping (auth, query construction,
/// result cap) and their response parsing. Parsing is defensive: an absent
/// nested field becomes a documented default, never an error. The only
/// side effect of `search` is the outbound request itself.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn engine(&self) -> Engine;

    /// Search for entities of one kind.
    ///
    /// Must reject a kind the engine does not support before issuing any
    /// request.
    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError>;
}
