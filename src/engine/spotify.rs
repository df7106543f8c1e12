use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Engine, EntityKind, ProviderError, RawArtist, RawItem, SearchProvider};
use crate::config::SpotifyConfig;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";

/// Spotify caps search pages at 50; the aggregator asks for at most this many
pub(crate) const RESULT_CAP: usize = 10;

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Shared Spotify client-credentials session.
///
/// The search adapter and the follower enrichment both authenticate through
/// this. The token is fetched lazily on first use and refreshed shortly
/// before expiry; callers never see an expired token.
pub struct SpotifyAuth {
    client_id: String,
    client_secret: String,
    http: HttpClient,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyAuth {
    pub fn new(config: &SpotifyConfig, http: HttpClient) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http,
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching or refreshing as needed.
    pub(crate) async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let basic = general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(TOKEN_URL)
            .header(header::AUTHORIZATION, format!("Basic {}", basic))
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("Spotify token request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Spotify token endpoint returned status {}",
                response.status()
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse Spotify token response")?;

        let expires_at =
            Utc::now() + Duration::seconds((token.expires_in - EXPIRY_MARGIN_SECS).max(0));
        let access_token = token.access_token.clone();

        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }
}

// API response models
#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Page<TrackItem>>,
    albums: Option<Page<AlbumItem>>,
    artists: Option<Page<ArtistItem>>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    duration_ms: Option<u64>,
    external_urls: Option<ExternalUrls>,
    external_ids: Option<ExternalIds>,
    artists: Option<Vec<ArtistItem>>,
    album: Option<AlbumRef>,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    name: String,
    release_date: Option<String>,
    external_urls: Option<ExternalUrls>,
    images: Option<Vec<Image>>,
    artists: Option<Vec<ArtistItem>>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: Option<String>,
    name: String,
    external_urls: Option<ExternalUrls>,
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    name: Option<String>,
    images: Option<Vec<Image>>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

fn first_image(images: Option<Vec<Image>>) -> Option<String> {
    images.and_then(|mut imgs| {
        if imgs.is_empty() {
            None
        } else {
            Some(imgs.remove(0).url)
        }
    })
}

fn artist_refs(artists: Option<Vec<ArtistItem>>) -> Vec<RawArtist> {
    artists
        .unwrap_or_default()
        .into_iter()
        .map(|a| RawArtist {
            name: a.name,
            url: a.external_urls.and_then(|u| u.spotify),
        })
        .collect()
}

fn track_to_raw(item: TrackItem) -> RawItem {
    let mut raw = RawItem::new(Engine::Spotify, EntityKind::Track, item.name);
    raw.canonical_url = item.external_urls.and_then(|u| u.spotify);
    raw.isrc = item.external_ids.and_then(|ids| ids.isrc);
    raw.duration_secs = item.duration_ms.map(|ms| (ms / 1000) as u32);
    raw.artists = artist_refs(item.artists);
    if let Some(album) = item.album {
        raw.album = album.name;
        raw.cover_url = first_image(album.images);
    }
    raw
}

fn album_to_raw(item: AlbumItem) -> RawItem {
    let mut raw = RawItem::new(Engine::Spotify, EntityKind::Album, item.name.clone());
    // An album is its own album reference
    raw.album = Some(item.name);
    raw.canonical_url = item.external_urls.and_then(|u| u.spotify);
    raw.cover_url = first_image(item.images);
    raw.release_date = item.release_date;
    raw.artists = artist_refs(item.artists);
    raw
}

fn artist_to_raw(item: ArtistItem) -> RawItem {
    let mut raw = RawItem::new(Engine::Spotify, EntityKind::Artist, item.name);
    raw.canonical_url = item.external_urls.and_then(|u| u.spotify);
    raw.cover_url = first_image(item.images);
    raw.artist_id = item.id;
    raw
}

/// Spotify search adapter over the client-credentials session
pub struct SpotifyClient {
    auth: Arc<SpotifyAuth>,
    http: HttpClient,
    limit: usize,
}

impl SpotifyClient {
    pub fn new(auth: Arc<SpotifyAuth>, http: HttpClient, limit: usize) -> Self {
        Self {
            auth,
            http,
            limit: limit.clamp(1, RESULT_CAP),
        }
    }
}

#[async_trait]
impl SearchProvider for SpotifyClient {
    fn engine(&self) -> Engine {
        Engine::Spotify
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        if !Engine::Spotify.supports(kind) {
            return Err(ProviderError::UnsupportedKind {
                engine: Engine::Spotify,
                kind,
            });
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ProviderError::InvalidQuery("empty query".to_string()));
        }

        let token = self
            .auth
            .bearer_token()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::Spotify, e))?;

        let limit = limit.clamp(1, self.limit);
        let kind_param = kind.to_string();
        let limit_param = limit.to_string();
        let response = self
            .http
            .get(SEARCH_URL)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .query(&[
                ("q", query),
                ("type", kind_param.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::Spotify, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::unavailable(
                Engine::Spotify,
                format!("status {}", response.status()),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::Spotify, e))?;

        let items = match kind {
            EntityKind::Track => body
                .tracks
                .and_then(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .map(track_to_raw)
                .collect(),
            EntityKind::Album => body
                .albums
                .and_then(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .map(album_to_raw)
                .collect(),
            EntityKind::Artist => body
                .artists
                .and_then(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .map(artist_to_raw)
                .collect(),
        };

        Ok(items)
    }
}
