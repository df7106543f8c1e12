use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Engine, EntityKind, ProviderError, RawArtist, RawItem, SearchProvider};

const API_URL: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_URL: &str = "https://coverartarchive.org";

pub(crate) const RESULT_CAP: usize = 25;

/// MusicBrainz encyclopedia adapter. No auth; the shared client's
/// User-Agent identifies us per the MusicBrainz etiquette rules.
pub struct MusicBrainzClient {
    http: HttpClient,
    limit: usize,
}

impl MusicBrainzClient {
    pub fn new(http: HttpClient, limit: usize) -> Self {
        Self {
            http,
            limit: limit.clamp(1, RESULT_CAP),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        entity: &str,
        query: &str,
        limit: usize,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", API_URL, entity);
        let limit_param = limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("fmt", "json"),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::MusicBrainz, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::unavailable(
                Engine::MusicBrainz,
                format!("status {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::MusicBrainz, e))
    }
}

#[async_trait]
impl SearchProvider for MusicBrainzClient {
    fn engine(&self) -> Engine {
        Engine::MusicBrainz
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        if !Engine::MusicBrainz.supports(kind) {
            return Err(ProviderError::UnsupportedKind {
                engine: Engine::MusicBrainz,
                kind,
            });
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ProviderError::InvalidQuery("empty query".to_string()));
        }

        let limit = limit.clamp(1, self.limit);
        match kind {
            EntityKind::Track => {
                let body: RecordingSearch = self.get_json("recording", query, limit).await?;
                Ok(body
                    .recordings
                    .unwrap_or_default()
                    .into_iter()
                    .map(recording_to_raw)
                    .collect())
            }
            EntityKind::Album => {
                let body: ReleaseSearch = self.get_json("release", query, limit).await?;
                Ok(body
                    .releases
                    .unwrap_or_default()
                    .into_iter()
                    .map(release_to_raw)
                    .collect())
            }
            EntityKind::Artist => {
                let body: ArtistSearch = self.get_json("artist", query, limit).await?;
                Ok(body
                    .artists
                    .unwrap_or_default()
                    .into_iter()
                    .map(artist_to_raw)
                    .collect())
            }
        }
    }
}

// API response models
#[derive(Debug, Deserialize)]
struct RecordingSearch {
    recordings: Option<Vec<Recording>>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    id: String,
    title: String,
    /// Duration in milliseconds
    length: Option<u64>,
    #[serde(rename = "artist-credit")]
    artist_credit: Option<Vec<ArtistCredit>>,
    releases: Option<Vec<ReleaseRef>>,
    isrcs: Option<Vec<String>>,
    #[serde(rename = "first-release-date")]
    first_release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistCredit {
    name: Option<String>,
    artist: Option<CreditedArtist>,
}

#[derive(Debug, Deserialize)]
struct CreditedArtist {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearch {
    releases: Option<Vec<Release>>,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: String,
    title: String,
    date: Option<String>,
    #[serde(rename = "artist-credit")]
    artist_credit: Option<Vec<ArtistCredit>>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearch {
    artists: Option<Vec<ArtistEntry>>,
}

#[derive(Debug, Deserialize)]
struct ArtistEntry {
    id: String,
    name: String,
}

fn credit_refs(credits: Option<Vec<ArtistCredit>>) -> Vec<RawArtist> {
    credits
        .unwrap_or_default()
        .into_iter()
        .filter_map(|credit| {
            let name = credit
                .name
                .or_else(|| credit.artist.as_ref().and_then(|a| a.name.clone()))?;
            let url = credit
                .artist
                .and_then(|a| a.id)
                .map(|id| format!("https://musicbrainz.org/artist/{}", id));
            Some(RawArtist { name, url })
        })
        .collect()
}

fn recording_to_raw(recording: Recording) -> RawItem {
    let mut raw = RawItem::new(Engine::MusicBrainz, EntityKind::Track, recording.title);
    raw.canonical_url = Some(format!("https://musicbrainz.org/recording/{}", recording.id));
    raw.duration_secs = recording.length.map(|ms| (ms / 1000) as u32);
    raw.artists = credit_refs(recording.artist_credit);
    raw.isrc = recording
        .isrcs
        .and_then(|codes| codes.into_iter().next());
    raw.release_date = recording.first_release_date;
    if let Some(release) = recording
        .releases
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
    {
        raw.album = release.title;
        raw.cover_url = release
            .id
            .map(|id| format!("{}/release/{}/front-250", COVER_ART_URL, id));
    }
    raw
}

fn release_to_raw(release: Release) -> RawItem {
    let mut raw = RawItem::new(Engine::MusicBrainz, EntityKind::Album, release.title.clone());
    raw.album = Some(release.title);
    raw.canonical_url = Some(format!("https://musicbrainz.org/release/{}", release.id));
    raw.cover_url = Some(format!("{}/release/{}/front-250", COVER_ART_URL, release.id));
    raw.release_date = release.date;
    raw.artists = credit_refs(release.artist_credit);
    raw
}

fn artist_to_raw(artist: ArtistEntry) -> RawItem {
    let mut raw = RawItem::new(Engine::MusicBrainz, EntityKind::Artist, artist.name);
    raw.canonical_url = Some(format!("https://musicbrainz.org/artist/{}", artist.id));
    raw.artist_id = Some(artist.id);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recording_search() {
        let json = r#"{
            "recordings": [{
                "id": "f970f1e0-0f9b-4a07-a06e-2b8c3b4a09ea",
                "title": "Imagine",
                "length": 183000,
                "artist-credit": [{
                    "name": "John Lennon",
                    "artist": {"id": "4d5447d7-c61c-4120-ba1b-d7f471d385b9", "name": "John Lennon"}
                }],
                "releases": [{"id": "aa1ee9b2-4b7e-4f9a-9441-84ea7ab2e48d", "title": "Imagine"}],
                "isrcs": ["GBAYE0601498"],
                "first-release-date": "1971-10-11"
            }]
        }"#;

        let body: RecordingSearch = serde_json::from_str(json).unwrap();
        let raw = recording_to_raw(body.recordings.unwrap().remove(0));

        assert_eq!(raw.kind, EntityKind::Track);
        assert_eq!(raw.title, "Imagine");
        assert_eq!(raw.duration_secs, Some(183));
        assert_eq!(raw.isrc.as_deref(), Some("GBAYE0601498"));
        assert_eq!(raw.album.as_deref(), Some("Imagine"));
        assert_eq!(
            raw.canonical_url.as_deref(),
            Some("https://musicbrainz.org/recording/f970f1e0-0f9b-4a07-a06e-2b8c3b4a09ea")
        );
        assert_eq!(raw.artists.len(), 1);
        assert_eq!(raw.artists[0].name, "John Lennon");
        assert_eq!(
            raw.cover_url.as_deref(),
            Some("https://coverartarchive.org/release/aa1ee9b2-4b7e-4f9a-9441-84ea7ab2e48d/front-250")
        );
    }

    #[test]
    fn test_parse_recording_with_missing_fields() {
        let json = r#"{"recordings": [{"id": "abc", "title": "Sparse"}]}"#;

        let body: RecordingSearch = serde_json::from_str(json).unwrap();
        let raw = recording_to_raw(body.recordings.unwrap().remove(0));

        assert_eq!(raw.title, "Sparse");
        assert!(raw.artists.is_empty());
        assert!(raw.album.is_none());
        assert!(raw.isrc.is_none());
        assert!(raw.duration_secs.is_none());
    }

    #[test]
    fn test_parse_release_search() {
        let json = r#"{
            "releases": [{
                "id": "aa1ee9b2-4b7e-4f9a-9441-84ea7ab2e48d",
                "title": "Abbey Road",
                "date": "1969-09-26",
                "artist-credit": [{"name": "The Beatles"}]
            }]
        }"#;

        let body: ReleaseSearch = serde_json::from_str(json).unwrap();
        let raw = release_to_raw(body.releases.unwrap().remove(0));

        assert_eq!(raw.kind, EntityKind::Album);
        assert_eq!(raw.album.as_deref(), Some("Abbey Road"));
        assert_eq!(raw.release_date.as_deref(), Some("1969-09-26"));
        assert!(raw.duration_secs.is_none());
        assert_eq!(raw.artists[0].name, "The Beatles");
        assert!(raw.artists[0].url.is_none());
    }

    #[test]
    fn test_parse_artist_search() {
        let json = r#"{
            "artists": [{"id": "4d5447d7-c61c-4120-ba1b-d7f471d385b9", "name": "John Lennon"}]
        }"#;

        let body: ArtistSearch = serde_json::from_str(json).unwrap();
        let raw = artist_to_raw(body.artists.unwrap().remove(0));

        assert_eq!(raw.kind, EntityKind::Artist);
        assert_eq!(raw.title, "John Lennon");
        assert_eq!(
            raw.artist_id.as_deref(),
            Some("4d5447d7-c61c-4120-ba1b-d7f471d385b9")
        );
        assert_eq!(
            raw.canonical_url.as_deref(),
            Some("https://musicbrainz.org/artist/4d5447d7-c61c-4120-ba1b-d7f471d385b9")
        );
    }
}
