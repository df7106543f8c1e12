use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Engine, EntityKind, ProviderError, RawArtist, RawItem, RawStats, SearchProvider};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

pub(crate) const RESULT_CAP: usize = 25;

/// YouTube Data API adapter.
///
/// A track search is two requests: `search` for matching videos, then one
/// batched `videos` lookup so every item carries its view count and
/// ISO-8601 duration up front. Channels surface as artist results.
pub struct YouTubeClient {
    http: HttpClient,
    api_key: String,
    limit: usize,
}

impl YouTubeClient {
    pub fn new(http: HttpClient, api_key: String, limit: usize) -> Self {
        Self {
            http,
            api_key,
            limit: limit.clamp(1, RESULT_CAP),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::YouTube, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::unavailable(
                Engine::YouTube,
                format!("status {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(Engine::YouTube, e))
    }

    async fn search_videos(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        let max_results = limit.to_string();
        let found: SearchResponse = self
            .get_json(
                SEARCH_URL,
                &[
                    ("part", "snippet"),
                    ("type", "video"),
                    ("q", query),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        let ids: Vec<String> = found
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item.id.and_then(|id| id.video_id))
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_param = ids.join(",");
        let videos: VideosResponse = self
            .get_json(
                VIDEOS_URL,
                &[
                    ("part", "snippet,contentDetails,statistics"),
                    ("id", id_param.as_str()),
                ],
            )
            .await?;

        Ok(videos
            .items
            .unwrap_or_default()
            .into_iter()
            .map(video_to_raw)
            .collect())
    }

    async fn search_channels(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        let max_results = limit.to_string();
        let found: SearchResponse = self
            .get_json(
                SEARCH_URL,
                &[
                    ("part", "snippet"),
                    ("type", "channel"),
                    ("q", query),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        Ok(found
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(channel_to_raw)
            .collect())
    }
}

#[async_trait]
impl SearchProvider for YouTubeClient {
    fn engine(&self) -> Engine {
        Engine::YouTube
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<RawItem>, ProviderError> {
        if !Engine::YouTube.supports(kind) {
            return Err(ProviderError::UnsupportedKind {
                engine: Engine::YouTube,
                kind,
            });
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ProviderError::InvalidQuery("empty query".to_string()));
        }

        let limit = limit.clamp(1, self.limit);
        match kind {
            EntityKind::Track => self.search_videos(query, limit).await,
            EntityKind::Artist => self.search_channels(query, limit).await,
            EntityKind::Album => unreachable!("rejected by capability check"),
        }
    }
}

// API response models
#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    channel_id: Option<String>,
    thumbnails: Option<Thumbnails>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideosResponse {
    items: Option<Vec<VideoItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

// The API serializes counters as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

fn best_thumbnail(thumbnails: Option<Thumbnails>) -> Option<String> {
    thumbnails.and_then(|t| {
        t.medium
            .or(t.high)
            .or(t.default)
            .map(|thumb| thumb.url)
    })
}

fn video_to_raw(item: VideoItem) -> RawItem {
    let snippet = item.snippet;
    let title = snippet
        .as_ref()
        .and_then(|s| s.title.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut raw = RawItem::new(Engine::YouTube, EntityKind::Track, title);
    raw.canonical_url = Some(format!("https://www.youtube.com/watch?v={}", item.id));

    if let Some(snippet) = snippet {
        let channel_url = snippet
            .channel_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/channel/{}", id));
        raw.artists = vec![RawArtist {
            name: snippet
                .channel_title
                .unwrap_or_else(|| "Unknown Channel".to_string()),
            url: channel_url,
        }];
        raw.cover_url = best_thumbnail(snippet.thumbnails);
        raw.release_date = snippet.published_at;
    }

    raw.duration_secs = item
        .content_details
        .and_then(|d| d.duration)
        .as_deref()
        .and_then(parse_iso8601_duration);
    raw.stats = Some(RawStats {
        views: item
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|v| v.parse().ok()),
    });
    raw.video_id = Some(item.id);
    raw
}

fn channel_to_raw(item: SearchItem) -> Option<RawItem> {
    let channel_id = item.id.and_then(|id| id.channel_id)?;
    let snippet = item.snippet?;
    let name = snippet.title?;

    let mut raw = RawItem::new(Engine::YouTube, EntityKind::Artist, name);
    raw.canonical_url = Some(format!("https://www.youtube.com/channel/{}", channel_id));
    raw.cover_url = best_thumbnail(snippet.thumbnails);
    raw.artist_id = Some(channel_id);
    Some(raw)
}

/// Parse an ISO-8601 duration ("PT3M5S", "PT1H2M3S") into seconds.
fn parse_iso8601_duration(s: &str) -> Option<u32> {
    let body = s.strip_prefix('P')?;
    let mut secs: u64 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;

    for c in body.chars() {
        match c {
            'T' => continue,
            '0'..='9' => digits.push(c),
            'D' | 'H' | 'M' | 'S' => {
                let n: u64 = digits.parse().ok()?;
                digits.clear();
                saw_unit = true;
                secs += n * match c {
                    'D' => 86_400,
                    'H' => 3_600,
                    'M' => 60,
                    _ => 1,
                };
            }
            _ => return None,
        }
    }

    if !saw_unit || !digits.is_empty() {
        return None;
    }
    u32::try_from(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT3M5S"), Some(185));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
    }

    #[test]
    fn test_parse_iso8601_duration_rejects_garbage() {
        assert_eq!(parse_iso8601_duration(""), None);
        assert_eq!(parse_iso8601_duration("PT"), None);
        assert_eq!(parse_iso8601_duration("3:05"), None);
        assert_eq!(parse_iso8601_duration("PT3M5"), None);
    }

    #[test]
    fn test_video_to_raw() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Never Gonna Give You Up",
                "channelTitle": "Rick Astley",
                "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
                "publishedAt": "2009-10-25T06:57:33Z",
                "thumbnails": {"medium": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"}}
            },
            "contentDetails": {"duration": "PT3M33S"},
            "statistics": {"viewCount": "1500000000"}
        }"#;

        let item: VideoItem = serde_json::from_str(json).unwrap();
        let raw = video_to_raw(item);

        assert_eq!(raw.kind, EntityKind::Track);
        assert_eq!(raw.title, "Never Gonna Give You Up");
        assert_eq!(raw.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            raw.canonical_url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(raw.duration_secs, Some(213));
        assert_eq!(raw.stats.unwrap().views, Some(1_500_000_000));
        assert_eq!(raw.artists.len(), 1);
        assert_eq!(raw.artists[0].name, "Rick Astley");
        assert_eq!(
            raw.artists[0].url.as_deref(),
            Some("https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw")
        );
    }

    #[test]
    fn test_video_to_raw_with_sparse_fields() {
        let json = r#"{"id": "abc-_123456"}"#;

        let item: VideoItem = serde_json::from_str(json).unwrap();
        let raw = video_to_raw(item);

        assert_eq!(raw.title, "Unknown");
        assert!(raw.artists.is_empty());
        assert!(raw.duration_secs.is_none());
        assert_eq!(raw.stats.unwrap().views, None);
    }

    #[test]
    fn test_channel_to_raw() {
        let json = r#"{
            "id": {"channelId": "UCuAXFkgsw1L7xaCfnd5JJOw"},
            "snippet": {
                "title": "Rick Astley",
                "thumbnails": {"default": {"url": "https://yt3.ggpht.com/channel.jpg"}}
            }
        }"#;

        let item: SearchItem = serde_json::from_str(json).unwrap();
        let raw = channel_to_raw(item).unwrap();

        assert_eq!(raw.kind, EntityKind::Artist);
        assert_eq!(raw.title, "Rick Astley");
        assert_eq!(raw.artist_id.as_deref(), Some("UCuAXFkgsw1L7xaCfnd5JJOw"));
        assert!(raw.duration_secs.is_none());
    }

    #[test]
    fn test_channel_without_id_is_dropped() {
        let json = r#"{"id": {"videoId": "dQw4w9WgXcQ"}, "snippet": {"title": "Not a channel"}}"#;
        let item: SearchItem = serde_json::from_str(json).unwrap();
        assert!(channel_to_raw(item).is_none());
    }
}
