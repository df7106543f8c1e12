use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::warn;

const ODESLI_URL: &str = "https://api.song.link/v1-alpha.1/links";

/// Hosts the resolver accepts as input. Anything else short-circuits to the
/// empty set without a request.
const RESOLVABLE_HOSTS: &[&str] = &[
    "open.spotify.com",
    "www.youtube.com",
    "youtube.com",
    "music.youtube.com",
    "youtu.be",
];

/// Per-platform links for one entity.
///
/// A missing platform is `None`, never an error; the all-empty set is the
/// well-defined result of any failed or skipped resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple_music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deezer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soundcloud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tidal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pandora: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandcamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub napster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anghami: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boomplay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiomack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yandex: Option<String>,
}

impl LinkSet {
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Present links as (platform label, url) pairs, in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let all = [
            ("spotify", &self.spotify),
            ("youtubeMusic", &self.youtube_music),
            ("youtube", &self.youtube),
            ("appleMusic", &self.apple_music),
            ("deezer", &self.deezer),
            ("soundcloud", &self.soundcloud),
            ("tidal", &self.tidal),
            ("amazonMusic", &self.amazon_music),
            ("pandora", &self.pandora),
            ("bandcamp", &self.bandcamp),
            ("napster", &self.napster),
            ("anghami", &self.anghami),
            ("boomplay", &self.boomplay),
            ("audiomack", &self.audiomack),
            ("yandex", &self.yandex),
        ];
        all.into_iter()
            .filter_map(|(label, url)| url.as_deref().map(|u| (label, u)))
            .collect()
    }
}

// Odesli response shape: linksByPlatform is a platform-keyed object whose
// values wrap the actual url
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdesliResponse {
    links_by_platform: Option<PlatformLinks>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformLinks {
    spotify: Option<PlatformLink>,
    youtube_music: Option<PlatformLink>,
    youtube: Option<PlatformLink>,
    apple_music: Option<PlatformLink>,
    deezer: Option<PlatformLink>,
    soundcloud: Option<PlatformLink>,
    tidal: Option<PlatformLink>,
    amazon_music: Option<PlatformLink>,
    pandora: Option<PlatformLink>,
    bandcamp: Option<PlatformLink>,
    napster: Option<PlatformLink>,
    anghami: Option<PlatformLink>,
    boomplay: Option<PlatformLink>,
    audiomack: Option<PlatformLink>,
    yandex: Option<PlatformLink>,
}

#[derive(Debug, Deserialize)]
struct PlatformLink {
    url: Option<String>,
}

impl From<PlatformLinks> for LinkSet {
    fn from(links: PlatformLinks) -> Self {
        fn url(link: Option<PlatformLink>) -> Option<String> {
            link.and_then(|l| l.url)
        }
        LinkSet {
            spotify: url(links.spotify),
            youtube_music: url(links.youtube_music),
            youtube: url(links.youtube),
            apple_music: url(links.apple_music),
            deezer: url(links.deezer),
            soundcloud: url(links.soundcloud),
            tidal: url(links.tidal),
            amazon_music: url(links.amazon_music),
            pandora: url(links.pandora),
            bandcamp: url(links.bandcamp),
            napster: url(links.napster),
            anghami: url(links.anghami),
            boomplay: url(links.boomplay),
            audiomack: url(links.audiomack),
            yandex: url(links.yandex),
        }
    }
}

/// Resolves a provider permalink into per-platform links.
///
/// Never fails: anything that goes wrong yields the empty set. "No links"
/// is a common, valid outcome.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, canonical_url: &str) -> LinkSet;
}

/// Is this URL something the resolution service accepts?
pub fn is_resolvable(url: &str) -> bool {
    let rest = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    let host = rest.split('/').next().unwrap_or("");
    RESOLVABLE_HOSTS.contains(&host)
}

/// Extract a YouTube video id from a watch or short URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    if let Some((_, rest)) = url.split_once("v=") {
        let id = rest.split(|c| c == '&' || c == '#').next().unwrap_or("");
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    for prefix in ["https://youtu.be/", "http://youtu.be/"] {
        if let Some(rest) = url.strip_prefix(prefix) {
            let id = rest
                .split(|c| c == '?' || c == '&' || c == '#')
                .next()
                .unwrap_or("");
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// song.link / Odesli client. One attempt per item per search, no retry.
pub struct OdesliClient {
    http: HttpClient,
}

impl OdesliClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl LinkResolver for OdesliClient {
    async fn resolve(&self, canonical_url: &str) -> LinkSet {
        if !is_resolvable(canonical_url) {
            return LinkSet::default();
        }

        let response = self
            .http
            .get(ODESLI_URL)
            .query(&[("url", canonical_url)])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<OdesliResponse>().await {
                Ok(body) => body
                    .links_by_platform
                    .map(LinkSet::from)
                    .unwrap_or_default(),
                Err(e) => {
                    warn!(url = canonical_url, "Failed to parse link resolution response: {}", e);
                    LinkSet::default()
                }
            },
            Ok(resp) => {
                warn!(
                    url = canonical_url,
                    status = %resp.status(),
                    "Link resolution returned non-success status"
                );
                LinkSet::default()
            }
            Err(e) => {
                warn!(url = canonical_url, "Link resolution request failed: {}", e);
                LinkSet::default()
            }
        }
    }
}
