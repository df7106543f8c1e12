use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;

use crate::engine::{EntityKind, RawItem};
use crate::enrich::{strategy_for, EnrichmentSignal, EnrichmentSource, SignalKind};
use crate::resolve::{extract_video_id, LinkResolver, LinkSet};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// One artist credit on a canonical result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Popularity signal attached to a canonical result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Popularity {
    pub kind: SignalKind,
    pub value: u64,
}

/// The unified output entity, one per surviving search hit
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalResult {
    pub title: String,
    pub artists: Vec<ArtistRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    pub kind: EntityKind,
    /// Formatted as m:ss (h:mm:ss from one hour up); tracks only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<Popularity>,
    pub links: LinkSet,
}

impl CanonicalResult {
    /// Rendered artist credit, post default substitution. Also the second
    /// half of the dedup identity key.
    pub fn artist_label(&self) -> String {
        if self.artists.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn identity_key(&self) -> (String, String) {
        (
            normalize_key(&self.title),
            normalize_key(&self.artist_label()),
        )
    }
}

/// Fold a rendered value for identity comparison: straighten curly quotes,
/// collapse whitespace runs, lowercase.
pub fn normalize_key(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Format a duration in seconds as m:ss, or h:mm:ss from one hour up.
pub fn format_duration(secs: u32) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format a count with thousands separators: 5000000 -> "5,000,000".
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Runs the per-item resolution and enrichment pipeline over one provider
/// batch and produces the canonical, deduplicated result sequence.
pub struct Unifier {
    resolver: Box<dyn LinkResolver>,
    views: Box<dyn EnrichmentSource>,
    listens: Box<dyn EnrichmentSource>,
    followers: Box<dyn EnrichmentSource>,
}

impl Unifier {
    pub fn new(
        resolver: Box<dyn LinkResolver>,
        views: Box<dyn EnrichmentSource>,
        listens: Box<dyn EnrichmentSource>,
        followers: Box<dyn EnrichmentSource>,
    ) -> Self {
        Self {
            resolver,
            views,
            listens,
            followers,
        }
    }

    /// Unify one batch of raw provider items.
    ///
    /// Every item's future is created before any is awaited, so the batch
    /// completes in roughly the time of its slowest item rather than the
    /// sum. Output order is the provider's order regardless of completion
    /// order; duplicates by (title, artist) keep the first occurrence.
    pub async fn unify(&self, items: Vec<RawItem>) -> Vec<CanonicalResult> {
        let futures: Vec<_> = items
            .into_iter()
            .map(|item| self.process(item))
            .collect();
        // Batch join: the accumulator below only exists after every item
        // has settled
        let settled = join_all(futures).await;
        dedup(settled)
    }

    async fn process(&self, item: RawItem) -> CanonicalResult {
        let links = match item.canonical_url.as_deref() {
            Some(url) => self.resolver.resolve(url).await,
            None => LinkSet::default(),
        };
        let signal = self.enrich(&item, &links).await;
        canonicalize(item, links, signal)
    }

    async fn enrich(&self, item: &RawItem, links: &LinkSet) -> EnrichmentSignal {
        let Some(kind) = strategy_for(item.engine, item.kind) else {
            return EnrichmentSignal::neutral(SignalKind::Views);
        };

        // The provider already delivered counters; no second fetch
        if kind == SignalKind::Views {
            if let Some(views) = item.stats.and_then(|s| s.views) {
                return EnrichmentSignal {
                    kind,
                    subject: item.video_id.clone(),
                    value: views,
                };
            }
        }

        let subject = enrichment_subject(kind, item, links);
        let source = match kind {
            SignalKind::Views => &self.views,
            SignalKind::Listens => &self.listens,
            SignalKind::Followers => &self.followers,
        };
        source.fetch(subject.as_deref()).await
    }
}

/// Derive the identity an enrichment lookup is keyed by, from the item
/// itself and from the resolved link set.
fn enrichment_subject(kind: SignalKind, item: &RawItem, links: &LinkSet) -> Option<String> {
    match kind {
        SignalKind::Views => item.video_id.clone().or_else(|| {
            links
                .youtube
                .as_deref()
                .and_then(extract_video_id)
                .or_else(|| links.youtube_music.as_deref().and_then(extract_video_id))
        }),
        SignalKind::Listens => item.isrc.clone(),
        SignalKind::Followers => item.artist_id.clone(),
    }
}

fn artist_refs(item: &RawItem) -> Vec<ArtistRef> {
    item.artists
        .iter()
        .map(|a| ArtistRef {
            name: a.name.clone(),
            url: a.url.clone(),
        })
        .collect()
}

/// Kind-specific mapping of one settled (item, links, signal) triple.
fn canonicalize(item: RawItem, links: LinkSet, signal: EnrichmentSignal) -> CanonicalResult {
    let artists = artist_refs(&item);

    match item.kind {
        EntityKind::Track => CanonicalResult {
            duration: item.duration_secs.map(format_duration),
            popularity: Some(count_popularity(&item, &signal)),
            title: item.title,
            artists,
            album: item.album,
            cover_url: item.cover_url,
            isrc: item.isrc,
            kind: EntityKind::Track,
            links,
        },
        EntityKind::Album => CanonicalResult {
            popularity: Some(count_popularity(&item, &signal)),
            // An album is its own album reference; never a duration
            album: item.album.or_else(|| Some(item.title.clone())),
            duration: None,
            title: item.title,
            artists,
            cover_url: item.cover_url,
            isrc: item.isrc,
            kind: EntityKind::Album,
            links,
        },
        EntityKind::Artist => CanonicalResult {
            // Artists carry neither album nor duration; their popularity
            // is a follower count or nothing
            album: None,
            duration: None,
            isrc: None,
            popularity: (signal.kind == SignalKind::Followers).then_some(Popularity {
                kind: SignalKind::Followers,
                value: signal.value,
            }),
            title: item.title,
            artists,
            cover_url: item.cover_url,
            kind: EntityKind::Artist,
            links,
        },
    }
}

/// Popularity for tracks and albums: the fetched signal when it produced
/// anything, else the provider's own nested counters, else zero. Never
/// absent, so numeric formatting downstream always has a value.
fn count_popularity(item: &RawItem, signal: &EnrichmentSignal) -> Popularity {
    if !signal.is_neutral() {
        return Popularity {
            kind: signal.kind,
            value: signal.value,
        };
    }
    if let Some(views) = item.stats.and_then(|s| s.views) {
        return Popularity {
            kind: SignalKind::Views,
            value: views,
        };
    }
    Popularity {
        kind: signal.kind,
        value: 0,
    }
}

/// Stable first-occurrence dedup on the normalized (title, artist) key.
fn dedup(results: Vec<CanonicalResult>) -> Vec<CanonicalResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|result| seen.insert(result.identity_key()))
        .collect()
}
