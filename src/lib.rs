//! songscout — cross-platform music metadata search aggregator.
//!
//! One query against a chosen engine (Spotify, YouTube, MusicBrainz) is
//! fanned out through link resolution (song.link) and popularity
//! enrichment (view counts, listen counts, follower counts), unified into
//! one canonical schema, and deduplicated by (title, artist) identity.

pub mod config;
pub mod engine;
pub mod enrich;
pub mod render;
pub mod resolve;
pub mod search;
pub mod unify;

pub use engine::{Engine, EntityKind, RawItem};
pub use resolve::LinkSet;
pub use search::{Aggregator, SearchError, SearchOutcome};
pub use unify::CanonicalResult;
