use reqwest::Client as HttpClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::musicbrainz::MusicBrainzClient;
use crate::engine::spotify::{SpotifyAuth, SpotifyClient};
use crate::engine::youtube::YouTubeClient;
use crate::engine::{Engine, EntityKind, ProviderError, SearchProvider};
use crate::enrich::{ArtistStatsClient, ListenCountClient, VideoStatsClient};
use crate::resolve::OdesliClient;
use crate::unify::{CanonicalResult, Unifier};

const USER_AGENT: &str = "songscout/0.1.0 ( https://github.com/songscout/songscout )";

/// Why a search could not run or finish.
///
/// Only selection problems and a failed primary provider call reach the
/// user; everything downstream of the provider degrades silently inside
/// the unifier.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("please enter a search query")]
    EmptyQuery,
    #[error("{engine} cannot search for {kind}s (supported: {supported})")]
    UnsupportedKind {
        engine: Engine,
        kind: EntityKind,
        supported: String,
    },
    #[error("{engine} is not available: {reason}")]
    EngineUnavailable { engine: Engine, reason: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Outcome of a completed search. Empty is a reportable state of its own,
/// distinct from any error.
#[derive(Debug)]
pub enum SearchOutcome {
    Results(Vec<CanonicalResult>),
    Empty,
}

/// Owns the per-engine adapters and the unification pipeline for the
/// lifetime of the process; each call to [`Aggregator::search`] is one
/// independent session.
pub struct Aggregator {
    providers: HashMap<Engine, Box<dyn SearchProvider>>,
    /// Engines that could not be initialized, for status display
    init_errors: HashMap<Engine, String>,
    unifier: Unifier,
    limit: usize,
}

impl Aggregator {
    /// Initialize every engine the config has credentials for.
    ///
    /// Engines missing credentials are recorded in `init_errors` rather
    /// than failing construction; MusicBrainz needs none and is always
    /// available.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;

        let mut providers: HashMap<Engine, Box<dyn SearchProvider>> = HashMap::new();
        let mut init_errors: HashMap<Engine, String> = HashMap::new();
        let limit = config.search.limit.max(1);

        let auth = if config.spotify.is_configured() {
            Some(Arc::new(SpotifyAuth::new(&config.spotify, http.clone())))
        } else {
            init_errors.insert(
                Engine::Spotify,
                "client_id/client_secret missing from config".to_string(),
            );
            None
        };

        if let Some(auth) = auth.clone() {
            providers.insert(
                Engine::Spotify,
                Box::new(SpotifyClient::new(auth, http.clone(), limit)),
            );
        }

        if config.youtube.is_configured() {
            providers.insert(
                Engine::YouTube,
                Box::new(YouTubeClient::new(
                    http.clone(),
                    config.youtube.api_key.clone(),
                    limit,
                )),
            );
        } else {
            init_errors.insert(
                Engine::YouTube,
                "api_key missing from config".to_string(),
            );
        }

        providers.insert(
            Engine::MusicBrainz,
            Box::new(MusicBrainzClient::new(http.clone(), limit)),
        );

        let api_key = config
            .youtube
            .is_configured()
            .then(|| config.youtube.api_key.clone());
        let unifier = Unifier::new(
            Box::new(OdesliClient::new(http.clone())),
            Box::new(VideoStatsClient::new(http.clone(), api_key)),
            Box::new(ListenCountClient::new(http.clone())),
            Box::new(ArtistStatsClient::new(http, auth)),
        );

        Ok(Self {
            providers,
            init_errors,
            unifier,
            limit,
        })
    }

    /// Get list of usable engines
    pub fn available_engines(&self) -> Vec<Engine> {
        self.providers.keys().copied().collect()
    }

    /// Get initialization errors
    pub fn init_errors(&self) -> &HashMap<Engine, String> {
        &self.init_errors
    }

    /// Run one search session end to end: validate the selection, fetch
    /// the provider batch, unify it.
    pub async fn search(
        &self,
        query: &str,
        engine: Engine,
        kind: EntityKind,
    ) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        // Consult the capability table before anything leaves the process
        if !engine.supports(kind) {
            let supported = engine
                .supported_kinds()
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(SearchError::UnsupportedKind {
                engine,
                kind,
                supported,
            });
        }

        let provider = self.providers.get(&engine).ok_or_else(|| {
            let reason = self
                .init_errors
                .get(&engine)
                .cloned()
                .unwrap_or_else(|| "not configured".to_string());
            SearchError::EngineUnavailable { engine, reason }
        })?;

        // A failed provider call aborts the whole search; there are no
        // partial provider results
        let raw = provider.search(query, kind, self.limit).await?;
        if raw.is_empty() {
            debug!(%engine, %kind, query, "Provider returned no items");
            return Ok(SearchOutcome::Empty);
        }

        info!(%engine, %kind, count = raw.len(), "Unifying provider batch");
        let results = self.unifier.unify(raw).await;

        if results.is_empty() {
            Ok(SearchOutcome::Empty)
        } else {
            Ok(SearchOutcome::Results(results))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawItem;
    use crate::enrich::{EnrichmentSignal, EnrichmentSource, SignalKind};
    use crate::resolve::{LinkResolver, LinkSet};
    use async_trait::async_trait;

    struct NullResolver;

    #[async_trait]
    impl LinkResolver for NullResolver {
        async fn resolve(&self, _canonical_url: &str) -> LinkSet {
            LinkSet::default()
        }
    }

    struct NullSource(SignalKind);

    #[async_trait]
    impl EnrichmentSource for NullSource {
        fn kind(&self) -> SignalKind {
            self.0
        }

        async fn fetch(&self, _subject: Option<&str>) -> EnrichmentSignal {
            EnrichmentSignal::neutral(self.0)
        }
    }

    /// A provider that must never be reached; selection checks come first
    struct PanicProvider(Engine);

    #[async_trait]
    impl SearchProvider for PanicProvider {
        fn engine(&self) -> Engine {
            self.0
        }

        async fn search(
            &self,
            _query: &str,
            _kind: EntityKind,
            _limit: usize,
        ) -> Result<Vec<RawItem>, ProviderError> {
            panic!("provider called before selection validation");
        }
    }

    struct FixedProvider {
        engine: Engine,
        items: Vec<RawItem>,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn engine(&self) -> Engine {
            self.engine
        }

        async fn search(
            &self,
            _query: &str,
            _kind: EntityKind,
            _limit: usize,
        ) -> Result<Vec<RawItem>, ProviderError> {
            Ok(self.items.clone())
        }
    }

    struct FailingProvider(Engine);

    #[async_trait]
    impl SearchProvider for FailingProvider {
        fn engine(&self) -> Engine {
            self.0
        }

        async fn search(
            &self,
            _query: &str,
            _kind: EntityKind,
            _limit: usize,
        ) -> Result<Vec<RawItem>, ProviderError> {
            Err(ProviderError::unavailable(self.0, "connection refused"))
        }
    }

    fn null_unifier() -> Unifier {
        Unifier::new(
            Box::new(NullResolver),
            Box::new(NullSource(SignalKind::Views)),
            Box::new(NullSource(SignalKind::Listens)),
            Box::new(NullSource(SignalKind::Followers)),
        )
    }

    fn aggregator_with(providers: Vec<Box<dyn SearchProvider>>) -> Aggregator {
        let providers = providers
            .into_iter()
            .map(|p| (p.engine(), p))
            .collect::<HashMap<_, _>>();
        Aggregator {
            providers,
            init_errors: HashMap::new(),
            unifier: null_unifier(),
            limit: 10,
        }
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_call() {
        let agg = aggregator_with(vec![Box::new(PanicProvider(Engine::Spotify))]);
        let err = agg
            .search("   ", Engine::Spotify, EntityKind::Track)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_youtube_album_rejected_before_any_call() {
        let agg = aggregator_with(vec![Box::new(PanicProvider(Engine::YouTube))]);
        let err = agg
            .search("Imagine", Engine::YouTube, EntityKind::Album)
            .await
            .unwrap_err();

        match err {
            SearchError::UnsupportedKind {
                engine,
                kind,
                supported,
            } => {
                assert_eq!(engine, Engine::YouTube);
                assert_eq!(kind, EntityKind::Album);
                assert!(supported.contains("track"));
                assert!(!supported.contains("album"));
            }
            other => panic!("expected UnsupportedKind, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_engine_reports_init_reason() {
        let mut agg = aggregator_with(vec![]);
        agg.init_errors.insert(
            Engine::Spotify,
            "client_id/client_secret missing from config".to_string(),
        );

        let err = agg
            .search("Imagine", Engine::Spotify, EntityKind::Track)
            .await
            .unwrap_err();
        match err {
            SearchError::EngineUnavailable { engine, reason } => {
                assert_eq!(engine, Engine::Spotify);
                assert!(reason.contains("client_id"));
            }
            other => panic!("expected EngineUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_search() {
        let agg = aggregator_with(vec![Box::new(FailingProvider(Engine::MusicBrainz))]);
        let err = agg
            .search("Imagine", Engine::MusicBrainz, EntityKind::Track)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Provider(_)));
    }

    #[tokio::test]
    async fn test_zero_items_is_empty_outcome_not_error() {
        let agg = aggregator_with(vec![Box::new(FixedProvider {
            engine: Engine::MusicBrainz,
            items: vec![],
        })]);

        let outcome = agg
            .search("xyzzy", Engine::MusicBrainz, EntityKind::Track)
            .await
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Empty));
    }

    #[tokio::test]
    async fn test_successful_search_produces_results() {
        // MusicBrainz artists run the whole pipeline without any
        // enrichment source, so the mocks stay silent
        let item = RawItem::new(Engine::MusicBrainz, EntityKind::Artist, "John Lennon");
        let agg = aggregator_with(vec![Box::new(FixedProvider {
            engine: Engine::MusicBrainz,
            items: vec![item],
        })]);

        let outcome = agg
            .search("John Lennon", Engine::MusicBrainz, EntityKind::Artist)
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Results(results) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].title, "John Lennon");
                assert!(results[0].links.is_empty());
            }
            SearchOutcome::Empty => panic!("expected results"),
        }
    }
}
