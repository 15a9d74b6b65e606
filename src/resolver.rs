//! Resolution facade.
//!
//! The four questions a video app asks, in the order it asks them: which
//! parser handles this URL, what video is on this page, how do I play it, and
//! how do I revive a dead link. Every answer is cached with a TTL matched to
//! how fast it rots, and every upstream failure past input validation is
//! absorbed into an empty answer here so feed assembly never collapses
//! because one site is down.
//!
//! Collaborators are injected: a [`ParserStore`] for definitions, a
//! [`PageFetcher`] for transport, a [`LinkSource`] for playback links, plus
//! the shared limiter and cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::{CacheTier, TtlCache};
use crate::error::{DataError, Result};
use crate::fetch::{FetchGateway, HttpFetcher, PageFetcher};
use crate::limiter::RateLimiter;
use crate::playback::{LinkSource, PlaybackLink};
use crate::registry::{ParserDefinition, ParserRegistry, ParserStore};
use crate::rules::{ParsedContent, RuleEngine};

const KEY_ALL_PARSERS: &str = "parser:all";

fn match_key(url: &str) -> String {
    format!("parser:match:{url}")
}

fn parse_key(parser_id: &str, url: &str) -> String {
    format!("parse:{parser_id}:{url}")
}

fn playback_key(video_id: &str) -> String {
    format!("playback:{video_id}")
}

fn link_key(link_id: &str) -> String {
    format!("playback:link:{link_id}")
}

/// One parsed video page, the unit the app lists and plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    /// Stable id derived from the page URL, identical across re-parses.
    pub id: String,
    /// Id of the parser definition that produced this item.
    pub parser_id: String,
    /// The page this item was parsed from.
    pub url: String,
    pub title: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
    /// Candidate URLs extracted from the page, already absolute.
    pub links: Vec<String>,
}

impl VideoItem {
    /// Assemble an item from extracted content. The id is a v5 UUID over the
    /// page URL so the same page always yields the same id.
    #[must_use]
    pub fn from_content(parser_id: &str, url: &str, content: ParsedContent) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string(),
            parser_id: parser_id.to_string(),
            url: url.to_string(),
            title: content.title,
            description: content.body,
            metadata: content.metadata,
            links: content.links,
        }
    }
}

/// URL-to-playback pipeline front end.
pub struct Resolver {
    store: Arc<dyn ParserStore>,
    links: Arc<dyn LinkSource>,
    gateway: FetchGateway,
    cache: Arc<TtlCache>,
    engine: RuleEngine,
}

impl Resolver {
    #[must_use]
    pub fn new(
        store: Arc<dyn ParserStore>,
        links: Arc<dyn LinkSource>,
        fetcher: Arc<dyn PageFetcher>,
        limiter: Arc<RateLimiter>,
        cache: Arc<TtlCache>,
    ) -> Self {
        Self {
            store,
            links,
            gateway: FetchGateway::new(fetcher, limiter),
            cache,
            engine: RuleEngine::new(),
        }
    }

    /// Resolver with the production transport, default per-host rate limits,
    /// and standard cache tiers.
    pub fn with_defaults(store: Arc<dyn ParserStore>, links: Arc<dyn LinkSource>) -> Result<Self> {
        Ok(Self::new(
            store,
            links,
            Arc::new(HttpFetcher::new()?),
            Arc::new(RateLimiter::default()),
            Arc::new(TtlCache::new()),
        ))
    }

    /// The cache shared by all operations. Exposed so embedders can size it
    /// up front or wire several resolvers to one instance.
    #[must_use]
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Which parser definition handles `url`?
    ///
    /// `Ok(None)` means no enabled definition claims the URL, or the parser
    /// store is currently unreadable. Only an invalid `url` is an error.
    pub async fn find_parser_for_url(&self, url: &str) -> Result<Option<ParserDefinition>> {
        validate_url(url)?;

        let key = match_key(url);
        if let Some(hit) = self.cache.get::<ParserDefinition>(&key) {
            debug!(url, parser = %hit.name, "parser match served from cache");
            return Ok(Some(hit));
        }

        let registry = match self.registry_snapshot().await {
            Ok(registry) => registry,
            Err(err) => {
                warn!(url, error = %err, "parser store unavailable");
                return Ok(None);
            }
        };

        match registry.find_for_url(url) {
            Some(parser) => {
                // Positive matches are stable until definitions change, so
                // they live in the long tier. Misses are not cached: a new
                // definition should claim the URL immediately.
                self.cache.put_tier(key, parser.clone(), CacheTier::Long);
                Ok(Some(parser.clone()))
            }
            None => Ok(None),
        }
    }

    /// Fetch and extract the video on `url` using `parser`.
    ///
    /// `Ok(None)` means the page could not be fetched (or the parser is
    /// disabled); extraction itself cannot fail. Only an invalid `url` is an
    /// error.
    pub async fn parse_video_page(
        &self,
        parser: &ParserDefinition,
        url: &str,
    ) -> Result<Option<VideoItem>> {
        validate_url(url)?;

        if !parser.enabled {
            debug!(parser = %parser.name, url, "parser disabled, skipping");
            return Ok(None);
        }

        let key = parse_key(&parser.id, url);
        if let Some(hit) = self.cache.get::<VideoItem>(&key) {
            debug!(url, "parsed video served from cache");
            return Ok(Some(hit));
        }

        let body = match self
            .gateway
            .fetch_page(&parser.rate_key(url), url, &parser.headers, parser.timeout())
            .await
        {
            Ok(body) => body,
            Err(err) => {
                warn!(parser = %parser.name, url, error = %err, "page fetch failed");
                return Ok(None);
            }
        };

        let base = parser.base_url.as_deref().unwrap_or(url);
        let content = self.engine.extract(&body, base, &parser.rules);
        let item = VideoItem::from_content(&parser.id, url, content);

        self.cache.put_tier(key, item.clone(), CacheTier::Default);
        Ok(Some(item))
    }

    /// Match and parse in one step.
    pub async fn resolve_url(&self, url: &str) -> Result<Option<VideoItem>> {
        match self.find_parser_for_url(url).await? {
            Some(parser) => self.parse_video_page(&parser, url).await,
            None => Ok(None),
        }
    }

    /// Playable links for `video`, freshest first knowledge wins: unexpired
    /// cached links are returned as-is, otherwise the link source is asked
    /// once and the answer cached. Failures yield an empty list, never an
    /// error.
    pub async fn get_playback_links(&self, video: &VideoItem) -> Vec<PlaybackLink> {
        let key = playback_key(&video.id);
        if let Some(cached) = self.cache.get::<Vec<PlaybackLink>>(&key) {
            let fresh: Vec<PlaybackLink> =
                cached.into_iter().filter(|link| !link.is_expired()).collect();
            if !fresh.is_empty() {
                debug!(video = %video.id, count = fresh.len(), "playback links served from cache");
                return fresh;
            }
        }

        match self.links.fetch_links(video).await {
            Ok(links) => {
                self.cache.put_tier(&key, links.clone(), CacheTier::Short);
                for link in &links {
                    self.cache.put_tier(link_key(&link.id), link.clone(), CacheTier::Short);
                }
                links.into_iter().filter(|link| !link.is_expired()).collect()
            }
            Err(err) => {
                warn!(video = %video.id, error = %err, "playback link fetch failed");
                Vec::new()
            }
        }
    }

    /// Replace a dead or expired link with a fresh one.
    ///
    /// The stale link's cache entries are dropped before asking the source,
    /// so a failed refresh cannot resurrect them. On failure the original
    /// link comes back unchanged and the caller decides whether to retry.
    pub async fn refresh_playback_link(&self, link: &PlaybackLink) -> PlaybackLink {
        self.cache.invalidate(&link_key(&link.id));
        self.cache.invalidate(&playback_key(&link.video_id));

        match self.links.refresh_link(link).await {
            Ok(fresh) => {
                self.cache.put_tier(link_key(&fresh.id), fresh.clone(), CacheTier::Short);
                fresh
            }
            Err(err) => {
                warn!(link = %link.id, error = %err, "link refresh failed, returning original");
                link.clone()
            }
        }
    }

    /// Forget all parser definitions and URL matches, forcing the next
    /// operation to reload from the store. Call after editing definitions.
    pub fn invalidate_parsers(&self) {
        self.cache.invalidate(KEY_ALL_PARSERS);
        self.cache.invalidate_prefix("parser:match:");
    }

    /// Forget one video's parsed content and playback links.
    pub fn invalidate_video(&self, video: &VideoItem) {
        self.cache.invalidate(&parse_key(&video.parser_id, &video.url));
        self.cache.invalidate(&playback_key(&video.id));
    }

    /// Definitions as an ordered registry, read through the long cache tier.
    async fn registry_snapshot(&self) -> Result<ParserRegistry> {
        if let Some(parsers) = self.cache.get::<Vec<ParserDefinition>>(KEY_ALL_PARSERS) {
            return Ok(ParserRegistry::new(parsers));
        }
        let parsers = self.store.load_parsers().await?;
        self.cache.put_tier(KEY_ALL_PARSERS, parsers.clone(), CacheTier::Long);
        Ok(ParserRegistry::new(parsers))
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(DataError::Validation("url must not be empty".into()));
    }
    if let Err(err) = Url::parse(url) {
        return Err(DataError::Validation(format!("invalid url `{url}`: {err}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::fetch::FetchResponse;
    use crate::playback::{LinkFormat, LinkQuality, StaticLinkSource};
    use crate::registry::MemoryParserStore;
    use crate::rules::{Rule, RuleKind};

    const PAGE: &str = r#"<html>
      <head><title>Fallback</title></head>
      <body>
        <h1>Hello</h1>
        <a href="/related/2">Related</a>
        <a href="https://cdn.example/clip-1080p.mp4">Download</a>
      </body>
    </html>"#;

    const PAGE_URL: &str = "https://tube.example/watch/1";

    struct FakeFetcher {
        pages: HashMap<String, FetchResponse>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serving(url: &str, response: FetchResponse) -> Arc<Self> {
            Arc::new(Self {
                pages: HashMap::from([(url.to_string(), response)]),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(
            &self,
            url: &str,
            _headers: &HashMap<String, String>,
            _timeout: Duration,
        ) -> crate::error::Result<FetchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| DataError::Network(format!("connection refused: {url}")))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ParserStore for FailingStore {
        async fn load_parsers(&self) -> crate::error::Result<Vec<ParserDefinition>> {
            Err(DataError::Unknown("store offline".into()))
        }

        async fn load_rules(&self, _parser_id: &str) -> crate::error::Result<Vec<Rule>> {
            Err(DataError::Unknown("store offline".into()))
        }
    }

    fn tube_parser() -> ParserDefinition {
        ParserDefinition {
            id: "tube".to_string(),
            name: "Tube".to_string(),
            url_pattern: r"tube\.example".to_string(),
            base_url: None,
            rules: vec![Rule {
                id: String::new(),
                name: "headline".to_string(),
                kind: RuleKind::TextSelector,
                selector: "h1".to_string(),
                attribute: None,
                target: Some("title".to_string()),
                priority: 0,
                enabled: true,
            }],
            headers: HashMap::new(),
            timeout_ms: 5_000,
            enabled: true,
            priority: 0,
        }
    }

    fn test_link(id: &str, expires_at: Option<chrono::DateTime<Utc>>) -> PlaybackLink {
        PlaybackLink {
            id: id.to_string(),
            url: format!("https://cdn.example/{id}.mp4"),
            quality: LinkQuality::Q720,
            format: LinkFormat::Mp4,
            video_id: video_id_for(PAGE_URL),
            headers: HashMap::new(),
            expires_at,
            requires_auth: false,
            metadata: HashMap::new(),
        }
    }

    fn video_id_for(url: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
    }

    fn resolver_with(
        store: Arc<dyn ParserStore>,
        links: Arc<dyn LinkSource>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> (Resolver, Arc<TtlCache>) {
        let cache = Arc::new(TtlCache::new());
        let resolver = Resolver::new(
            store,
            links,
            fetcher,
            Arc::new(RateLimiter::unlimited()),
            Arc::clone(&cache),
        );
        (resolver, cache)
    }

    fn standard_resolver() -> (Resolver, Arc<MemoryParserStore>, Arc<FakeFetcher>, Arc<TtlCache>) {
        let store = Arc::new(MemoryParserStore::new(vec![tube_parser()]));
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, cache) = resolver_with(
            Arc::clone(&store) as Arc<dyn ParserStore>,
            Arc::new(StaticLinkSource::new()),
            Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        );
        (resolver, store, fetcher, cache)
    }

    #[tokio::test]
    async fn find_parser_matches_and_caches() {
        let (resolver, store, _fetcher, cache) = standard_resolver();

        let parser = resolver.find_parser_for_url(PAGE_URL).await.unwrap().unwrap();
        assert_eq!(parser.id, "tube");
        assert_eq!(store.loads(), 1);

        // Second lookup is answered from the match cache.
        resolver.find_parser_for_url(PAGE_URL).await.unwrap().unwrap();
        assert_eq!(store.loads(), 1);
        assert!(cache.get::<ParserDefinition>(&match_key(PAGE_URL)).is_some());
    }

    #[tokio::test]
    async fn unclaimed_url_is_none_and_not_cached() {
        let (resolver, _store, _fetcher, cache) = standard_resolver();

        let url = "https://elsewhere.example/x";
        assert_eq!(resolver.find_parser_for_url(url).await.unwrap(), None);
        assert!(cache.get::<ParserDefinition>(&match_key(url)).is_none());
    }

    #[tokio::test]
    async fn invalid_url_is_a_validation_error() {
        let (resolver, _store, _fetcher, _cache) = standard_resolver();

        for bad in ["", "   ", "not a url"] {
            let err = resolver.find_parser_for_url(bad).await.unwrap_err();
            assert!(matches!(err, DataError::Validation(_)), "{bad:?} gave {err:?}");

            let err = resolver.parse_video_page(&tube_parser(), bad).await.unwrap_err();
            assert!(matches!(err, DataError::Validation(_)), "{bad:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn store_failure_degrades_to_no_match() {
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            Arc::new(FailingStore),
            Arc::new(StaticLinkSource::new()),
            fetcher as Arc<dyn PageFetcher>,
        );
        assert_eq!(resolver.find_parser_for_url(PAGE_URL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn parse_extracts_and_caches() {
        let (resolver, _store, fetcher, cache) = standard_resolver();
        let parser = tube_parser();

        let item = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        assert_eq!(item.title, "Hello");
        assert_eq!(item.url, PAGE_URL);
        assert_eq!(item.parser_id, "tube");
        assert_eq!(
            item.links,
            vec![
                "https://tube.example/related/2",
                "https://cdn.example/clip-1080p.mp4"
            ]
        );
        assert_eq!(fetcher.calls(), 1);

        // Re-parse hits the cache, not the network.
        let again = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        assert_eq!(again, item);
        assert_eq!(fetcher.calls(), 1);
        assert!(cache.get::<VideoItem>(&parse_key("tube", PAGE_URL)).is_some());
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_none_and_is_not_cached() {
        let store = Arc::new(MemoryParserStore::new(vec![tube_parser()]));
        let fetcher = FakeFetcher::serving(
            PAGE_URL,
            FetchResponse {
                status: 503,
                body: String::new(),
                retry_after: None,
            },
        );
        let (resolver, cache) = resolver_with(
            store,
            Arc::new(StaticLinkSource::new()),
            Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        );

        let parser = tube_parser();
        assert_eq!(resolver.parse_video_page(&parser, PAGE_URL).await.unwrap(), None);
        assert!(cache.get::<VideoItem>(&parse_key("tube", PAGE_URL)).is_none());

        // Failures are retried, not remembered.
        assert_eq!(resolver.parse_video_page(&parser, PAGE_URL).await.unwrap(), None);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn disabled_parser_parses_nothing() {
        let (resolver, _store, fetcher, _cache) = standard_resolver();
        let mut parser = tube_parser();
        parser.enabled = false;

        assert_eq!(resolver.parse_video_page(&parser, PAGE_URL).await.unwrap(), None);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn video_id_is_stable_across_reparses() {
        let (resolver, _store, _fetcher, _cache) = standard_resolver();
        let parser = tube_parser();

        let first = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        resolver.invalidate_video(&first);
        let second = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id, video_id_for(PAGE_URL));
    }

    #[tokio::test]
    async fn base_url_override_anchors_relative_links() {
        let store = Arc::new(MemoryParserStore::new(Vec::new()));
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            store,
            Arc::new(StaticLinkSource::new()),
            fetcher as Arc<dyn PageFetcher>,
        );

        let mut parser = tube_parser();
        parser.base_url = Some("https://mirror.example/".to_string());
        let item = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        assert_eq!(item.links[0], "https://mirror.example/related/2");
    }

    #[tokio::test]
    async fn resolve_url_composes_match_and_parse() {
        let (resolver, _store, _fetcher, _cache) = standard_resolver();

        let item = resolver.resolve_url(PAGE_URL).await.unwrap().unwrap();
        assert_eq!(item.title, "Hello");

        assert_eq!(resolver.resolve_url("https://elsewhere.example/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn playback_links_come_from_cache_after_first_fetch() {
        let video = VideoItem::from_content("tube", PAGE_URL, ParsedContent::default());
        let source = Arc::new(
            StaticLinkSource::new().with_links(&video.id, vec![test_link("l1", None)]),
        );
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::clone(&source) as Arc<dyn LinkSource>,
            fetcher as Arc<dyn PageFetcher>,
        );

        assert_eq!(resolver.get_playback_links(&video).await.len(), 1);
        assert_eq!(source.fetch_calls(), 1);

        assert_eq!(resolver.get_playback_links(&video).await.len(), 1);
        assert_eq!(source.fetch_calls(), 1);
        assert!(cache.get::<PlaybackLink>(&link_key("l1")).is_some());
    }

    #[tokio::test]
    async fn expired_cached_links_are_filtered_and_refetched() {
        let video = VideoItem::from_content("tube", PAGE_URL, ParsedContent::default());
        let expired = test_link("dead", Some(Utc::now() - ChronoDuration::minutes(5)));
        let source = Arc::new(StaticLinkSource::new().with_links(&video.id, vec![expired]));
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::clone(&source) as Arc<dyn LinkSource>,
            fetcher as Arc<dyn PageFetcher>,
        );

        // The source only knows an expired link: callers get nothing.
        assert!(resolver.get_playback_links(&video).await.is_empty());
        assert_eq!(source.fetch_calls(), 1);

        // The cached list holds no live link, so the source is asked again.
        assert!(resolver.get_playback_links(&video).await.is_empty());
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn mixed_expiry_returns_only_live_links() {
        let video = VideoItem::from_content("tube", PAGE_URL, ParsedContent::default());
        let live = test_link("live", Some(Utc::now() + ChronoDuration::hours(1)));
        let dead = test_link("dead", Some(Utc::now() - ChronoDuration::hours(1)));
        let source = Arc::new(
            StaticLinkSource::new().with_links(&video.id, vec![dead, live.clone()]),
        );
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::clone(&source) as Arc<dyn LinkSource>,
            fetcher as Arc<dyn PageFetcher>,
        );

        let links = resolver.get_playback_links(&video).await;
        assert_eq!(links, vec![live.clone()]);

        // Cache hit path filters the same way.
        let links = resolver.get_playback_links(&video).await;
        assert_eq!(links, vec![live]);
        assert_eq!(source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn link_source_failure_degrades_to_empty() {
        let video = VideoItem::from_content("tube", PAGE_URL, ParsedContent::default());
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::new(StaticLinkSource::new()), // knows no videos
            fetcher as Arc<dyn PageFetcher>,
        );
        assert!(resolver.get_playback_links(&video).await.is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_link_and_cache_entries() {
        let video = VideoItem::from_content("tube", PAGE_URL, ParsedContent::default());
        let stale = test_link("l1", Some(Utc::now() - ChronoDuration::minutes(1)));
        let fresh = test_link("l1", Some(Utc::now() + ChronoDuration::hours(2)));
        let source = Arc::new(
            StaticLinkSource::new()
                .with_links(&video.id, vec![stale.clone()])
                .with_refreshed("l1", fresh.clone()),
        );
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::clone(&source) as Arc<dyn LinkSource>,
            fetcher as Arc<dyn PageFetcher>,
        );

        resolver.get_playback_links(&video).await;
        let replacement = resolver.refresh_playback_link(&stale).await;
        assert_eq!(replacement, fresh);
        assert!(!replacement.is_expired());

        // The stale playback list is gone; the fresh link is cached.
        assert!(cache.get::<Vec<PlaybackLink>>(&playback_key(&video.id)).is_none());
        assert_eq!(cache.get::<PlaybackLink>(&link_key("l1")), Some(fresh));
    }

    #[tokio::test]
    async fn failed_refresh_returns_original_unchanged() {
        let stale = test_link("l1", Some(Utc::now() - ChronoDuration::minutes(1)));
        let fetcher = FakeFetcher::serving(PAGE_URL, FetchResponse::ok(PAGE));
        let (resolver, _cache) = resolver_with(
            Arc::new(MemoryParserStore::new(Vec::new())),
            Arc::new(StaticLinkSource::new()),
            fetcher as Arc<dyn PageFetcher>,
        );

        let result = resolver.refresh_playback_link(&stale).await;
        assert_eq!(result, stale);
    }

    #[tokio::test]
    async fn invalidate_parsers_forces_store_reload() {
        let (resolver, store, _fetcher, _cache) = standard_resolver();

        resolver.find_parser_for_url(PAGE_URL).await.unwrap();
        assert_eq!(store.loads(), 1);

        resolver.invalidate_parsers();
        resolver.find_parser_for_url(PAGE_URL).await.unwrap();
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn invalidate_video_clears_parse_and_playback() {
        let (resolver, _store, fetcher, cache) = standard_resolver();
        let parser = tube_parser();

        let item = resolver.parse_video_page(&parser, PAGE_URL).await.unwrap().unwrap();
        resolver.invalidate_video(&item);
        assert!(cache.get::<VideoItem>(&parse_key("tube", PAGE_URL)).is_none());

        resolver.parse_video_page(&parser, PAGE_URL).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }
}
