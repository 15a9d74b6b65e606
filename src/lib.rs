//! vidsift - content-extraction pipeline for video aggregation apps.
//!
//! Feeds a URL through parser matching, rate-limited fetching, rule-driven
//! extraction, and playback-link resolution, with a TTL cache in front of
//! every stage:
//!
//! - **Parser registry**: per-site definitions matched by URL pattern,
//!   priority ordered, loaded from TOML or supplied in code
//! - **Rule engine**: CSS selector / regex rules over fetched HTML with
//!   sensible document defaults when no rule matches
//! - **Rate limiter**: per-host token buckets that delay instead of failing
//! - **TTL cache**: one keyspace, three expiry tiers, lazy eviction
//! - **Resolver**: the facade the app calls; absorbs upstream failures into
//!   empty answers so feeds keep rendering
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidsift::playback::MediaLinkSource;
//! use vidsift::registry::TomlParserStore;
//! use vidsift::resolver::Resolver;
//!
//! # async fn run() -> vidsift::error::Result<()> {
//! let store = Arc::new(TomlParserStore::new(TomlParserStore::default_path()));
//! let resolver = Resolver::with_defaults(store, Arc::new(MediaLinkSource::new()))?;
//!
//! if let Some(video) = resolver.resolve_url("https://tube.example/watch/1").await? {
//!     let links = resolver.get_playback_links(&video).await;
//!     println!("{}: {} playable links", video.title, links.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod fetch;
pub mod limiter;
pub mod playback;
pub mod registry;
pub mod resolver;
pub mod rules;

pub use cache::{CacheTier, TtlCache};
pub use error::{DataError, Result};
pub use fetch::{FetchGateway, HttpFetcher, PageFetcher};
pub use limiter::RateLimiter;
pub use playback::{LinkFormat, LinkQuality, LinkSource, MediaLinkSource, PlaybackLink};
pub use registry::{ParserDefinition, ParserRegistry, ParserStore, TomlParserStore};
pub use resolver::{Resolver, VideoItem};
pub use rules::{ParsedContent, Rule, RuleEngine, RuleKind};

/// Crate version, exposed for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
