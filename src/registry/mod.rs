//! Parser definitions and URL-to-parser matching.
//!
//! A [`ParserDefinition`] describes how one site is handled: which URLs it
//! claims, how to fetch them, and which [`Rule`]s extract the content. The
//! [`ParserRegistry`] answers "who handles this URL" deterministically:
//! definitions are ordered by priority (descending) with name as tiebreaker,
//! and the first enabled definition whose pattern matches wins.

pub mod store;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::rules::Rule;

pub use store::{MemoryParserStore, TomlParserStore};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_enabled() -> bool {
    true
}

/// Site-specific extraction recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserDefinition {
    pub id: String,
    pub name: String,
    /// Regex tested (unanchored) against candidate URLs.
    pub url_pattern: String,
    /// Base for resolving relative links; the page URL is used when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Extra request headers, e.g. a Referer the site insists on.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher priority definitions are consulted first.
    #[serde(default)]
    pub priority: i32,
}

impl ParserDefinition {
    /// Whether this definition claims `url`.
    ///
    /// The pattern is compiled at match time; a pattern that fails to compile
    /// matches nothing rather than poisoning the registry.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match Regex::new(&self.url_pattern) {
            Ok(pattern) => pattern.is_match(url),
            Err(err) => {
                debug!(parser = %self.name, error = %err, "invalid url pattern, parser matches nothing");
                false
            }
        }
    }

    /// Per-request timeout for pages fetched through this definition.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rate-limit bucket key for a fetch of `url`: the URL's host, so all
    /// parsers hitting one site share a budget. Falls back to the parser id
    /// for unparseable or host-less URLs.
    #[must_use]
    pub fn rate_key(&self, url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Immutable, ordered snapshot of parser definitions.
pub struct ParserRegistry {
    definitions: Vec<ParserDefinition>,
}

impl ParserRegistry {
    /// Build a registry, sorting definitions by priority descending and name
    /// ascending so lookups are deterministic regardless of input order.
    #[must_use]
    pub fn new(mut definitions: Vec<ParserDefinition>) -> Self {
        definitions.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Self { definitions }
    }

    /// First enabled definition whose pattern matches `url`.
    #[must_use]
    pub fn find_for_url(&self, url: &str) -> Option<&ParserDefinition> {
        self.definitions
            .iter()
            .filter(|def| def.enabled)
            .find(|def| def.matches(url))
    }

    /// All definitions in registry order, disabled ones included.
    #[must_use]
    pub fn all(&self) -> &[ParserDefinition] {
        &self.definitions
    }

    /// Enabled definitions in registry order.
    #[must_use]
    pub fn active(&self) -> Vec<&ParserDefinition> {
        self.definitions.iter().filter(|def| def.enabled).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Source of parser definitions: a config file, an embedded set, or a remote
/// catalog. The registry never does I/O itself.
#[async_trait]
pub trait ParserStore: Send + Sync {
    /// Load every known definition, enabled or not.
    async fn load_parsers(&self) -> Result<Vec<ParserDefinition>>;

    /// Load the rule list for one parser.
    async fn load_rules(&self, parser_id: &str) -> Result<Vec<Rule>>;
}
