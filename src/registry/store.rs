//! Parser definition stores.
//!
//! The shipped store reads a TOML file from the user's config directory; a
//! missing file just means "no parsers yet". [`MemoryParserStore`] serves
//! embedders and tests that assemble definitions in code.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::rules::Rule;

use super::{ParserDefinition, ParserStore};

/// On-disk store: a single TOML file with a `[[parsers]]` table per
/// definition and nested `[[parsers.rules]]` tables.
pub struct TomlParserStore {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct ParsersFile {
    #[serde(default)]
    parsers: Vec<ParserDefinition>,
}

impl TomlParserStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/vidsift/parsers.toml`, falling back to the working
    /// directory when the platform has no config dir.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidsift")
            .join("parsers.toml")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ParserStore for TomlParserStore {
    async fn load_parsers(&self) -> Result<Vec<ParserDefinition>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no parser file, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(DataError::Unknown(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        let file: ParsersFile = toml::from_str(&text).map_err(|err| {
            DataError::Parse(format!(
                "invalid parser definitions in {}: {err}",
                self.path.display()
            ))
        })?;
        debug!(path = %self.path.display(), count = file.parsers.len(), "loaded parser definitions");
        Ok(file.parsers)
    }

    async fn load_rules(&self, parser_id: &str) -> Result<Vec<Rule>> {
        let parsers = self.load_parsers().await?;
        parsers
            .into_iter()
            .find(|p| p.id == parser_id)
            .map(|p| p.rules)
            .ok_or_else(|| DataError::NotFound(format!("parser {parser_id}")))
    }
}

/// In-memory store with a load counter, handy for asserting cache
/// read-through behavior.
#[derive(Default)]
pub struct MemoryParserStore {
    parsers: Vec<ParserDefinition>,
    loads: AtomicUsize,
}

impl MemoryParserStore {
    #[must_use]
    pub fn new(parsers: Vec<ParserDefinition>) -> Self {
        Self {
            parsers,
            loads: AtomicUsize::new(0),
        }
    }

    /// How many times `load_parsers` has been called.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ParserStore for MemoryParserStore {
    async fn load_parsers(&self) -> Result<Vec<ParserDefinition>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.parsers.clone())
    }

    async fn load_rules(&self, parser_id: &str) -> Result<Vec<Rule>> {
        self.parsers
            .iter()
            .find(|p| p.id == parser_id)
            .map(|p| p.rules.clone())
            .ok_or_else(|| DataError::NotFound(format!("parser {parser_id}")))
    }
}
