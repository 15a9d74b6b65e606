//! CLI subcommand implementations.

pub mod parsers;
pub mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use vidsift::playback::MediaLinkSource;
use vidsift::registry::TomlParserStore;
use vidsift::resolver::Resolver;

/// Resolver wired with the production stack and the requested (or default)
/// parser file.
pub fn build_resolver(parsers: Option<PathBuf>) -> Result<Resolver> {
    let store = Arc::new(TomlParserStore::new(parser_path(parsers)));
    let resolver = Resolver::with_defaults(store, Arc::new(MediaLinkSource::new()))?;
    Ok(resolver)
}

pub fn parser_path(parsers: Option<PathBuf>) -> PathBuf {
    parsers.unwrap_or_else(TomlParserStore::default_path)
}
