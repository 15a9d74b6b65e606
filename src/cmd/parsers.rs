//! `parsers` subcommand.

use std::path::PathBuf;

use anyhow::Result;

use vidsift::registry::{ParserRegistry, ParserStore, TomlParserStore};

/// List parser definitions in registry order. Disabled definitions are
/// hidden unless `all` is set.
pub async fn list(parsers: Option<PathBuf>, all: bool, json: bool) -> Result<()> {
    let path = super::parser_path(parsers);
    let store = TomlParserStore::new(&path);
    let registry = ParserRegistry::new(store.load_parsers().await?);

    let shown: Vec<_> = if all {
        registry.all().iter().collect()
    } else {
        registry.active()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    if shown.is_empty() {
        println!("No parser definitions in {}", path.display());
        return Ok(());
    }

    println!("📚 {} parser definition(s) from {}", shown.len(), path.display());
    for parser in shown {
        let marker = if parser.enabled { "✓" } else { "✗" };
        println!(
            "  {marker} {:<24} priority {:>4}  {} rule(s)",
            parser.name,
            parser.priority,
            parser.rules.len()
        );
        println!("      pattern: {}", parser.url_pattern);
    }
    Ok(())
}
