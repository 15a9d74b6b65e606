//! Extraction rule model.
//!
//! Rules are declarative: a parser definition carries an ordered list of them
//! and the [`engine`] evaluates the list against fetched HTML. Nothing here
//! touches the network.

pub mod engine;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use engine::RuleEngine;

/// How a rule locates its value inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    /// CSS selector; yields the matched elements' text.
    TextSelector,
    /// CSS selector; yields the matched elements' inner HTML.
    HtmlSelector,
    /// CSS selector plus attribute name; yields the attribute values.
    AttributeSelector,
    /// Regular expression over the raw page source; yields the first capture
    /// group, or the whole match when there are no groups.
    Regex,
    /// Reserved for a future engine. Parsed from definitions but never
    /// produces a value.
    Xpath,
    /// Reserved for a future engine. Parsed from definitions but never
    /// produces a value.
    JsonPath,
}

/// One extraction instruction inside a parser definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub kind: RuleKind,
    /// CSS selector or regex pattern, depending on `kind`.
    pub selector: String,
    /// Attribute to read, required for [`RuleKind::AttributeSelector`].
    #[serde(default)]
    pub attribute: Option<String>,
    /// Output field this rule feeds: `title`, `body`, `links`, or any other
    /// name for a metadata entry. Untargeted rules feed `body`.
    #[serde(default)]
    pub target: Option<String>,
    /// Higher priority rules are tried first within their target field.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Structured output of running a rule set over one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedContent {
    /// URL the relative links were resolved against.
    pub source_url: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Absolute http(s) URLs, deduplicated, in first-appearance order.
    #[serde(default)]
    pub links: Vec<String>,
}
