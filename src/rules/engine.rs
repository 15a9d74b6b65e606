//! Ordered-rule extraction over fetched pages.
//!
//! The engine is pure: given page source, a base URL, and a rule list it
//! always produces the same [`ParsedContent`]. Rules are grouped by the field
//! they feed, tried in priority order, and the first one that yields a
//! non-empty value wins its field. Fields no rule fills fall back to document
//! defaults, so a parser with an empty rule list still produces usable
//! output.
//!
//! Broken rules never break extraction. A selector or pattern that fails to
//! compile makes that one rule a no-match and the chain moves on.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use super::{ParsedContent, Rule, RuleKind};

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
static SEL_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Attributes whose values are URLs and get resolved against the base.
const LINK_ATTRS: &[&str] = &["href", "src", "data-src", "poster"];

/// Elements whose text is invisible to readers and excluded from body text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Stateless rule interpreter.
#[derive(Debug, Default)]
pub struct RuleEngine;

enum Field<'a> {
    Title,
    Body,
    Links,
    Meta(&'a str),
}

impl RuleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run `rules` over `html` and assemble the parsed document.
    ///
    /// `base_url` anchors relative links and is recorded as the content's
    /// source. Disabled rules are ignored entirely.
    #[must_use]
    pub fn extract(&self, html: &str, base_url: &str, rules: &[Rule]) -> ParsedContent {
        let doc = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        let mut title_rules: Vec<&Rule> = Vec::new();
        let mut body_rules: Vec<&Rule> = Vec::new();
        let mut link_rules: Vec<&Rule> = Vec::new();
        let mut meta_rules: HashMap<&str, Vec<&Rule>> = HashMap::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            match field_of(rule) {
                Field::Title => title_rules.push(rule),
                Field::Body => body_rules.push(rule),
                Field::Links => link_rules.push(rule),
                Field::Meta(name) => meta_rules.entry(name).or_default().push(rule),
            }
        }
        // Stable sort: definition order breaks priority ties.
        for group in [&mut title_rules, &mut body_rules, &mut link_rules] {
            group.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        for group in meta_rules.values_mut() {
            group.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        let title = first_value(&doc, html, &base, &title_rules)
            .unwrap_or_else(|| default_title(&doc));
        let body =
            first_value(&doc, html, &base, &body_rules).unwrap_or_else(|| default_body(&doc));
        let links =
            first_links(&doc, html, &base, &link_rules).unwrap_or_else(|| default_links(&doc, &base));

        let mut metadata = HashMap::new();
        for (name, group) in &meta_rules {
            if let Some(value) = first_value(&doc, html, &base, group) {
                metadata.insert((*name).to_string(), value);
            }
        }

        ParsedContent {
            source_url: base_url.to_string(),
            title,
            body,
            metadata,
            links,
        }
    }
}

fn field_of(rule: &Rule) -> Field<'_> {
    match rule.target.as_deref().map(str::trim) {
        None => Field::Body,
        Some(t) if t.is_empty() => Field::Body,
        Some(t) if t.eq_ignore_ascii_case("title") => Field::Title,
        Some(t) if t.eq_ignore_ascii_case("body") => Field::Body,
        Some(t) if t.eq_ignore_ascii_case("links") => Field::Links,
        Some(t) => Field::Meta(t),
    }
}

/// First rule in `rules` that yields a non-empty scalar wins.
fn first_value(doc: &Html, html: &str, base: &Option<Url>, rules: &[&Rule]) -> Option<String> {
    rules.iter().find_map(|rule| apply_scalar(doc, html, base, rule))
}

fn apply_scalar(doc: &Html, html: &str, base: &Option<Url>, rule: &Rule) -> Option<String> {
    match rule.kind {
        RuleKind::TextSelector => {
            let selector = parse_selector(rule)?;
            let parts: Vec<String> = doc
                .select(&selector)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            non_empty(parts.join(" "))
        }
        RuleKind::HtmlSelector => {
            let selector = parse_selector(rule)?;
            let parts: Vec<String> = doc.select(&selector).map(|el| el.inner_html()).collect();
            non_empty(parts.join("\n").trim().to_string())
        }
        RuleKind::AttributeSelector => {
            let selector = parse_selector(rule)?;
            let attr = required_attribute(rule)?;
            let mut values = Vec::new();
            for el in doc.select(&selector) {
                if let Some(raw) = el.value().attr(attr) {
                    let value = if LINK_ATTRS.contains(&attr) {
                        absolutize(raw, base).unwrap_or_else(|| raw.trim().to_string())
                    } else {
                        raw.trim().to_string()
                    };
                    if !value.is_empty() {
                        values.push(value);
                    }
                }
            }
            non_empty(values.join(" "))
        }
        RuleKind::Regex => {
            let pattern = parse_pattern(rule)?;
            let caps = pattern.captures(html)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            non_empty(m.as_str().trim().to_string())
        }
        RuleKind::Xpath | RuleKind::JsonPath => {
            debug!(rule = %rule.name, kind = ?rule.kind, "reserved rule kind, no engine yet");
            None
        }
    }
}

/// First rule in `rules` that yields at least one link wins.
fn first_links(doc: &Html, html: &str, base: &Option<Url>, rules: &[&Rule]) -> Option<Vec<String>> {
    for rule in rules {
        let links = apply_links(doc, html, base, rule);
        if !links.is_empty() {
            return Some(links);
        }
    }
    None
}

fn apply_links(doc: &Html, html: &str, base: &Option<Url>, rule: &Rule) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    match rule.kind {
        RuleKind::AttributeSelector => {
            let Some(selector) = parse_selector(rule) else {
                return out;
            };
            let Some(attr) = required_attribute(rule) else {
                return out;
            };
            for el in doc.select(&selector) {
                if let Some(raw) = el.value().attr(attr) {
                    push_link(raw, base, &mut seen, &mut out);
                }
            }
        }
        // Selector rules scope link collection: anchors inside (or on) the
        // matched elements.
        RuleKind::TextSelector | RuleKind::HtmlSelector => {
            let Some(selector) = parse_selector(rule) else {
                return out;
            };
            for scope in doc.select(&selector) {
                if scope.value().name() == "a" {
                    if let Some(raw) = scope.value().attr("href") {
                        push_link(raw, base, &mut seen, &mut out);
                    }
                }
                for anchor in scope.select(&SEL_ANCHOR) {
                    if let Some(raw) = anchor.value().attr("href") {
                        push_link(raw, base, &mut seen, &mut out);
                    }
                }
            }
        }
        RuleKind::Regex => {
            if let Some(pattern) = parse_pattern(rule) {
                if let Some(caps) = pattern.captures(html) {
                    if let Some(m) = caps.get(1).or_else(|| caps.get(0)) {
                        push_link(m.as_str(), base, &mut seen, &mut out);
                    }
                }
            }
        }
        RuleKind::Xpath | RuleKind::JsonPath => {
            debug!(rule = %rule.name, kind = ?rule.kind, "reserved rule kind, no engine yet");
        }
    }
    out
}

fn default_title(doc: &Html) -> String {
    doc.select(&SEL_TITLE).next().map(element_text).unwrap_or_default()
}

/// Visible body text with scripts, styles, and whitespace runs removed.
fn default_body(doc: &Html) -> String {
    let Some(body) = doc.select(&SEL_BODY).next() else {
        return String::new();
    };
    let mut raw = String::new();
    visible_text(body, &mut raw);
    squash_whitespace(&raw)
}

fn visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) => {
                if !HIDDEN_ELEMENTS.contains(&element.name()) {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        visible_text(child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Every absolute hyperlink on the page, first occurrence wins.
fn default_links(doc: &Html, base: &Option<Url>) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for anchor in doc.select(&SEL_ANCHOR) {
        if let Some(raw) = anchor.value().attr("href") {
            push_link(raw, base, &mut seen, &mut out);
        }
    }
    out
}

/// Resolve, filter to http(s), and deduplicate one candidate link.
fn push_link(raw: &str, base: &Option<Url>, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    let Some(resolved) = absolutize(raw, base) else {
        return;
    };
    if !resolved.starts_with("http://") && !resolved.starts_with("https://") {
        return;
    }
    if seen.insert(resolved.clone()) {
        out.push(resolved);
    }
}

fn absolutize(raw: &str, base: &Option<Url>) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(trimmed).ok()?,
        None => Url::parse(trimmed).ok()?,
    };
    Some(resolved.to_string())
}

fn parse_selector(rule: &Rule) -> Option<Selector> {
    match Selector::parse(&rule.selector) {
        Ok(selector) => Some(selector),
        Err(err) => {
            debug!(rule = %rule.name, error = %err, "invalid css selector, rule skipped");
            None
        }
    }
}

fn parse_pattern(rule: &Rule) -> Option<Regex> {
    match Regex::new(&rule.selector) {
        Ok(pattern) => Some(pattern),
        Err(err) => {
            debug!(rule = %rule.name, error = %err, "invalid regex pattern, rule skipped");
            None
        }
    }
}

fn required_attribute(rule: &Rule) -> Option<&str> {
    let attr = rule.attribute.as_deref().map(str::trim).filter(|a| !a.is_empty());
    if attr.is_none() {
        debug!(rule = %rule.name, "attribute rule without attribute name, rule skipped");
    }
    attr
}

fn element_text(el: ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
