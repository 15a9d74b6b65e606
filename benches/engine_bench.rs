//! Benchmarks for rule-driven extraction.
//!
//! Measures selector and regex rule evaluation against pages of realistic
//! size, plus the default-extraction path used when a parser ships no rules.
//!
//! Run with: `cargo bench --bench engine_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vidsift::rules::{Rule, RuleEngine, RuleKind};

const BASE: &str = "https://tube.example/watch/42";

// ---------------------------------------------------------------------------
// Page fixtures
// ---------------------------------------------------------------------------

/// Synthetic watch page with `items` related-video entries.
fn watch_page(items: usize) -> String {
    let mut page = String::from(
        r#"<html>
<head><title>Benchmark Video</title></head>
<body>
<h1 class="video-title">A Longer Documentary Title For Benchmarks</h1>
<p class="summary">Two hours of benchmark footage, narrated.</p>
<video poster="/thumbs/main.jpg">
  <source src="/media/main-1080p.mp4" type="video/mp4">
</video>
"#,
    );
    for i in 0..items {
        page.push_str(&format!(
            r#"<div class="related">
  <h2>Related clip {i}</h2>
  <a href="/videos/{i}">Watch</a>
  <p>Description for clip {i} with some filler text to parse.</p>
</div>
"#
        ));
    }
    page.push_str("</body></html>");
    page
}

fn rule(name: &str, kind: RuleKind, selector: &str, target: &str) -> Rule {
    Rule {
        id: String::new(),
        name: name.to_string(),
        kind,
        selector: selector.to_string(),
        attribute: None,
        target: Some(target.to_string()),
        priority: 0,
        enabled: true,
    }
}

fn selector_rules() -> Vec<Rule> {
    vec![
        rule("title", RuleKind::TextSelector, ".video-title", "title"),
        rule("summary", RuleKind::TextSelector, ".summary", "body"),
        rule("related", RuleKind::TextSelector, ".related", "links"),
    ]
}

fn regex_rules() -> Vec<Rule> {
    vec![
        rule("title", RuleKind::Regex, r#"<h1[^>]*>([^<]+)</h1>"#, "title"),
        rule("stream", RuleKind::Regex, r#"src="([^"]+\.mp4)""#, "links"),
    ]
}

fn attribute_rules() -> Vec<Rule> {
    let mut sources = rule("sources", RuleKind::AttributeSelector, "source", "links");
    sources.attribute = Some("src".to_string());
    let mut poster = rule("poster", RuleKind::AttributeSelector, "video", "thumbnail");
    poster.attribute = Some("poster".to_string());
    vec![sources, poster]
}

// ---------------------------------------------------------------------------
// Extraction benchmarks
// ---------------------------------------------------------------------------

fn bench_selector_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_selectors");
    let engine = RuleEngine::new();
    let rules = selector_rules();

    for items in [10, 100] {
        let page = watch_page(items);
        group.bench_function(format!("{items}_items"), |b| {
            b.iter(|| black_box(engine.extract(black_box(&page), BASE, &rules)));
        });
    }

    group.finish();
}

fn bench_regex_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_regex");
    let engine = RuleEngine::new();
    let rules = regex_rules();

    for items in [10, 100] {
        let page = watch_page(items);
        group.bench_function(format!("{items}_items"), |b| {
            b.iter(|| black_box(engine.extract(black_box(&page), BASE, &rules)));
        });
    }

    group.finish();
}

fn bench_attribute_extraction(c: &mut Criterion) {
    let engine = RuleEngine::new();
    let rules = attribute_rules();
    let page = watch_page(50);

    c.bench_function("engine_attributes", |b| {
        b.iter(|| black_box(engine.extract(black_box(&page), BASE, &rules)));
    });
}

fn bench_default_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_defaults");
    let engine = RuleEngine::new();

    // No rules at all: document title + visible body + every anchor.
    for items in [10, 100] {
        let page = watch_page(items);
        group.bench_function(format!("{items}_items"), |b| {
            b.iter(|| black_box(engine.extract(black_box(&page), BASE, &[])));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_selector_extraction,
    bench_regex_extraction,
    bench_attribute_extraction,
    bench_default_extraction,
);

criterion_main!(benches);
