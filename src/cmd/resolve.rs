//! `match`, `parse`, and `resolve` subcommands.

use std::path::PathBuf;

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;

use vidsift::playback::PlaybackLink;
use vidsift::resolver::{Resolver, VideoItem};

use super::build_resolver;

/// Show the parser definition that claims `url`.
pub async fn match_url(url: &str, parsers: Option<PathBuf>, json: bool) -> Result<()> {
    let resolver = build_resolver(parsers)?;
    let found = resolver.find_parser_for_url(url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }
    match found {
        Some(parser) => {
            println!("🔍 {} (priority {})", parser.name, parser.priority);
            println!("   id:      {}", parser.id);
            println!("   pattern: {}", parser.url_pattern);
            println!("   rules:   {}", parser.rules.len());
        }
        None => println!("No parser matches {url}"),
    }
    Ok(())
}

/// Fetch one page and print the extracted video.
pub async fn parse_url(url: &str, parsers: Option<PathBuf>, json: bool) -> Result<()> {
    let resolver = build_resolver(parsers)?;

    let Some(parser) = resolver.find_parser_for_url(url).await? else {
        println!("No parser matches {url}");
        return Ok(());
    };
    let Some(video) = resolver.parse_video_page(&parser, url).await? else {
        println!("❌ {url} could not be fetched");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&video)?);
    } else {
        print_video(&video);
    }
    Ok(())
}

/// Resolve each URL end to end and report per-URL outcomes. One bad URL does
/// not stop the batch.
pub async fn resolve_urls(urls: &[String], parsers: Option<PathBuf>, json: bool) -> Result<()> {
    let resolver = build_resolver(parsers)?;
    let outcomes = join_all(urls.iter().map(|url| resolve_one(&resolver, url))).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }
    for outcome in &outcomes {
        match (&outcome.video, &outcome.error) {
            (Some(video), _) => {
                println!("✅ {}", outcome.url);
                println!("   🎬 {}", video.title);
                if outcome.links.is_empty() {
                    println!("   ⚠️  no playback links");
                }
                for link in &outcome.links {
                    println!("   ▶️  {:>6} {:<5} {}", link.quality, link.format, link.url);
                }
            }
            (None, Some(error)) => println!("❌ {}: {error}", outcome.url),
            (None, None) => println!("❌ {}: no parser or page unavailable", outcome.url),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Outcome {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VideoItem>,
    links: Vec<PlaybackLink>,
}

async fn resolve_one(resolver: &Resolver, url: &str) -> Outcome {
    match resolver.resolve_url(url).await {
        Ok(Some(video)) => {
            let links = resolver.get_playback_links(&video).await;
            Outcome {
                url: url.to_string(),
                error: None,
                video: Some(video),
                links,
            }
        }
        Ok(None) => Outcome {
            url: url.to_string(),
            error: None,
            video: None,
            links: Vec::new(),
        },
        Err(err) => Outcome {
            url: url.to_string(),
            error: Some(err.to_string()),
            video: None,
            links: Vec::new(),
        },
    }
}

fn print_video(video: &VideoItem) {
    println!("🎬 {}", video.title);
    println!("   id:     {}", video.id);
    println!("   parser: {}", video.parser_id);
    println!("   url:    {}", video.url);
    if !video.description.is_empty() {
        println!("   about:  {}", ellipsize(&video.description, 160));
    }
    for (key, value) in &video.metadata {
        println!("   {key}: {value}");
    }
    if !video.links.is_empty() {
        println!("   links:");
        for link in &video.links {
            println!("     {link}");
        }
    }
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
