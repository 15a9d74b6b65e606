//! Playback links and the sources that produce them.
//!
//! A [`PlaybackLink`] is what the player ultimately consumes: a direct media
//! URL plus everything needed to use it (quality, container, headers, expiry).
//! Sources implement [`LinkSource`]; the shipped [`MediaLinkSource`] derives
//! links from URLs already present in parsed content, which covers sites that
//! embed direct `.mp4`/`.m3u8` addresses in their pages.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{DataError, Result};
use crate::resolver::VideoItem;

static QUALITY_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{3,4})p").expect("static pattern"));

/// Video quality ladder. `Auto` covers adaptive manifests that pick their own
/// rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkQuality {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "240p")]
    Q240,
    #[serde(rename = "360p")]
    Q360,
    #[serde(rename = "480p")]
    Q480,
    #[serde(rename = "720p")]
    Q720,
    #[serde(rename = "1080p")]
    Q1080,
    #[serde(rename = "1440p")]
    Q1440,
    #[serde(rename = "2160p")]
    Q2160,
}

impl LinkQuality {
    /// Bucket a pixel height into the ladder.
    #[must_use]
    pub fn from_height(height: u32) -> Self {
        match height {
            h if h >= 2160 => Self::Q2160,
            h if h >= 1440 => Self::Q1440,
            h if h >= 1080 => Self::Q1080,
            h if h >= 720 => Self::Q720,
            h if h >= 480 => Self::Q480,
            h if h >= 360 => Self::Q360,
            h if h >= 240 => Self::Q240,
            _ => Self::Auto,
        }
    }
}

impl fmt::Display for LinkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auto => "auto",
            Self::Q240 => "240p",
            Self::Q360 => "360p",
            Self::Q480 => "480p",
            Self::Q720 => "720p",
            Self::Q1080 => "1080p",
            Self::Q1440 => "1440p",
            Self::Q2160 => "2160p",
        };
        f.pad(label)
    }
}

/// Container or streaming protocol of a playback link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFormat {
    Mp4,
    Webm,
    Hls,
    Dash,
    Unknown,
}

impl fmt::Display for LinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Unknown => "unknown",
        };
        f.pad(label)
    }
}

/// One playable stream for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackLink {
    pub id: String,
    pub url: String,
    pub quality: LinkQuality,
    pub format: LinkFormat,
    /// Id of the [`VideoItem`] this link plays.
    pub video_id: String,
    /// Headers the player must send, e.g. a Referer the CDN checks.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Some CDNs sign their URLs; past this instant the link is dead.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PlaybackLink {
    /// Whether the link's expiry timestamp has passed. Links without one
    /// never expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Where playback links come from: page-derived, a site API, or a fixture.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// All currently known links for `video`. An empty list is a valid
    /// answer.
    async fn fetch_links(&self, video: &VideoItem) -> Result<Vec<PlaybackLink>>;

    /// Obtain a fresh replacement for an expired or dead link.
    async fn refresh_link(&self, link: &PlaybackLink) -> Result<PlaybackLink>;
}

/// Derives playback links from media URLs the rule engine already extracted:
/// every link or metadata value with a recognized media extension becomes a
/// [`PlaybackLink`].
#[derive(Debug, Default)]
pub struct MediaLinkSource;

impl MediaLinkSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Map a URL's path extension to a format. Query strings and fragments
    /// are ignored.
    fn classify(url: &str) -> Option<LinkFormat> {
        let path = Url::parse(url).map(|u| u.path().to_string()).ok()?;
        let ext = path.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "m3u8" => Some(LinkFormat::Hls),
            "mpd" => Some(LinkFormat::Dash),
            "mp4" | "m4v" => Some(LinkFormat::Mp4),
            "webm" => Some(LinkFormat::Webm),
            _ => None,
        }
    }

    /// Guess the rendition from a `720p`-style marker in the URL. Adaptive
    /// manifests stay `Auto`.
    fn quality_of(url: &str, format: LinkFormat) -> LinkQuality {
        if matches!(format, LinkFormat::Hls | LinkFormat::Dash) {
            return LinkQuality::Auto;
        }
        QUALITY_HINT
            .captures(url)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map_or(LinkQuality::Auto, LinkQuality::from_height)
    }
}

#[async_trait]
impl LinkSource for MediaLinkSource {
    async fn fetch_links(&self, video: &VideoItem) -> Result<Vec<PlaybackLink>> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        // Extracted links first (they are ordered), then metadata values in
        // key order so output is deterministic.
        let mut metadata: Vec<_> = video.metadata.iter().collect();
        metadata.sort_by_key(|(key, _)| key.as_str());
        let candidates = video
            .links
            .iter()
            .chain(metadata.into_iter().map(|(_, value)| value));

        for url in candidates {
            let Some(format) = Self::classify(url) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            links.push(PlaybackLink {
                id: Uuid::new_v4().to_string(),
                url: url.clone(),
                quality: Self::quality_of(url, format),
                format,
                video_id: video.id.clone(),
                headers: HashMap::new(),
                expires_at: None,
                requires_auth: false,
                metadata: HashMap::new(),
            });
        }
        debug!(video = %video.id, count = links.len(), "derived playback links");
        Ok(links)
    }

    async fn refresh_link(&self, link: &PlaybackLink) -> Result<PlaybackLink> {
        // Page-derived links have nothing to re-sign against.
        Err(DataError::NotFound(format!(
            "no refresh source for link {}",
            link.id
        )))
    }
}

/// Fixture source with canned answers and call counters.
#[derive(Default)]
pub struct StaticLinkSource {
    links: Mutex<HashMap<String, Vec<PlaybackLink>>>,
    refreshed: Mutex<HashMap<String, PlaybackLink>>,
    fetch_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StaticLinkSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_links(self, video_id: &str, links: Vec<PlaybackLink>) -> Self {
        self.links
            .lock()
            .expect("fixture lock")
            .insert(video_id.to_string(), links);
        self
    }

    #[must_use]
    pub fn with_refreshed(self, link_id: &str, link: PlaybackLink) -> Self {
        self.refreshed
            .lock()
            .expect("fixture lock")
            .insert(link_id.to_string(), link);
        self
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkSource for StaticLinkSource {
    async fn fetch_links(&self, video: &VideoItem) -> Result<Vec<PlaybackLink>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.links
            .lock()
            .expect("fixture lock")
            .get(&video.id)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("video {}", video.id)))
    }

    async fn refresh_link(&self, link: &PlaybackLink) -> Result<PlaybackLink> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed
            .lock()
            .expect("fixture lock")
            .get(&link.id)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("link {}", link.id)))
    }
}
