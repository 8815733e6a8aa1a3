//! Data models for extracted articles, resolved media, and batch runs.
//!
//! This module defines the core data structures used throughout the
//! application:
//! - [`Article`]: the normalized record extracted from one source page
//! - [`MediaCatalog`], [`ImageRef`], [`VideoRef`]: media discovered in the body
//! - [`BatchRun`], [`ItemResult`]: per-run bookkeeping for the orchestrator
//!
//! [`Article`] is the lossless representation: the JSON export is a full
//! dump of it and round-trips through serde.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel used when the title selectors produce nothing.
pub const TITLE_NOT_FOUND: &str = "title not found";
/// Sentinel used when the author selectors produce nothing.
pub const AUTHOR_NOT_FOUND: &str = "author not found";
/// Sentinel used when the publish-time selectors produce nothing.
pub const PUBLISH_TIME_NOT_FOUND: &str = "publish time not found";
/// Sentinel used when no body container matches.
pub const CONTENT_NOT_FOUND: &str = "content not found";

/// A normalized article extracted from one WeChat page.
///
/// `title`, `author`, and `published_at` are never empty: on extraction
/// failure they hold an explicit sentinel. `canonical_url` is rebuilt from
/// the `__biz`/`mid`/`idx`/`sn` parameters of the fetched URL when all
/// four are present, otherwise it falls back to the source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The URL the crawl was asked to fetch.
    pub source_url: String,
    /// Permanent link rebuilt from the fetched URL's query parameters.
    pub canonical_url: String,
    pub title: String,
    pub author: String,
    /// Publish time as free text, exactly as the page displays it.
    pub published_at: String,
    /// First 500 characters of the body text, for console display.
    pub content_preview: String,
    /// Full plain-text body, newline-separated visible text.
    pub body_text: String,
    /// Rewritten body serialized as HTML.
    pub content_html: String,
    pub media: MediaCatalog,
}

/// Ordered collections of media references found in an article body.
///
/// Ordering is document order of appearance; this keeps downloaded
/// filenames deterministic across re-runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaCatalog {
    pub images: Vec<ImageRef>,
    pub videos: Vec<VideoRef>,
}

impl MediaCatalog {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

/// One image discovered in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub original_url: String,
    /// Populated only when the download step succeeds.
    pub local_path: Option<PathBuf>,
}

/// Classification tag for how a video reference was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Tencent,
    EmbeddedUrl,
    Direct,
    TencentEmbed,
    Unknown,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Tencent => "tencent",
            ProviderKind::EmbeddedUrl => "embedded_url",
            ProviderKind::Direct => "direct",
            ProviderKind::TencentEmbed => "tencent_embed",
            ProviderKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One video discovered in the body.
///
/// For `ProviderKind::Tencent` refs, `candidate_urls` holds exactly three
/// speculative links ordered from most canonical to most speculative, and
/// its first element always equals `original_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    pub provider_kind: ProviderKind,
    pub original_url: String,
    /// Tencent video id, present when a `vid=` pattern matched.
    pub vid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_urls: Vec<String>,
    /// Populated only when a download attempt succeeds.
    pub local_path: Option<PathBuf>,
    /// The raw text fragment the classification ran against.
    pub raw_fragment: String,
}

/// Output formats one article can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
    Html,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
        }
    }

    /// Parse a config-file format name. Unknown names are skipped by the
    /// caller with a warning rather than failing the run.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(ExportFormat::Json),
            "text" => Some(ExportFormat::Text),
            "html" => Some(ExportFormat::Html),
            "markdown" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }

    /// Human-readable name used in the batch report.
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Text => "Text",
            ExportFormat::Html => "HTML",
            ExportFormat::Markdown => "Markdown",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One export artifact written to disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub format: ExportFormat,
    pub path: PathBuf,
}

/// Outcome of processing one URL.
#[derive(Debug)]
pub enum ItemOutcome {
    Success {
        article: Article,
        files: Vec<SavedFile>,
    },
    Failure {
        reason: String,
    },
}

/// One entry in a batch run, in input URL order.
#[derive(Debug)]
pub struct ItemResult {
    pub url: String,
    pub outcome: ItemOutcome,
}

impl ItemResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Success { .. })
    }
}

/// Aggregate counts derived from a [`BatchRun`]'s items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// The aggregate outcome of processing a set of URLs in one invocation.
///
/// Append-only while the run is in progress; the summary is always
/// recomputed from `items`, never hand-maintained.
#[derive(Debug)]
pub struct BatchRun {
    pub started_at: String,
    pub items: Vec<ItemResult>,
}

impl BatchRun {
    pub fn new(started_at: String) -> Self {
        Self {
            started_at,
            items: Vec::new(),
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.items.iter().filter(|i| i.succeeded()).count();
        BatchSummary {
            total: self.items.len(),
            succeeded,
            failed: self.items.len() - succeeded,
        }
    }
}
