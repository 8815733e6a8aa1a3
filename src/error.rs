//! Error types for the crawl pipeline.
//!
//! Retries happen only inside the fetch layer; everything above it sees a
//! terminal value. Degraded extraction (sentinel fields) and media
//! resolution gaps are represented as data, not errors. Per-format export
//! failures abort only the format being written, never the article.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ExportFormat;

/// Failure of the HTTP layer. `Status` and `Transport` are retryable by
/// the retry decorator; `RetriesExhausted` is terminal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },
}

/// Failure of article extraction. A page that parses but misses fields is
/// not an error; this only covers pages that are blocked or removed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("article access restricted: {0}")]
    AccessRestricted(String),
}

/// A single output format failed to write. Other formats for the same
/// article are unaffected.
#[derive(Debug, Error)]
#[error("failed to write {format} export to {path}: {source}")]
pub struct ExportError {
    pub format: ExportFormat,
    pub path: PathBuf,
    #[source]
    pub source: ExportCause,
}

#[derive(Debug, Error)]
pub enum ExportCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Terminal failure of one article, recorded by the batch orchestrator.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
