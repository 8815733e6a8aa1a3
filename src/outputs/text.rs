//! Plain-text export: metadata header, video links, full body text.

use std::path::Path;

use tokio::fs;

use crate::error::{ExportCause, ExportError};
use crate::models::{Article, ExportFormat};

pub fn render(article: &Article) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", article.title));
    out.push_str(&format!("Author: {}\n", article.author));
    out.push_str(&format!("Published: {}\n", article.published_at));
    out.push_str(&format!("Link: {}\n\n", article.canonical_url));

    if !article.media.videos.is_empty() {
        out.push_str("Video links:\n");
        for (i, video) in article.media.videos.iter().enumerate() {
            match &video.local_path {
                Some(path) => out.push_str(&format!(
                    "Video {}: downloaded to {}\n",
                    i + 1,
                    path.display()
                )),
                None => out.push_str(&format!("Video {}: {}\n", i + 1, video.original_url)),
            }
        }
        out.push('\n');
    }

    out.push_str(&article.body_text);
    out
}

pub async fn write(article: &Article, path: &Path) -> Result<(), ExportError> {
    fs::write(path, render(article))
        .await
        .map_err(|e| ExportError {
            format: ExportFormat::Text,
            path: path.to_path_buf(),
            source: ExportCause::Io(e),
        })
}
