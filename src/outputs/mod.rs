//! Output generation modules for the four export formats.
//!
//! # Submodules
//!
//! - [`json`]: lossless structural dump of an [`Article`](crate::models::Article)
//! - [`text`]: plain-text rendition with a metadata header
//! - [`html`]: self-contained HTML document
//! - [`markdown`]: Markdown document with a structural body conversion
//!
//! JSON is the round-trippable format; the other three are derived and
//! lossy. A failure in one format is logged and reported but never
//! aborts the remaining formats for the same article.
//!
//! # Output Structure
//!
//! ```text
//! outputs/
//! └── batch_20250506_183025/
//!     ├── batch_summary.md
//!     └── article_001_20250506_183025/
//!         ├── article_001_20250506_183025.json
//!         ├── article_001_20250506_183025.txt
//!         ├── article_001_20250506_183025.html
//!         ├── article_001_20250506_183025.md
//!         └── media/
//!             └── {prefix}_img_1.jpg
//! ```

use std::path::Path;

use tracing::{error, info};

use crate::models::{Article, ExportFormat, SavedFile};

pub mod html;
pub mod json;
pub mod markdown;
pub mod text;

/// Write every requested format for one article into `dir`.
///
/// Returns the artifacts that were actually written; per-format failures
/// are logged and skipped.
pub async fn write_all(
    article: &Article,
    dir: &Path,
    id: &str,
    formats: &[ExportFormat],
    download_media: bool,
) -> Vec<SavedFile> {
    let mut saved = Vec::new();
    for format in formats {
        let path = dir.join(format!("{id}.{}", format.extension()));
        let result = match format {
            ExportFormat::Json => json::write(article, &path).await,
            ExportFormat::Text => text::write(article, &path).await,
            ExportFormat::Html => html::write(article, &path, download_media).await,
            ExportFormat::Markdown => markdown::write(article, &path).await,
        };
        match result {
            Ok(()) => {
                info!(format = %format, path = %path.display(), "Wrote export");
                saved.push(SavedFile {
                    format: *format,
                    path,
                });
            }
            Err(e) => error!(error = %e, "Export failed; continuing with remaining formats"),
        }
    }
    saved
}
