//! Single-article pipeline: fetch, extract, resolve media, rewrite, export.

use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::error::CrawlError;
use crate::extract;
use crate::fetch::Fetch;
use crate::media;
use crate::models::{Article, ExportFormat, SavedFile, CONTENT_NOT_FOUND};
use crate::outputs;
use crate::rewrite;
use crate::utils;

/// Knobs for one crawl, already merged from CLI and config.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub formats: Vec<ExportFormat>,
    pub download_media: bool,
    pub download_videos: bool,
    pub media_folder: String,
    pub external_downloader: Option<String>,
}

/// Crawl one article into `article_dir`, writing one file per format
/// named `{article_id}.{ext}` plus any downloaded media.
pub async fn process_article<F: Fetch>(
    fetcher: &F,
    url: &str,
    article_id: &str,
    article_dir: &Path,
    opts: &CrawlOptions,
) -> Result<(Article, Vec<SavedFile>), CrawlError> {
    info!(%url, article_id, "Processing article");

    let page = fetcher.get_page(url).await?;
    let extraction = extract::extract(&page.body, url, &page.final_url)?;

    fs::create_dir_all(article_dir)
        .await
        .map_err(|e| CrawlError::OutputDir {
            path: article_dir.to_path_buf(),
            source: e,
        })?;

    let article = match extraction.body {
        Some(mut body) => {
            let mut catalog = media::resolve(&mut body);

            if opts.download_media && !catalog.is_empty() {
                let media_dir = article_dir.join(&opts.media_folder);
                fs::create_dir_all(&media_dir)
                    .await
                    .map_err(|e| CrawlError::OutputDir {
                        path: media_dir.clone(),
                        source: e,
                    })?;
                let prefix = utils::safe_prefix(&extraction.title);
                media::download_images(fetcher, &mut catalog, &media_dir, &prefix).await;
                if opts.download_videos {
                    media::download_videos(
                        fetcher,
                        &mut catalog,
                        &media_dir,
                        &prefix,
                        opts.external_downloader.as_deref(),
                    )
                    .await;
                }
            }

            let rewritten = rewrite::rewrite(&mut body, &catalog, article_dir);
            Article {
                source_url: url.to_string(),
                canonical_url: extraction.canonical_url,
                title: extraction.title,
                author: extraction.author,
                published_at: extraction.published_at,
                content_preview: utils::preview(&rewritten.body_text, 500),
                body_text: rewritten.body_text,
                content_html: rewritten.content_html,
                media: catalog,
            }
        }
        None => {
            warn!(%url, "No article body found");
            Article {
                source_url: url.to_string(),
                canonical_url: extraction.canonical_url,
                title: extraction.title,
                author: extraction.author,
                published_at: extraction.published_at,
                content_preview: CONTENT_NOT_FOUND.to_string(),
                body_text: CONTENT_NOT_FOUND.to_string(),
                content_html: String::new(),
                media: Default::default(),
            }
        }
    };

    let files = outputs::write_all(
        &article,
        article_dir,
        article_id,
        &opts.formats,
        opts.download_media,
    )
    .await;
    info!(
        title = %article.title,
        files = files.len(),
        "Article exported"
    );
    Ok((article, files))
}
