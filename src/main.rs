//! # WeChat Article Crawler
//!
//! A crawler for WeChat public-account articles that turns article links
//! into clean offline copies: structured JSON plus optional text, HTML,
//! and Markdown exports, with images and videos downloaded alongside.
//!
//! ## Features
//!
//! - Extracts title, author, publish time, and the article body from
//!   `mp.weixin.qq.com` pages, with a permanent canonical link
//! - Classifies embedded videos (Tencent player, direct files, embedded
//!   links) and resolves alternate playback URLs
//! - Downloads images and videos, rewriting the body to reference the
//!   local copies
//! - Exports each article as JSON, plain text, standalone HTML, and
//!   Markdown
//! - Batch mode processes a list of links into one timestamped run
//!   directory with a summary report
//!
//! ## Usage
//!
//! ```sh
//! wechat_article_crawler -u "https://mp.weixin.qq.com/s/..." --text --markdown
//! wechat_article_crawler -f links.txt -b -m
//! ```
//!
//! ## Architecture
//!
//! Each article flows through a pipeline:
//! 1. **Fetch**: download the page (with retries and optional proxy)
//! 2. **Extract**: pull metadata and the body container out of the markup
//! 3. **Resolve**: catalog images and classify videos, downloading media
//! 4. **Rewrite**: point the body at local media and strip unsafe attributes
//! 5. **Export**: write one file per requested format

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod batch;
mod body;
mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod media;
mod models;
mod outputs;
mod pipeline;
mod rewrite;
mod utils;

use cli::Cli;
use config::Config;
use models::{ExportFormat, ItemOutcome};
use pipeline::CrawlOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("wechat_article_crawler starting up");

    // Parse CLI and merge over the config file
    let args = Cli::parse();
    debug!(?args.url, ?args.file, batch = args.batch, "Parsed CLI arguments");

    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);
    let mut config = Config::load(&config_path);

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(folder) = &args.media_folder {
        config.media_folder = folder.clone();
    }
    if let Some(proxy) = &args.proxy {
        config.proxy = proxy.clone();
    }
    if let Some(retry) = args.retry {
        config.retry_times = retry;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }

    // ---- Collect URLs ----
    let urls = collect_urls(&args).await?;
    if urls.is_empty() {
        error!("No article links given; use --url or --file");
        return Err("no article links given".into());
    }
    info!(count = urls.len(), "Collected article links");

    for url in &urls {
        config.add_url_to_history(url);
    }
    if let Err(e) = config.save(&config_path) {
        warn!(path = %config_path.display(), error = %e, "Failed to save config");
    }

    let opts = CrawlOptions {
        formats: requested_formats(&args, &config),
        download_media: args.media || args.video || config.download_media,
        download_videos: args.video || config.download_videos,
        media_folder: config.media_folder.clone(),
        external_downloader: config.external_downloader().map(str::to_string),
    };
    debug!(?opts.formats, download_media = opts.download_media, "Effective crawl options");

    let fetcher = fetch::build_fetcher(&config)?;
    let output_dir = Path::new(&config.output_dir);

    if args.batch || urls.len() > 1 {
        // ---- Batch mode ----
        let (run, batch_dir) = batch::run_batch(&fetcher, &urls, output_dir, &opts).await?;
        let summary = run.summary();
        println!(
            "Batch finished: {} total, {} succeeded, {} failed",
            summary.total, summary.succeeded, summary.failed
        );
        println!("Results in {}", batch_dir.display());
        println!("Report: {}", batch_dir.join("batch_summary.md").display());
        for item in run.items.iter().filter(|i| !i.succeeded()) {
            if let ItemOutcome::Failure { reason } = &item.outcome {
                println!("  failed: {} ({})", item.url, reason);
            }
        }
    } else {
        // ---- Single-article mode ----
        let timestamp = utils::run_timestamp();
        let article_dir = output_dir.join(format!("article_{timestamp}"));
        let stem = Path::new(&args.output)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("article_content");
        let article_id = format!("{stem}_{timestamp}");

        let (article, files) =
            pipeline::process_article(&fetcher, &urls[0], &article_id, &article_dir, &opts).await?;

        println!("Title: {}", article.title);
        println!("Author: {}", article.author);
        println!("Published: {}", article.published_at);
        println!("Link: {}", article.canonical_url);
        println!(
            "Media: {} image(s), {} video(s)",
            article.media.images.len(),
            article.media.videos.len()
        );
        println!("\nPreview:\n{}\n", article.content_preview);
        println!("Saved to {}:", article_dir.display());
        for file in &files {
            println!("  {}: {}", file.format.label(), file.path.display());
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Gather the links to crawl: `--url` first, then the link file, with
/// first-occurrence de-duplication.
async fn collect_urls(args: &Cli) -> Result<Vec<String>, Box<dyn Error>> {
    let mut urls = Vec::new();
    if let Some(url) = &args.url {
        urls.push(url.trim().to_string());
    }
    if let Some(file) = &args.file {
        let raw = tokio::fs::read_to_string(file).await.map_err(|e| {
            error!(path = %file, error = %e, "Failed to read link file");
            e
        })?;
        for line in raw.lines() {
            let line = line.trim();
            if line.starts_with("http") {
                urls.push(line.to_string());
            } else if !line.is_empty() {
                debug!(%line, "Skipping non-link line");
            }
        }
    }
    let mut seen = std::collections::HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    Ok(urls)
}

/// JSON is always exported; the other formats come from explicit flags,
/// or from the config file when no flag is given.
fn requested_formats(args: &Cli, config: &Config) -> Vec<ExportFormat> {
    let mut formats = vec![ExportFormat::Json];
    if args.text || args.html || args.markdown {
        if args.text {
            formats.push(ExportFormat::Text);
        }
        if args.html {
            formats.push(ExportFormat::Html);
        }
        if args.markdown {
            formats.push(ExportFormat::Markdown);
        }
    } else {
        for name in &config.default_formats {
            match ExportFormat::from_name(name) {
                Some(format) if !formats.contains(&format) => formats.push(format),
                Some(_) => {}
                None => warn!(%name, "Unknown format in config; skipping"),
            }
        }
    }
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(argv: &[&str]) -> Cli {
        Cli::parse_from(argv)
    }

    #[test]
    fn test_format_flags_override_config_defaults() {
        let config = Config::default();
        let args = cli(&["prog", "-u", "https://x", "--text"]);
        assert_eq!(
            requested_formats(&args, &config),
            vec![ExportFormat::Json, ExportFormat::Text]
        );
    }

    #[test]
    fn test_config_defaults_used_without_flags() {
        let config = Config::default();
        let args = cli(&["prog", "-u", "https://x"]);
        assert_eq!(
            requested_formats(&args, &config),
            vec![
                ExportFormat::Json,
                ExportFormat::Text,
                ExportFormat::Html,
                ExportFormat::Markdown
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_urls_deduplicates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.txt");
        tokio::fs::write(&path, "https://b\nnot a link\n\nhttps://a\nhttps://b\n")
            .await
            .unwrap();
        let args = cli(&[
            "prog",
            "-u",
            "https://a",
            "-f",
            path.to_str().unwrap(),
        ]);
        let urls = collect_urls(&args).await.unwrap();
        assert_eq!(urls, vec!["https://a", "https://b"]);
    }
}
