//! Batch orchestration: process a list of URLs sequentially into one
//! timestamped run directory, then write a summary report.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info};

use crate::error::CrawlError;
use crate::fetch::Fetch;
use crate::models::{BatchRun, ExportFormat, ItemOutcome, ItemResult};
use crate::pipeline::{process_article, CrawlOptions};
use crate::rewrite::rel_href;
use crate::utils;

/// Process `urls` in order into `output_dir/batch_{timestamp}/`.
///
/// One failing article never aborts the run; its entry is recorded and
/// the next URL proceeds. The returned run holds one item per input URL,
/// in input order.
pub async fn run_batch<F: Fetch>(
    fetcher: &F,
    urls: &[String],
    output_dir: &Path,
    opts: &CrawlOptions,
) -> Result<(BatchRun, PathBuf), CrawlError> {
    let timestamp = utils::run_timestamp();
    let batch_dir = output_dir.join(format!("batch_{timestamp}"));
    fs::create_dir_all(&batch_dir)
        .await
        .map_err(|e| CrawlError::OutputDir {
            path: batch_dir.clone(),
            source: e,
        })?;

    info!(urls = urls.len(), dir = %batch_dir.display(), "Starting batch run");
    let mut run = BatchRun::new(timestamp.clone());

    for (i, url) in urls.iter().enumerate() {
        let article_id = format!("article_{:03}_{timestamp}", i + 1);
        let article_dir = batch_dir.join(&article_id);

        let outcome = match process_article(fetcher, url, &article_id, &article_dir, opts).await {
            Ok((article, files)) => ItemOutcome::Success { article, files },
            Err(e) => {
                error!(%url, error = %e, "Article failed");
                ItemOutcome::Failure {
                    reason: e.to_string(),
                }
            }
        };
        run.items.push(ItemResult {
            url: url.clone(),
            outcome,
        });
    }

    let summary = run.summary();
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Batch run finished"
    );

    let report_path = batch_dir.join("batch_summary.md");
    if let Err(e) = fs::write(&report_path, render_report(&run, opts, &batch_dir)).await {
        error!(path = %report_path.display(), error = %e, "Failed to write batch report");
    }

    Ok((run, batch_dir))
}

/// Render the `batch_summary.md` report from a finished run.
pub fn render_report(run: &BatchRun, opts: &CrawlOptions, batch_dir: &Path) -> String {
    let summary = run.summary();
    let formats = opts
        .formats
        .iter()
        .map(ExportFormat::label)
        .collect::<Vec<_>>()
        .join(", ");

    let mut md = String::new();
    md.push_str("# Batch crawl report\n\n");
    md.push_str(&format!("- Started: {}\n", run.started_at));
    md.push_str(&format!("- Formats: {}\n", formats));
    md.push_str(&format!("- Download media: {}\n", opts.download_media));
    md.push_str(&format!("- Download videos: {}\n\n", opts.download_videos));

    md.push_str("## Articles\n\n");
    for (i, item) in run.items.iter().enumerate() {
        match &item.outcome {
            ItemOutcome::Success { article, files } => {
                md.push_str(&format!("### {}. ✅ {}\n\n", i + 1, article.title));
                md.push_str(&format!("- Link: {}\n", item.url));
                md.push_str(&format!("- Author: {}\n", article.author));
                md.push_str(&format!("- Published: {}\n", article.published_at));
                md.push_str(&format!(
                    "- Media: {} image(s), {} video(s)\n",
                    article.media.images.len(),
                    article.media.videos.len()
                ));
                if !files.is_empty() {
                    md.push_str("- Files:\n");
                    for file in files {
                        let rel = rel_href(&file.path, batch_dir);
                        md.push_str(&format!("  - [{}]({})\n", file.format.label(), rel));
                    }
                }
                md.push('\n');
            }
            ItemOutcome::Failure { reason } => {
                md.push_str(&format!("### {}. ❌ Failed\n\n", i + 1));
                md.push_str(&format!("- Link: {}\n", item.url));
                md.push_str(&format!("- Reason: {}\n\n", reason));
            }
        }
    }

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "{} total, {} succeeded, {} failed\n",
        summary.total, summary.succeeded, summary.failed
    ));
    let failures: Vec<&ItemResult> = run.items.iter().filter(|i| !i.succeeded()).collect();
    if !failures.is_empty() {
        md.push_str("\nFailed links:\n\n");
        for item in failures {
            md.push_str(&format!("- {}\n", item.url));
        }
    }
    md
}
