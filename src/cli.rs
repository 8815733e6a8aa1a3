//! Command-line interface definitions for the article crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Options left unset fall back to the values in `config.json`.

use clap::Parser;

/// Command-line arguments for the article crawler.
///
/// A crawl takes one or more article links, either directly via `--url`
/// or from a file via `--file` (one link per line). Network and output
/// behavior can be tuned per run; anything not given here comes from the
/// configuration file.
///
/// # Examples
///
/// ```sh
/// # Crawl a single article into JSON + text
/// wechat_article_crawler -u "https://mp.weixin.qq.com/s/..." --text
///
/// # Batch crawl a list of links with media downloads
/// wechat_article_crawler -f links.txt -b -m
///
/// # Through a local proxy with more retries
/// wechat_article_crawler -u "https://mp.weixin.qq.com/s/..." -p http://127.0.0.1:7890 -r 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Article link to crawl
    #[arg(short, long)]
    pub url: Option<String>,

    /// File containing article links, one per line
    #[arg(short, long)]
    pub file: Option<String>,

    /// Batch mode: process every link into one timestamped run directory
    #[arg(short, long)]
    pub batch: bool,

    /// Output filename for single-article mode (its stem names the files)
    #[arg(short, long, default_value = "article_content.json")]
    pub output: String,

    /// Root output directory
    #[arg(short = 'd', long)]
    pub output_dir: Option<String>,

    /// Export a plain-text version
    #[arg(long)]
    pub text: bool,

    /// Export a standalone HTML version
    #[arg(long)]
    pub html: bool,

    /// Export a Markdown version
    #[arg(long)]
    pub markdown: bool,

    /// Download images referenced by the article
    #[arg(short, long)]
    pub media: bool,

    /// Also attempt video downloads (implies --media)
    #[arg(long)]
    pub video: bool,

    /// Folder name for downloaded media, inside each article folder
    #[arg(long)]
    pub media_folder: Option<String>,

    /// Proxy URL, e.g. http://127.0.0.1:7890
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Retry attempts for failed requests
    #[arg(short, long)]
    pub retry: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Path to the config file
    #[arg(short, long)]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(&[
            "wechat_article_crawler",
            "--url",
            "https://mp.weixin.qq.com/s/abc",
            "--text",
            "--markdown",
        ]);

        assert_eq!(cli.url.as_deref(), Some("https://mp.weixin.qq.com/s/abc"));
        assert!(cli.text);
        assert!(cli.markdown);
        assert!(!cli.html);
        assert!(!cli.batch);
        assert_eq!(cli.output, "article_content.json");
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(&[
            "wechat_article_crawler",
            "-f",
            "links.txt",
            "-b",
            "-m",
            "-r",
            "5",
            "-p",
            "http://127.0.0.1:7890",
        ]);

        assert_eq!(cli.file.as_deref(), Some("links.txt"));
        assert!(cli.batch);
        assert!(cli.media);
        assert_eq!(cli.retry, Some(5));
        assert_eq!(cli.proxy.as_deref(), Some("http://127.0.0.1:7890"));
    }
}
