//! File-backed configuration with defaults and a bounded recent-URL history.
//!
//! The configuration is loaded once at startup and passed into the
//! components that need it; pipeline code never reaches for ambient
//! globals. Missing keys fall back to defaults via serde, and an
//! unreadable or unparseable file degrades to the full default set with
//! a warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: String,
    pub media_folder: String,
    /// Formats exported when no explicit format flags are given.
    /// JSON is always exported and is not listed here.
    pub default_formats: Vec<String>,
    pub download_media: bool,
    pub download_videos: bool,
    /// Proxy URL; empty string means direct connection.
    pub proxy: String,
    pub retry_times: usize,
    /// Base delay in seconds for exponential backoff between retries.
    pub retry_delay: u64,
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Most-recent-first, de-duplicated, capped at `max_url_history`.
    pub last_used_urls: Vec<String>,
    pub max_url_history: usize,
    /// External video downloader command (e.g. `yt-dlp`); empty string
    /// means the capability is unavailable, which is not an error.
    pub external_downloader: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: "outputs".into(),
            media_folder: "media".into(),
            default_formats: vec!["text".into(), "html".into(), "markdown".into()],
            download_media: true,
            download_videos: false,
            proxy: String::new(),
            retry_times: 3,
            retry_delay: 2,
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout: 10,
            last_used_urls: Vec::new(),
            max_url_history: 10,
            external_downloader: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file is absent or invalid.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Config>(&raw) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config file; using defaults");
                    Config::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "No config file; using defaults");
                Config::default()
            }
        }
    }

    /// Persist the configuration (including URL history) back to `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Record `url` as the most recently used one. Existing occurrences
    /// are removed first, then the list is capped at `max_url_history`.
    pub fn add_url_to_history(&mut self, url: &str) {
        if url.is_empty() {
            return;
        }
        self.last_used_urls.retain(|u| u != url);
        self.last_used_urls.insert(0, url.to_string());
        self.last_used_urls.truncate(self.max_url_history);
    }

    pub fn proxy_url(&self) -> Option<&str> {
        if self.proxy.is_empty() {
            None
        } else {
            Some(&self.proxy)
        }
    }

    pub fn external_downloader(&self) -> Option<&str> {
        if self.external_downloader.is_empty() {
            None
        } else {
            Some(&self.external_downloader)
        }
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, "outputs");
        assert_eq!(config.retry_times, 3);
        assert_eq!(config.max_url_history, 10);
        assert!(config.download_media);
        assert!(!config.download_videos);
        assert!(config.proxy_url().is_none());
        assert!(config.external_downloader().is_none());
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"retry_times": 7, "proxy": "http://127.0.0.1:7890"}"#).unwrap();
        assert_eq!(config.retry_times, 7);
        assert_eq!(config.proxy_url(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.timeout, 10);
        assert_eq!(config.output_dir, "outputs");
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let config = Config::load(&path);
        assert_eq!(config.output_dir, "outputs");
    }

    #[test]
    fn test_history_is_mru_deduplicated_and_capped() {
        let mut config = Config {
            max_url_history: 3,
            ..Config::default()
        };
        config.add_url_to_history("https://a");
        config.add_url_to_history("https://b");
        config.add_url_to_history("https://a");
        assert_eq!(config.last_used_urls, vec!["https://a", "https://b"]);

        config.add_url_to_history("https://c");
        config.add_url_to_history("https://d");
        assert_eq!(config.last_used_urls, vec!["https://d", "https://c", "https://a"]);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.add_url_to_history("https://mp.weixin.qq.com/s/abc");
        config.save(&path).unwrap();

        let reloaded = Config::load(&path);
        assert_eq!(reloaded.last_used_urls, vec!["https://mp.weixin.qq.com/s/abc"]);
    }
}
