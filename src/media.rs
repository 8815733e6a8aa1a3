//! Media discovery, video classification, and best-effort downloads.
//!
//! The resolver walks an article body once, in document order, and builds
//! a [`MediaCatalog`]. It normalizes lazy-load image attributes as it
//! reads them but performs no replacement; placeholder rewriting belongs
//! to the rewriter. Resolution is best-effort throughout: a candidate
//! node that cannot be classified is dropped silently, and a failed
//! download leaves `local_path` empty.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::body::BodyNode;
use crate::fetch::Fetch;
use crate::models::{ImageRef, MediaCatalog, ProviderKind, VideoRef};

/// Album id baked into the cover-qualified fallback link.
const COVER_ALBUM_ID: &str = "mzc002007knwk8q";

/// Class markers identifying `<div>` video containers.
const VIDEO_DIV_MARKERS: &[&str] = &[
    "video_iframe",
    "wxv-video",
    "js_editor_wxvideo",
    "js_video_page_wrap",
];

/// Speculative CDN templates for tencent videos, ordered most to least
/// likely. These mostly do not resolve; each is probed before download.
const TENCENT_CDN_TEMPLATES: &[&str] = &[
    "https://ugcws.video.gtimg.com/uwMROfz2r5zAoaQXGdGnC2dfJ7wFjpl1CyOdV6vIfCTkm6VC/{vid}.mp4",
    "https://defaultts.tc.qq.com/{vid}.mp4",
    "https://apd-vlive.apdcdn.tc.qq.com/vmipfsgateway.tc.qq.com/{vid}.mp4",
];

static VID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"vid=([^&\s"']+)"#).unwrap());
static BARE_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"'>]+"#).unwrap());
static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src=['"]([^'"]+)['"]"#).unwrap());

fn player_url(vid: &str) -> String {
    format!("https://v.qq.com/txp/iframe/player.html?vid={vid}")
}

fn candidate_urls(vid: &str) -> Vec<String> {
    vec![
        player_url(vid),
        format!("https://v.qq.com/x/page/{vid}.html"),
        format!("https://v.qq.com/x/cover/{COVER_ALBUM_ID}/{vid}.html"),
    ]
}

/// True when a node is one of the structural shapes that can carry a
/// video: `<iframe>`, `<video>`, or a `<div>` with a known class marker.
pub fn is_video_candidate(node: &BodyNode) -> bool {
    match node.tag() {
        Some("iframe") | Some("video") => true,
        Some("div") => VIDEO_DIV_MARKERS.iter().any(|m| node.class_contains(m)),
        _ => false,
    }
}

/// The raw text fragment classification runs against: lazy-load source,
/// then plain source, then the node's full serialization. First
/// non-empty wins.
pub fn video_fragment(node: &BodyNode) -> String {
    if let Some(data_src) = node.attr("data-src") {
        if !data_src.is_empty() {
            return data_src.to_string();
        }
    }
    if let Some(src) = node.attr("src") {
        if !src.is_empty() {
            return src.to_string();
        }
    }
    node.to_html()
}

/// Classify a raw fragment into a [`VideoRef`].
///
/// Rules run in strict precedence order and the first one producing an
/// original URL wins; later rules never override it:
/// 1. a `vid=` parameter → tencent, URL rebuilt on the iframe player
/// 2. a bare absolute URL that looks like video → embedded_url
/// 3. a `src="..."` attribute → direct, tencent (when a `vid` hides in
///    the source), or tencent_embed
///
/// Returns `None` when no rule matches; the caller drops the candidate.
pub fn classify_video(fragment: &str) -> Option<VideoRef> {
    let mut kind: Option<ProviderKind> = None;
    let mut original_url: Option<String> = None;
    let mut vid: Option<String> = None;

    if let Some(caps) = VID_RE.captures(fragment) {
        let v = caps[1].to_string();
        original_url = Some(player_url(&v));
        vid = Some(v);
        kind = Some(ProviderKind::Tencent);
    }

    if original_url.is_none() {
        if let Some(m) = BARE_URL_RE.find(fragment) {
            let found = m.as_str();
            if found.contains("v.qq.com") || found.contains("video") || found.contains(".mp4") {
                original_url = Some(found.to_string());
                kind = Some(ProviderKind::EmbeddedUrl);
            }
        }
    }

    if original_url.is_none() {
        if let Some(caps) = SRC_ATTR_RE.captures(fragment) {
            let src = caps[1].to_string();
            if src.ends_with(".mp4") || src.contains("video") {
                original_url = Some(src);
                kind = Some(ProviderKind::Direct);
            } else if src.contains("v.qq.com") {
                if let Some(vid_caps) = VID_RE.captures(&src) {
                    let v = vid_caps[1].to_string();
                    original_url = Some(player_url(&v));
                    vid = Some(v);
                    kind = Some(ProviderKind::Tencent);
                } else {
                    original_url = Some(src);
                    kind = Some(ProviderKind::TencentEmbed);
                }
            }
        }
    }

    let original_url = original_url?;
    let kind = kind?;
    let candidates = match (&kind, &vid) {
        (ProviderKind::Tencent, Some(v)) => candidate_urls(v),
        _ => Vec::new(),
    };

    Some(VideoRef {
        provider_kind: kind,
        original_url,
        vid,
        candidate_urls: candidates,
        local_path: None,
        raw_fragment: fragment.to_string(),
    })
}

/// Walk the body and build the media catalog.
///
/// Images: document order, `data-src` promoted over `src` (the
/// promotion writes `src` back), `data:` URIs skipped. Videos:
/// pre-order scan; a matched container is treated as atomic, so a node
/// is visited once even when it fits several shapes and nested
/// candidates are subsumed by the outermost one.
pub fn resolve(body: &mut BodyNode) -> MediaCatalog {
    let mut catalog = MediaCatalog::default();
    collect_images(body, &mut catalog.images);
    // Scan descendants only; the body container itself is never a
    // candidate, and the rewriter walks the same way.
    for child in body.children() {
        collect_videos(child, &mut catalog.videos);
    }
    info!(
        images = catalog.images.len(),
        videos = catalog.videos.len(),
        "Resolved article media"
    );
    catalog
}

fn collect_images(node: &mut BodyNode, images: &mut Vec<ImageRef>) {
    if node.is("img") {
        if let Some(data_src) = node.attr("data-src").map(str::to_string) {
            if !data_src.is_empty() {
                node.set_attr("src", &data_src);
            }
        }
        if let Some(url) = node.attr("src").map(str::to_string) {
            if !url.is_empty() && !url.starts_with("data:") {
                images.push(ImageRef {
                    original_url: url,
                    local_path: None,
                });
            }
        }
    }
    if let Some(children) = node.children_mut() {
        for child in children {
            collect_images(child, images);
        }
    }
}

fn collect_videos(node: &BodyNode, videos: &mut Vec<VideoRef>) {
    if is_video_candidate(node) {
        let fragment = video_fragment(node);
        match classify_video(&fragment) {
            Some(video) => {
                debug!(kind = %video.provider_kind, url = %video.original_url, "Classified video");
                videos.push(video);
            }
            None => debug!("Video candidate produced no classification; dropped"),
        }
        return;
    }
    for child in node.children() {
        collect_videos(child, videos);
    }
}

/// Extension for a downloaded image, taken from the URL path. Falls back
/// to `.jpg` when absent or implausibly long.
fn image_extension(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(pos) => {
            let ext = &segment[pos..];
            if ext.len() < 2 || ext.len() > 5 {
                ".jpg".to_string()
            } else {
                ext.to_string()
            }
        }
        None => ".jpg".to_string(),
    }
}

/// Download every cataloged image into `media_dir`, populating
/// `local_path` on success. Failures are logged and skipped.
pub async fn download_images<F: Fetch>(
    fetcher: &F,
    catalog: &mut MediaCatalog,
    media_dir: &Path,
    prefix: &str,
) {
    for (i, image) in catalog.images.iter_mut().enumerate() {
        let ext = image_extension(&image.original_url);
        let dest = media_dir.join(format!("{prefix}_img_{}{ext}", i + 1));
        match fetcher.download(&image.original_url, &dest).await {
            Ok(()) => image.local_path = Some(dest),
            Err(e) => warn!(url = %image.original_url, error = %e, "Image download failed"),
        }
    }
}

/// Try to download every cataloged video into `media_dir`.
///
/// Probes run in order and short-circuit on the first success; the
/// external downloader is an optional capability and its absence simply
/// skips that stage.
pub async fn download_videos<F: Fetch>(
    fetcher: &F,
    catalog: &mut MediaCatalog,
    media_dir: &Path,
    prefix: &str,
    external_downloader: Option<&str>,
) {
    for (i, video) in catalog.videos.iter_mut().enumerate() {
        let dest = media_dir.join(format!("{prefix}_video_{}.mp4", i + 1));
        if try_download_video(fetcher, video, &dest, external_downloader).await {
            video.local_path = Some(dest);
        } else {
            debug!(url = %video.original_url, "Video not downloadable");
        }
    }
}

async fn try_download_video<F: Fetch>(
    fetcher: &F,
    video: &VideoRef,
    dest: &Path,
    external_downloader: Option<&str>,
) -> bool {
    match video.provider_kind {
        ProviderKind::Direct if video.original_url.ends_with(".mp4") => {
            direct_download(fetcher, &video.original_url, dest).await
        }
        ProviderKind::EmbeddedUrl => direct_download(fetcher, &video.original_url, dest).await,
        ProviderKind::Tencent => {
            let Some(vid) = video.vid.as_deref() else {
                return false;
            };
            for template in TENCENT_CDN_TEMPLATES {
                let url = template.replace("{vid}", vid);
                if fetcher.probe(&url).await && direct_download(fetcher, &url, dest).await {
                    return true;
                }
            }
            if let Some(tool) = external_downloader {
                for url in &video.candidate_urls {
                    if external_download(tool, url, dest).await {
                        return true;
                    }
                }
            } else {
                debug!("No external downloader configured; skipping tencent video");
            }
            false
        }
        _ => false,
    }
}

async fn direct_download<F: Fetch>(fetcher: &F, url: &str, dest: &Path) -> bool {
    match fetcher.download(url, dest).await {
        Ok(()) => true,
        Err(e) => {
            warn!(%url, error = %e, "Video download failed");
            false
        }
    }
}

/// Run the configured external downloader (e.g. `yt-dlp`) against one
/// candidate URL. Success means the tool exited cleanly and left a
/// non-empty file behind.
async fn external_download(tool: &str, url: &str, dest: &Path) -> bool {
    info!(%tool, %url, "Trying external video downloader");
    let status = tokio::process::Command::new(tool)
        .arg("-f")
        .arg("mp4")
        .arg("-o")
        .arg(dest)
        .arg("--quiet")
        .arg("--no-warnings")
        .arg(url)
        .status()
        .await;

    match status {
        Ok(status) if status.success() => match tokio::fs::metadata(dest).await {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        },
        Ok(status) => {
            warn!(%tool, %url, code = ?status.code(), "External downloader failed");
            false
        }
        Err(e) => {
            warn!(%tool, error = %e, "External downloader could not be started");
            false
        }
    }
}
