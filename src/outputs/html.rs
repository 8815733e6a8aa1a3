//! HTML export: a self-contained document around the rewritten body.
//!
//! Title, author, and publish time are escaped on the way into the
//! template; the body itself was already serialized with escaping by the
//! rewriter and is embedded verbatim.

use std::path::Path;

use tokio::fs;

use crate::error::{ExportCause, ExportError};
use crate::models::{Article, ExportFormat};
use crate::rewrite::rel_href;
use crate::utils::{escape_attr, escape_html};

const STYLESHEET: &str = r#"
        body { font-family: Arial, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; }
        h1 { font-size: 24px; margin-bottom: 10px; }
        .meta { color: #666; margin-bottom: 20px; }
        img { max-width: 100%; height: auto; }
        .media-info { margin-top: 20px; padding: 10px; background-color: #f5f5f5; border-radius: 5px; }
        .video-links { margin-top: 20px; padding: 10px; background-color: #e9f7fe; border-radius: 5px; }
        .video-links h3 { margin-top: 0; }
        .video-links ul { padding-left: 20px; }
        video { max-width: 100%; }
"#;

pub fn render(article: &Article, article_dir: &Path, download_media: bool) -> String {
    let videos_html = render_video_links(article, article_dir);

    let media_info = if download_media {
        format!(
            concat!(
                "    <div class=\"media-info\">\n",
                "        <h3>Media files</h3>\n",
                "        <p>Images: {}</p>\n",
                "        <p>Videos: {}</p>\n",
                "    </div>\n"
            ),
            article.media.images.len(),
            article.media.videos.len()
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{stylesheet}    </style>
</head>
<body>
    <h1>{title}</h1>
    <div class="meta">
        Author: {author}<br>
        Published: {published}<br>
        Source link: <a href="{source_attr}" target="_blank">{source}</a>
    </div>

{videos_html}
    <div class="content">
        {content}
    </div>

{media_info}</body>
</html>"#,
        title = escape_html(&article.title),
        stylesheet = STYLESHEET,
        author = escape_html(&article.author),
        published = escape_html(&article.published_at),
        source_attr = escape_attr(&article.source_url),
        source = escape_html(&article.source_url),
        videos_html = videos_html,
        content = article.content_html,
        media_info = media_info,
    )
}

fn render_video_links(article: &Article, article_dir: &Path) -> String {
    if article.media.videos.is_empty() {
        return String::new();
    }

    let mut out = String::from("    <div class=\"video-links\"><h3>Video links</h3><ul>\n");
    for (i, video) in article.media.videos.iter().enumerate() {
        out.push_str("        <li>");
        if let Some(local) = &video.local_path {
            let rel = rel_href(local, article_dir);
            out.push_str(&format!(
                concat!(
                    "<div><video controls style=\"max-width:100%; height:auto;\">",
                    "<source src=\"{}\" type=\"video/mp4\">",
                    "Your browser does not support the video tag",
                    "</video><p>Downloaded video</p></div>"
                ),
                escape_attr(&rel)
            ));
        } else {
            out.push_str(&format!(
                "<a href=\"{}\" target=\"_blank\">Video {} ({})</a>",
                escape_attr(&video.original_url),
                i + 1,
                video.provider_kind
            ));
            if video.candidate_urls.len() > 1 {
                out.push_str(
                    "<div style=\"margin-left:20px; font-size:0.9em;\"><p>Alternate links:</p>",
                );
                for (j, alt_url) in video.candidate_urls.iter().enumerate().skip(1) {
                    out.push_str(&format!(
                        "<a href=\"{}\" target=\"_blank\">Alternate {}</a><br>",
                        escape_attr(alt_url),
                        j
                    ));
                }
                out.push_str("</div>");
            }
        }
        out.push_str("</li>\n");
    }
    out.push_str("    </ul></div>\n");
    out
}

pub async fn write(article: &Article, path: &Path, download_media: bool) -> Result<(), ExportError> {
    let article_dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::write(path, render(article, article_dir, download_media))
        .await
        .map_err(|e| ExportError {
            format: ExportFormat::Html,
            path: path.to_path_buf(),
            source: ExportCause::Io(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaCatalog, ProviderKind, VideoRef};
    use std::path::PathBuf;

    fn article() -> Article {
        Article {
            source_url: "https://mp.weixin.qq.com/s/abc?x=1&y=2".into(),
            canonical_url: "https://mp.weixin.qq.com/s?__biz=X&mid=Y&idx=1&sn=W".into(),
            title: "A <b>bold</b> title".into(),
            author: "作者 & co".into(),
            published_at: "2024-06-30".into(),
            content_preview: "p".into(),
            body_text: "p".into(),
            content_html: "<div><p>正文</p></div>".into(),
            media: MediaCatalog::default(),
        }
    }

    #[test]
    fn test_render_escapes_title_and_author() {
        let html = render(&article(), &PathBuf::from("/out"), false);
        assert!(html.contains("A &lt;b&gt;bold&lt;/b&gt; title"));
        assert!(html.contains("作者 &amp; co"));
        assert!(!html.contains("<b>bold</b>"));
        // body html is embedded verbatim
        assert!(html.contains("<div><p>正文</p></div>"));
    }

    #[test]
    fn test_render_video_links_with_alternates() {
        let mut article = article();
        article.media.videos.push(VideoRef {
            provider_kind: ProviderKind::Tencent,
            original_url: "https://v.qq.com/txp/iframe/player.html?vid=v1".into(),
            vid: Some("v1".into()),
            candidate_urls: vec![
                "https://v.qq.com/txp/iframe/player.html?vid=v1".into(),
                "https://v.qq.com/x/page/v1.html".into(),
                "https://v.qq.com/x/cover/mzc002007knwk8q/v1.html".into(),
            ],
            local_path: None,
            raw_fragment: String::new(),
        });
        let html = render(&article, &PathBuf::from("/out"), false);
        assert!(html.contains("Video 1 (tencent)"));
        assert!(html.contains("Alternate 1"));
        assert!(html.contains("Alternate 2"));
        assert!(!html.contains("Alternate 0"));
    }

    #[test]
    fn test_render_downloaded_video_gets_inline_player() {
        let mut article = article();
        article.media.videos.push(VideoRef {
            provider_kind: ProviderKind::Direct,
            original_url: "https://cdn/v.mp4".into(),
            vid: None,
            candidate_urls: vec![],
            local_path: Some(PathBuf::from("/out/media/t_video_1.mp4")),
            raw_fragment: String::new(),
        });
        let html = render(&article, &PathBuf::from("/out"), true);
        assert!(html.contains("src=\"media/t_video_1.mp4\""));
        assert!(html.contains("Downloaded video"));
        assert!(html.contains("Media files"));
    }

    #[test]
    fn test_media_info_block_only_when_downloading() {
        assert!(!render(&article(), &PathBuf::from("/out"), false).contains("Media files"));
        assert!(render(&article(), &PathBuf::from("/out"), true).contains("Media files"));
    }
}
