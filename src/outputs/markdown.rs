//! Markdown export: structural conversion of the rewritten body tree.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;

use crate::body::BodyNode;
use crate::error::{ExportCause, ExportError};
use crate::models::{Article, ExportFormat};

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

pub fn render(article: &Article) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", article.title));
    md.push_str(&format!("> **Author:** {}  \n", article.author));
    md.push_str(&format!("> **Published:** {}  \n", article.published_at));
    md.push_str(&format!("> **Link:** {}\n\n", article.canonical_url));

    if !article.media.videos.is_empty() {
        md.push_str("## Video links\n\n");
        for (i, video) in article.media.videos.iter().enumerate() {
            md.push_str(&format!("### Video {}\n\n", i + 1));
            if let Some(local) = &video.local_path {
                md.push_str(&format!("- Downloaded: [{0}]({0})\n", local.display()));
            }
            md.push_str(&format!(
                "- Original ({}): {}\n",
                video.provider_kind, video.original_url
            ));
            for (j, alt_url) in video.candidate_urls.iter().enumerate().skip(1) {
                md.push_str(&format!("  - Alternate {}: {}\n", j, alt_url));
            }
            md.push('\n');
        }
    }

    md.push_str("---\n\n## Content\n\n");
    if article.content_html.is_empty() {
        md.push_str(&article.body_text);
        md.push('\n');
    } else if let Some(body) = BodyNode::from_fragment(&article.content_html) {
        let mut image_index = 0usize;
        md.push_str(&node_to_markdown(&body, &mut image_index));
        md.push('\n');
    } else {
        md.push_str(&article.body_text);
        md.push('\n');
    }

    if !article.media.images.is_empty() {
        md.push_str(&format!(
            "\n## Images\n\n{} image(s) in this article.\n",
            article.media.images.len()
        ));
    }

    collapse_blank_lines(&md)
}

fn collapse_blank_lines(md: &str) -> String {
    BLANK_RUNS.replace_all(md, "\n\n").into_owned()
}

fn children_markdown(node: &BodyNode, image_index: &mut usize) -> String {
    node.children()
        .iter()
        .map(|c| node_to_markdown(c, image_index))
        .collect()
}

fn node_to_markdown(node: &BodyNode, image_index: &mut usize) -> String {
    // Text runs keep their spacing; block handlers trim their own edges.
    if let BodyNode::Text(t) = node {
        return t.clone();
    }
    let tag = node.tag().unwrap_or_default();
    match tag {
        "img" => {
            *image_index += 1;
            let alt = node.attr("alt").unwrap_or("");
            let label = if alt.is_empty() {
                format!("image {}", *image_index)
            } else {
                alt.to_string()
            };
            match node.attr("src").filter(|s| !s.is_empty()) {
                Some(src) => format!("![{}]({})\n\n", label, src),
                None => format!("![{}] (link unavailable)\n\n", label),
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            format!("{} {}\n\n", "#".repeat(level), node.inline_text())
        }
        "p" => {
            let body = children_markdown(node, image_index);
            let body = body.trim();
            if body.is_empty() {
                String::new()
            } else {
                format!("{}\n\n", body)
            }
        }
        "ul" => {
            let mut out = String::new();
            for item in node.children().iter().filter(|c| c.is("li")) {
                out.push_str(&format!(
                    "- {}\n",
                    children_markdown(item, image_index).trim()
                ));
            }
            out.push('\n');
            out
        }
        "ol" => {
            let mut out = String::new();
            for (n, item) in node.children().iter().filter(|c| c.is("li")).enumerate() {
                out.push_str(&format!(
                    "{}. {}\n",
                    n + 1,
                    children_markdown(item, image_index).trim()
                ));
            }
            out.push('\n');
            out
        }
        "a" => {
            let text = node.inline_text();
            let text = if text.is_empty() { "link" } else { text.trim() };
            match node.attr("href") {
                Some(href) if !href.is_empty() => format!("[{}]({})", text, href),
                _ => text.to_string(),
            }
        }
        "strong" | "b" => format!("**{}**", node.inline_text().trim()),
        "em" | "i" => format!("*{}*", node.inline_text().trim()),
        "blockquote" => {
            let inner = children_markdown(node, image_index);
            let quoted: String = inner
                .trim()
                .lines()
                .map(|l| format!("> {}\n", l))
                .collect();
            format!("{}\n", quoted)
        }
        "hr" => "---\n\n".to_string(),
        "br" => "\n".to_string(),
        "video" | "iframe" => String::new(),
        _ => children_markdown(node, image_index),
    }
}

pub async fn write(article: &Article, path: &Path) -> Result<(), ExportError> {
    fs::write(path, render(article))
        .await
        .map_err(|e| ExportError {
            format: ExportFormat::Markdown,
            path: path.to_path_buf(),
            source: ExportCause::Io(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRef, MediaCatalog, ProviderKind, VideoRef};
    use std::path::PathBuf;

    fn article(content_html: &str) -> Article {
        Article {
            source_url: "https://mp.weixin.qq.com/s/abc".into(),
            canonical_url: "https://mp.weixin.qq.com/s/abc".into(),
            title: "标题".into(),
            author: "Author".into(),
            published_at: "2024-06-30".into(),
            content_preview: "preview".into(),
            body_text: "fallback text".into(),
            content_html: content_html.into(),
            media: MediaCatalog::default(),
        }
    }

    #[test]
    fn test_render_structural_conversion() {
        let md = render(&article(
            "<div><h2>Section</h2><p>Hello <strong>world</strong></p>\
             <ul><li>one</li><li>two</li></ul>\
             <ol><li>first</li><li>second</li></ol>\
             <p><a href=\"https://example.com\">site</a></p><hr></div>",
        ));
        assert!(md.starts_with("# 标题\n"));
        assert!(md.contains("> **Author:** Author  \n"));
        assert!(md.contains("## Section\n"));
        assert!(md.contains("Hello **world**"));
        assert!(md.contains("- one\n- two\n"));
        assert!(md.contains("1. first\n2. second\n"));
        assert!(md.contains("[site](https://example.com)"));
        assert!(md.contains("---\n"));
    }

    #[test]
    fn test_render_images_numbered_with_fallback_label() {
        let md = render(&article(
            "<div><img src=\"media/a.jpg\"><img src=\"media/b.jpg\" alt=\"cover\"><img alt=\"\"></div>",
        ));
        assert!(md.contains("![image 1](media/a.jpg)"));
        assert!(md.contains("![cover](media/b.jpg)"));
        assert!(md.contains("![image 3] (link unavailable)"));
    }

    #[test]
    fn test_render_falls_back_to_body_text() {
        let md = render(&article(""));
        assert!(md.contains("## Content\n\nfallback text"));
    }

    #[test]
    fn test_render_video_section_skips_first_candidate() {
        let mut article = article("<div><p>x</p></div>");
        article.media.videos.push(VideoRef {
            provider_kind: ProviderKind::Tencent,
            original_url: "https://v.qq.com/txp/iframe/player.html?vid=v1".into(),
            vid: Some("v1".into()),
            candidate_urls: vec![
                "https://v.qq.com/txp/iframe/player.html?vid=v1".into(),
                "https://v.qq.com/x/page/v1.html".into(),
            ],
            local_path: Some(PathBuf::from("media/t_video_1.mp4")),
            raw_fragment: String::new(),
        });
        let md = render(&article);
        assert!(md.contains("### Video 1"));
        assert!(md.contains("Downloaded: [media/t_video_1.mp4](media/t_video_1.mp4)"));
        assert!(md.contains("Alternate 1: https://v.qq.com/x/page/v1.html"));
        assert!(!md.contains("Alternate 0"));
    }

    #[test]
    fn test_images_section_counts_catalog() {
        let mut article = article("<div><p>x</p></div>");
        article.media.images.push(ImageRef {
            original_url: "https://cdn/a.jpg".into(),
            local_path: None,
        });
        let md = render(&article);
        assert!(md.contains("## Images\n\n1 image(s) in this article.\n"));
    }

    #[test]
    fn test_collapse_blank_lines_idempotent() {
        let once = collapse_blank_lines("a\n\n\n\n\nb");
        assert_eq!(once, "a\n\nb");
        assert_eq!(collapse_blank_lines(&once), once);
    }

    #[test]
    fn test_blockquote_and_nested_formatting() {
        let md = render(&article(
            "<div><blockquote><p>quoted line</p></blockquote><p><em>soft</em></p></div>",
        ));
        assert!(md.contains("> quoted line"));
        assert!(md.contains("*soft*"));
    }
}
