//! Body finalization: placeholder replacement and attribute cleanup.
//!
//! The rewriter runs after media resolution (and optional downloads) and
//! mutates the owned body tree so every output format sees the same
//! finalized content:
//! - voice-message elements are dropped outright; they are unsupported
//! - downloaded images point at their local file, others keep the
//!   remote URL so an online viewer can still load them
//! - every classified video node is replaced by exactly one placeholder
//!   block; unclassified candidates are left untouched
//! - plain text is derived before attribute stripping
//! - every remaining element keeps only an allow-list of attributes

use std::path::Path;

use tracing::debug;

use crate::body::BodyNode;
use crate::media::{classify_video, is_video_candidate, video_fragment};
use crate::models::{MediaCatalog, ProviderKind, VideoRef};

const ALLOWED_ATTRS: &[&str] = &["src", "href", "alt", "width", "height", "style", "target"];

const PLACEHOLDER_STYLE: &str =
    "padding:10px; border:1px solid #ddd; background-color:#f9f9f9; margin:10px 0; text-align:center;";

/// Finalized body content shared by all exporters.
#[derive(Debug)]
pub struct Rewritten {
    pub content_html: String,
    pub body_text: String,
}

/// Rewrite the body in place and serialize it.
///
/// `article_dir` is the directory the export files land in; media paths
/// are rewritten relative to it, always with forward slashes.
pub fn rewrite(body: &mut BodyNode, catalog: &MediaCatalog, article_dir: &Path) -> Rewritten {
    drop_voice_messages(body);
    rewrite_images(body, catalog, article_dir);

    let mut next_video = 0usize;
    if let Some(children) = body.children_mut() {
        replace_videos(children, &catalog.videos, &mut next_video, article_dir);
    }
    debug!(replaced = next_video, "Replaced video nodes with placeholders");

    // Text reflects placeholders but not the attribute cleanup.
    let body_text = body.visible_text();
    strip_attributes(body);

    Rewritten {
        content_html: body.to_html(),
        body_text,
    }
}

/// Voice messages cannot be extracted; remove them without a trace.
fn drop_voice_messages(node: &mut BodyNode) {
    if let Some(children) = node.children_mut() {
        children.retain(|c| !c.is("mpvoice"));
        for child in children {
            drop_voice_messages(child);
        }
    }
}

fn rewrite_images(node: &mut BodyNode, catalog: &MediaCatalog, article_dir: &Path) {
    let mut index = 0usize;
    rewrite_images_walk(node, catalog, article_dir, &mut index);
}

fn rewrite_images_walk(
    node: &mut BodyNode,
    catalog: &MediaCatalog,
    article_dir: &Path,
    index: &mut usize,
) {
    if node.is("img") {
        let discoverable = node
            .attr("src")
            .is_some_and(|s| !s.is_empty() && !s.starts_with("data:"));
        if discoverable {
            if let Some(image) = catalog.images.get(*index) {
                if let Some(local) = &image.local_path {
                    node.set_attr("src", &rel_href(local, article_dir));
                }
            }
            *index += 1;
        }
    }
    if let Some(children) = node.children_mut() {
        for child in children {
            rewrite_images_walk(child, catalog, article_dir, index);
        }
    }
}

fn replace_videos(
    children: &mut Vec<BodyNode>,
    videos: &[VideoRef],
    next: &mut usize,
    article_dir: &Path,
) {
    for child in children.iter_mut() {
        if is_video_candidate(child) {
            // Atomic, same as the resolver: no descent whether or not
            // the candidate classified.
            let fragment = video_fragment(child);
            if classify_video(&fragment).is_some() {
                if let Some(video) = videos.get(*next) {
                    *child = placeholder(video, article_dir);
                }
                *next += 1;
            }
            continue;
        }
        if let Some(grandchildren) = child.children_mut() {
            replace_videos(grandchildren, videos, next, article_dir);
        }
    }
}

/// Build the single placeholder block that replaces a video node.
fn placeholder(video: &VideoRef, article_dir: &Path) -> BodyNode {
    let mut children = Vec::new();

    if let Some(local) = &video.local_path {
        let rel = rel_href(local, article_dir);
        children.push(BodyNode::element(
            "video",
            vec![
                ("controls".into(), String::new()),
                ("width".into(), "100%".into()),
                ("style".into(), "max-width:600px;".into()),
            ],
            vec![BodyNode::element(
                "source",
                vec![("src".into(), rel), ("type".into(), "video/mp4".into())],
                vec![],
            )],
        ));
        children.push(BodyNode::element(
            "p",
            vec![],
            vec![BodyNode::text("[downloaded video]")],
        ));
    } else if video.provider_kind == ProviderKind::Tencent {
        let caption = format!(
            "[tencent video: {}]",
            video.vid.as_deref().unwrap_or("unknown")
        );
        children.push(link(&video.original_url, &caption));
        if video.candidate_urls.len() > 1 {
            children.push(BodyNode::element("br", vec![], vec![]));
            children.push(BodyNode::element(
                "small",
                vec![],
                vec![BodyNode::text("If the link is broken, try:")],
            ));
            for (i, alt_url) in video.candidate_urls.iter().enumerate().skip(1) {
                children.push(BodyNode::element("br", vec![], vec![]));
                children.push(link(alt_url, &format!("alternate link {i}")));
            }
        }
    } else if video.original_url.starts_with("http://")
        || video.original_url.starts_with("https://")
    {
        children.push(link(
            &video.original_url,
            &format!("[video link: {}]", video.provider_kind),
        ));
    } else {
        children.push(BodyNode::element(
            "p",
            vec![],
            vec![BodyNode::text(&format!(
                "[video content: {}]",
                video.provider_kind
            ))],
        ));
    }

    BodyNode::element(
        "div",
        vec![("style".into(), PLACEHOLDER_STYLE.into())],
        children,
    )
}

fn link(href: &str, label: &str) -> BodyNode {
    BodyNode::element(
        "a",
        vec![
            ("href".into(), href.to_string()),
            ("target".into(), "_blank".into()),
        ],
        vec![BodyNode::text(label)],
    )
}

fn strip_attributes(node: &mut BodyNode) {
    node.retain_attrs(ALLOWED_ATTRS);
    if let Some(children) = node.children_mut() {
        for child in children {
            strip_attributes(child);
        }
    }
}

/// Path relative to the article directory, forward slashes regardless of
/// platform.
pub fn rel_href(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::resolve;
    use std::path::PathBuf;

    fn article_dir() -> PathBuf {
        PathBuf::from("/out/batch/article_001")
    }

    #[test]
    fn test_voice_messages_are_dropped_without_placeholder() {
        let mut body =
            BodyNode::from_fragment("<div><p>a</p><mpvoice name=\"x\"></mpvoice><p>b</p></div>")
                .unwrap();
        let catalog = MediaCatalog::default();
        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(!rewritten.content_html.contains("mpvoice"));
        assert_eq!(rewritten.body_text, "a\nb");
    }

    #[test]
    fn test_downloaded_image_src_is_relative_with_forward_slashes() {
        let mut body = BodyNode::from_fragment(
            r#"<div><img src="https://mmbiz.qpic.cn/a.jpg"><img src="https://mmbiz.qpic.cn/b.jpg"></div>"#,
        )
        .unwrap();
        let mut catalog = resolve(&mut body);
        catalog.images[0].local_path =
            Some(article_dir().join("media").join("prefix_img_1.jpg"));

        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(rewritten.content_html.contains(r#"src="media/prefix_img_1.jpg""#));
        // unresolved image keeps its remote URL
        assert!(rewritten.content_html.contains(r#"src="https://mmbiz.qpic.cn/b.jpg""#));
    }

    #[test]
    fn test_tencent_placeholder_links_and_alternates_skip_first() {
        let mut body = BodyNode::from_fragment(
            r#"<div><div class="video_iframe" data-src="vid=abc123&width=100"></div></div>"#,
        )
        .unwrap();
        let catalog = resolve(&mut body);
        let rewritten = rewrite(&mut body, &catalog, &article_dir());

        assert!(rewritten.content_html.contains("[tencent video: abc123]"));
        assert!(rewritten.content_html.contains("alternate link 1"));
        assert!(rewritten.content_html.contains("alternate link 2"));
        // the player URL appears as the main link, not again as an alternate
        assert!(!rewritten.content_html.contains("alternate link 0"));
        assert!(rewritten.content_html.contains("https://v.qq.com/x/page/abc123.html"));
    }

    #[test]
    fn test_downloaded_video_gets_inline_player() {
        let mut body = BodyNode::from_fragment(
            r#"<div><iframe data-src="vid=abc123"></iframe></div>"#,
        )
        .unwrap();
        let mut catalog = resolve(&mut body);
        catalog.videos[0].local_path =
            Some(article_dir().join("media").join("prefix_video_1.mp4"));

        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(rewritten.content_html.contains("<video"));
        assert!(rewritten.content_html.contains(r#"src="media/prefix_video_1.mp4""#));
        assert!(rewritten.body_text.contains("[downloaded video]"));
    }

    #[test]
    fn test_non_http_video_degrades_to_text_caption() {
        // The container has no src of its own, so classification runs
        // against its serialization and finds the inner relative source.
        let mut body = BodyNode::from_fragment(
            r#"<div><div class="video_iframe"><video src="/relative/clip.mp4"></video></div></div>"#,
        )
        .unwrap();
        let catalog = resolve(&mut body);
        assert_eq!(catalog.videos[0].provider_kind, ProviderKind::Direct);
        assert_eq!(catalog.videos[0].original_url, "/relative/clip.mp4");

        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(rewritten.content_html.contains("[video content: direct]"));
        assert!(!rewritten.content_html.contains("<a "));
    }

    #[test]
    fn test_attribute_allow_list_applied_after_rewrites() {
        let mut body = BodyNode::from_fragment(
            r#"<div id="js_content" class="rich_media_content"><p data-tool="editor" style="color:red">t</p></div>"#,
        )
        .unwrap();
        let rewritten = rewrite(&mut body, &MediaCatalog::default(), &article_dir());
        assert!(!rewritten.content_html.contains("data-tool"));
        assert!(!rewritten.content_html.contains("js_content"));
        assert!(rewritten.content_html.contains(r#"style="color:red""#));
    }

    #[test]
    fn test_unclassified_candidate_left_in_place_keeps_alignment() {
        let mut body = BodyNode::from_fragment(concat!(
            r#"<div><div class="video_iframe"></div>"#,
            r#"<iframe data-src="vid=real1"></iframe></div>"#,
        ))
        .unwrap();
        let catalog = resolve(&mut body);
        assert_eq!(catalog.videos.len(), 1);

        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        // the empty container survives, the real video got the placeholder
        assert!(rewritten.content_html.contains("[tencent video: real1]"));
        assert!(rewritten.content_html.contains(r#"<div class"#) || rewritten.content_html.contains("<div>"));
    }

    #[test]
    fn test_rel_href_strips_base_and_uses_forward_slashes() {
        let base = PathBuf::from("/out/article_001");
        let path = base.join("media").join("x_img_1.jpg");
        assert_eq!(rel_href(&path, &base), "media/x_img_1.jpg");
    }

    #[test]
    fn test_body_text_derived_before_attr_strip_includes_captions() {
        let mut body = BodyNode::from_fragment(
            r#"<div><p>before</p><div class="wxv-video" data-src="vid=v1"></div></div>"#,
        )
        .unwrap();
        let catalog = resolve(&mut body);
        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(rewritten.body_text.contains("before"));
        assert!(rewritten.body_text.contains("[tencent video: v1]"));
    }

    #[test]
    fn test_image_alignment_skips_data_uris() {
        let mut body = BodyNode::from_fragment(concat!(
            r#"<div><img src="data:image/gif;base64,x">"#,
            r#"<img src="https://real.example/a.jpg"></div>"#,
        ))
        .unwrap();
        let mut catalog = resolve(&mut body);
        assert_eq!(catalog.images.len(), 1);
        catalog.images[0].local_path = Some(article_dir().join("media/a_img_1.jpg"));

        let rewritten = rewrite(&mut body, &catalog, &article_dir());
        assert!(rewritten.content_html.contains(r#"src="media/a_img_1.jpg""#));
        assert!(rewritten.content_html.contains("data:image/gif"));
    }
}
