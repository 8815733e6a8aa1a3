//! Owned, mutable representation of an article body.
//!
//! The body container found by the extractor is converted from `scraper`'s
//! parsed document into this tree so the resolver and rewriter can mutate
//! it freely. The tree is local to one article and never shared.

use scraper::{ElementRef, Html, Node};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// One node of an article body: an element with ordered attributes and
/// children, or a text run.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<BodyNode>,
    },
    Text(String),
}

impl BodyNode {
    pub fn element(tag: &str, attrs: Vec<(String, String)>, children: Vec<BodyNode>) -> Self {
        BodyNode::Element {
            tag: tag.to_string(),
            attrs,
            children,
        }
    }

    pub fn text(s: &str) -> Self {
        BodyNode::Text(s.to_string())
    }

    /// Convert a parsed element (and its subtree) into an owned tree.
    /// Comments and other non-content nodes are dropped.
    pub fn from_element(el: ElementRef<'_>) -> Self {
        let tag = el.value().name().to_string();
        let attrs = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut children = Vec::new();
        for child in el.children() {
            match child.value() {
                Node::Text(t) => children.push(BodyNode::Text((**t).to_string())),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        children.push(BodyNode::from_element(child_el));
                    }
                }
                _ => {}
            }
        }
        BodyNode::Element {
            tag,
            attrs,
            children,
        }
    }

    /// Parse an HTML fragment and return its first element as an owned tree.
    pub fn from_fragment(html: &str) -> Option<Self> {
        let doc = Html::parse_fragment(html);
        let root = doc.root_element();
        for child in root.children() {
            if let Some(el) = ElementRef::wrap(child) {
                return Some(BodyNode::from_element(el));
            }
        }
        None
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            BodyNode::Element { tag, .. } => Some(tag),
            BodyNode::Text(_) => None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.tag() == Some(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            BodyNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            BodyNode::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let BodyNode::Element { attrs, .. } = self {
            if let Some(entry) = attrs.iter_mut().find(|(k, _)| k == name) {
                entry.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Drop every attribute whose name is not in `keep`.
    pub fn retain_attrs(&mut self, keep: &[&str]) {
        if let BodyNode::Element { attrs, .. } = self {
            attrs.retain(|(k, _)| keep.contains(&k.as_str()));
        }
    }

    /// True for elements whose `class` attribute contains `marker` as a
    /// substring.
    pub fn class_contains(&self, marker: &str) -> bool {
        self.attr("class").is_some_and(|c| c.contains(marker))
    }

    pub fn children(&self) -> &[BodyNode] {
        match self {
            BodyNode::Element { children, .. } => children,
            BodyNode::Text(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<BodyNode>> {
        match self {
            BodyNode::Element { children, .. } => Some(children),
            BodyNode::Text(_) => None,
        }
    }

    /// Serialize the tree back to HTML. Text and attribute values are
    /// escaped; void elements get no closing tag.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            BodyNode::Text(t) => out.push_str(&crate::utils::escape_html(t)),
            BodyNode::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&crate::utils::escape_attr(v));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Visible text of the subtree: each text run trimmed, empty runs
    /// dropped, the rest joined with newlines.
    pub fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join("\n")
    }

    fn collect_text(&self, parts: &mut Vec<String>) {
        match self {
            BodyNode::Text(t) => {
                let trimmed = t.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            BodyNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(parts);
                }
            }
        }
    }

    /// Concatenated text of the subtree without separators, trimmed.
    /// Used for inline content such as link labels and headings.
    pub fn inline_text(&self) -> String {
        let mut out = String::new();
        self.collect_inline(&mut out);
        out.trim().to_string()
    }

    fn collect_inline(&self, out: &mut String) {
        match self {
            BodyNode::Text(t) => out.push_str(t),
            BodyNode::Element { children, .. } => {
                for child in children {
                    child.collect_inline(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fragment_builds_tree() {
        let node = BodyNode::from_fragment(r#"<div id="js_content"><p>hello <b>world</b></p></div>"#)
            .unwrap();
        assert!(node.is("div"));
        assert_eq!(node.attr("id"), Some("js_content"));
        assert_eq!(node.children().len(), 1);
        assert_eq!(node.inline_text(), "hello world");
    }

    #[test]
    fn test_serialization_escapes_text_and_attrs() {
        let node = BodyNode::element(
            "p",
            vec![("alt".into(), "a\"b".into())],
            vec![BodyNode::text("1 < 2 & 3")],
        );
        assert_eq!(node.to_html(), "<p alt=\"a&quot;b\">1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let node = BodyNode::element("img", vec![("src".into(), "x.jpg".into())], vec![]);
        assert_eq!(node.to_html(), "<img src=\"x.jpg\">");
    }

    #[test]
    fn test_visible_text_joins_trimmed_runs() {
        let node =
            BodyNode::from_fragment("<div><p>  first  </p><p></p><p>second</p></div>").unwrap();
        assert_eq!(node.visible_text(), "first\nsecond");
    }

    #[test]
    fn test_retain_attrs_keeps_allow_list_only() {
        let mut node = BodyNode::from_fragment(
            r#"<img src="a.jpg" data-ratio="1.5" data-w="640" alt="pic">"#,
        )
        .unwrap();
        node.retain_attrs(&["src", "alt"]);
        assert_eq!(node.attr("src"), Some("a.jpg"));
        assert_eq!(node.attr("alt"), Some("pic"));
        assert_eq!(node.attr("data-ratio"), None);
    }

    #[test]
    fn test_class_contains_matches_substring() {
        let node = BodyNode::from_fragment(r#"<div class="rich_pages video_iframe"></div>"#).unwrap();
        assert!(node.class_contains("video_iframe"));
        assert!(!node.class_contains("wxv-video"));
    }
}
