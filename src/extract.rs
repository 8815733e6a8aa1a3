//! Article extraction from WeChat page markup.
//!
//! Each field is resolved through an ordered list of selector strategies;
//! the first one yielding a non-empty match wins. Missing fields degrade
//! to explicit sentinels rather than errors. A page whose title cannot be
//! found AND which carries a restriction marker is reported as
//! [`ExtractError::AccessRestricted`] instead of a degraded article —
//! that distinguishes "blocked/removed" from "parsed but incomplete".

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::body::BodyNode;
use crate::error::ExtractError;
use crate::models::{AUTHOR_NOT_FOUND, PUBLISH_TIME_NOT_FOUND, TITLE_NOT_FOUND};

fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| vec![sel("#activity-name")]);

static RESTRICTION_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| vec![sel(".weui-msg__title"), sel(".tips")]);

static AUTHOR_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        sel("#js_name"),
        sel(".wx_article_info .wx_article_info_one span:first-child"),
    ]
});

static PUBLISH_TIME_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        sel("#publish_time"),
        sel("#js_publish_time"),
        sel(".wx_article_info_one span.time"),
    ]
});

static BODY_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        sel("#js_content"),
        sel(".rich_media_content"),
        sel(".wx_article_content"),
    ]
});

/// The raw extraction result: metadata plus the body container, still
/// unresolved and unrewritten.
#[derive(Debug)]
pub struct Extraction {
    pub title: String,
    pub author: String,
    pub published_at: String,
    pub canonical_url: String,
    pub body: Option<BodyNode>,
}

/// Extract a normalized article record from page markup.
///
/// `fetched_url` is the final URL after redirects; it is the one carrying
/// the permanent-link query parameters.
pub fn extract(
    html: &str,
    source_url: &str,
    fetched_url: &str,
) -> Result<Extraction, ExtractError> {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE_SELECTORS);
    if title.is_none() {
        if let Some(marker) = first_text(&document, &RESTRICTION_SELECTORS) {
            warn!(%source_url, marker = %marker, "Article access restricted");
            return Err(ExtractError::AccessRestricted(marker));
        }
    }
    let title = title.unwrap_or_else(|| TITLE_NOT_FOUND.to_string());

    let author = first_text(&document, &AUTHOR_SELECTORS)
        .unwrap_or_else(|| AUTHOR_NOT_FOUND.to_string());
    let published_at = first_text(&document, &PUBLISH_TIME_SELECTORS)
        .unwrap_or_else(|| PUBLISH_TIME_NOT_FOUND.to_string());

    let body = BODY_SELECTORS
        .iter()
        .find_map(|s| document.select(s).next())
        .map(BodyNode::from_element);
    if body.is_none() {
        warn!(%source_url, "No body container matched any selector");
    }

    let canonical_url = canonical_url(fetched_url, source_url);
    debug!(%title, %author, %published_at, "Extracted article metadata");

    Ok(Extraction {
        title,
        author,
        published_at,
        canonical_url,
        body,
    })
}

fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(element) = document.select(selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Rebuild the permanent article link from the fetched URL's query
/// parameters. All four of `__biz`, `mid`, `idx`, `sn` must be present;
/// otherwise the source URL is returned unchanged. Parameter values are
/// kept percent-encoded as they appear on the wire.
pub fn canonical_url(fetched_url: &str, source_url: &str) -> String {
    let Ok(parsed) = Url::parse(fetched_url) else {
        return source_url.to_string();
    };
    let Some(query) = parsed.query() else {
        return source_url.to_string();
    };

    let biz = raw_query_param(query, "__biz");
    let mid = raw_query_param(query, "mid");
    let idx = raw_query_param(query, "idx");
    let sn = raw_query_param(query, "sn");

    match (biz, mid, idx, sn) {
        (Some(biz), Some(mid), Some(idx), Some(sn)) => format!(
            "https://mp.weixin.qq.com/s?__biz={biz}&mid={mid}&idx={idx}&sn={sn}"
        ),
        _ => source_url.to_string(),
    }
}

fn raw_query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key && !v.is_empty() { Some(v) } else { None }
    })
}
