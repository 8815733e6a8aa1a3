//! JSON export: a full structural dump of the article record.
//!
//! This is the lossless format. It contains `body_text` in full (not the
//! truncated preview), the rewritten body HTML, and the complete media
//! catalog; decoding it reconstructs the in-memory [`Article`] exactly.

use std::path::Path;

use tokio::fs;

use crate::error::{ExportCause, ExportError};
use crate::models::{Article, ExportFormat};

pub async fn write(article: &Article, path: &Path) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(article).map_err(|e| ExportError {
        format: ExportFormat::Json,
        path: path.to_path_buf(),
        source: ExportCause::Json(e),
    })?;
    fs::write(path, json).await.map_err(|e| ExportError {
        format: ExportFormat::Json,
        path: path.to_path_buf(),
        source: ExportCause::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRef, MediaCatalog};

    #[tokio::test]
    async fn test_json_file_round_trips_to_equal_article() {
        let article = Article {
            source_url: "https://mp.weixin.qq.com/s/abc".into(),
            canonical_url: "https://mp.weixin.qq.com/s?__biz=X&mid=Y&idx=1&sn=W".into(),
            title: "标题".into(),
            author: "作者".into(),
            published_at: "2024-06-30".into(),
            content_preview: "预览...".into(),
            body_text: "完整正文".into(),
            content_html: "<div><p>完整正文</p></div>".into(),
            media: MediaCatalog {
                images: vec![ImageRef {
                    original_url: "https://mmbiz.qpic.cn/a.jpg".into(),
                    local_path: Some("media/x_img_1.jpg".into()),
                }],
                videos: vec![],
            },
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        write(&article, &path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let decoded: Article = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, article);
    }
}
