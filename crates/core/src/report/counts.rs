use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

static ITEM_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>.*?</item>").expect("valid item regex"));

static ATTACHMENT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<wp:post_type\b[^>]*>\s*(?:<!\[CDATA\[)?\s*attachment\s*(?:\]\]>)?\s*</wp:post_type>",
    )
    .expect("valid post type regex")
});

static ROOT_PARENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<wp:post_parent\b[^>]*>\s*0\s*</wp:post_parent>")
        .expect("valid post parent regex")
});

static MEDIA_CATEGORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<wp:term_taxonomy\b[^>]*>\s*<!\[CDATA\[media-category\]\]>\s*</wp:term_taxonomy>",
    )
    .expect("valid term taxonomy regex")
});

/// Counts of the structures an export turns into on the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralCounts {
    /// `media-category` terms, imported as item sets.
    #[serde(rename = "number_of_itemsets")]
    pub item_sets: usize,
    /// Attachments without a parent post, imported as items.
    #[serde(rename = "number_of_items")]
    pub items: usize,
    /// All attachments, imported as media.
    #[serde(rename = "number_of_media")]
    pub media: usize,
}

impl StructuralCounts {
    /// Scan a WXR document.
    pub fn from_document(xml: &str) -> Self {
        let mut counts = Self {
            item_sets: MEDIA_CATEGORY.find_iter(xml).count(),
            ..Self::default()
        };

        for item in ITEM_BLOCK.find_iter(xml) {
            let item = item.as_str();
            if ATTACHMENT_TYPE.is_match(item) {
                counts.media += 1;
                if ROOT_PARENT.is_match(item) {
                    counts.items += 1;
                }
            }
        }

        counts
    }

    /// Scan an export file; unreadable files count as empty.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(xml) => Self::from_document(&xml),
            Err(e) => {
                error!("Error counting tags in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"<rss><channel>
<wp:term><wp:term_taxonomy><![CDATA[media-category]]></wp:term_taxonomy></wp:term>
<wp:term><wp:term_taxonomy><![CDATA[category]]></wp:term_taxonomy></wp:term>
<item>
  <title>cover.jpg</title>
  <wp:post_type><![CDATA[attachment]]></wp:post_type>
  <wp:post_parent>0</wp:post_parent>
</item>
<item>
  <title>inline.png</title>
  <WP:POST_TYPE>attachment</WP:POST_TYPE>
  <wp:post_parent>17</wp:post_parent>
</item>
<item>
  <title>A post</title>
  <wp:post_type><![CDATA[post]]></wp:post_type>
  <wp:post_parent>0</wp:post_parent>
</item>
</channel></rss>"#;

    #[test]
    fn test_counts_synthetic_document() {
        let counts = StructuralCounts::from_document(DOCUMENT);
        assert_eq!(
            counts,
            StructuralCounts {
                item_sets: 1,
                items: 1,
                media: 2,
            }
        );
    }

    #[test]
    fn test_placeholder_counts_zero() {
        let counts = StructuralCounts::from_document("<!-- Error exporting data: HTTP 500 -->");
        assert_eq!(counts, StructuralCounts::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", DOCUMENT).unwrap();
        assert_eq!(StructuralCounts::from_file(file.path()).media, 2);

        let missing = StructuralCounts::from_file(Path::new("/nonexistent/export.xml"));
        assert_eq!(missing, StructuralCounts::default());
    }

    #[test]
    fn test_serialized_keys() {
        let json = serde_json::to_value(StructuralCounts {
            item_sets: 3,
            items: 2,
            media: 5,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"number_of_itemsets": 3, "number_of_items": 2, "number_of_media": 5})
        );
    }
}
