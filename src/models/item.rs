//! Blog item data structures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id-indexed view of a group's manifest.
pub type ItemMap = HashMap<String, Item>;

/// Metadata for one blog post, as persisted in the group manifest.
///
/// Field names follow the on-disk manifest format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Source-unique post identifier
    #[serde(rename = "ID")]
    pub id: String,

    /// Post title
    #[serde(rename = "Title", default)]
    pub title: String,

    /// Author name with all whitespace removed
    #[serde(rename = "Name", default)]
    pub author_name: String,

    /// Publication instant
    #[serde(rename = "DateTime")]
    pub timestamp: DateTime<Utc>,

    /// Image URLs in document order
    #[serde(rename = "ImageList", default)]
    pub image_urls: Vec<String>,

    /// Owning group id
    #[serde(rename = "Group", default)]
    pub group_id: String,
}

/// A fully extracted post: metadata plus its raw body.
///
/// The body is split off before the metadata enters the manifest and is
/// never joined back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub item: Item,
    pub content: String,
}

impl ItemDetail {
    /// Split into manifest metadata and raw content.
    pub fn into_parts(self) -> (Item, String) {
        (self.item, self.content)
    }
}

/// Where to get the full detail for a listed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Detail page that still has to be fetched
    Url(String),
    /// The listing already carried the full item
    Inline(Box<ItemDetail>),
}

/// One entry of a page listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStub {
    pub id: String,
    pub locator: Locator,
}

impl ItemStub {
    /// Stub pointing at a detail page.
    pub fn linked(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: Locator::Url(url.into()),
        }
    }

    /// Stub that already carries its detail.
    pub fn inline(detail: ItemDetail) -> Self {
        Self {
            id: detail.item.id.clone(),
            locator: Locator::Inline(Box::new(detail)),
        }
    }

    /// Detail page URL, if this stub needs a second fetch.
    pub fn url(&self) -> Option<&str> {
        match &self.locator {
            Locator::Url(url) => Some(url),
            Locator::Inline(_) => None,
        }
    }
}

/// Remove every whitespace character from an author name.
pub fn normalize_author(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_author() {
        assert_eq!(normalize_author(" 小坂 菜緒\n"), "小坂菜緒");
        assert_eq!(normalize_author("井上\u{3000}和"), "井上和");
    }

    #[test]
    fn test_item_uses_manifest_field_names() {
        let item = Item {
            id: "12345".into(),
            title: "title".into(),
            author_name: "name".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 0, 30, 0).unwrap(),
            image_urls: vec!["https://cdn.example.com/a.jpg".into()],
            group_id: "Hinatazaka46".into(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["ID"], "12345");
        assert_eq!(value["Name"], "name");
        assert_eq!(value["DateTime"], "2025-03-14T00:30:00Z");
        assert_eq!(value["ImageList"][0], "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_item_accepts_millisecond_timestamps() {
        let json = r#"{"ID":"1","Title":"t","Name":"n","DateTime":"2023-01-01T03:00:00.000Z","ImageList":[]}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.timestamp, Utc.with_ymd_and_hms(2023, 1, 1, 3, 0, 0).unwrap());
        assert!(item.group_id.is_empty());
    }

    #[test]
    fn test_stub_url() {
        let stub = ItemStub::linked("1", "https://example.com/1");
        assert_eq!(stub.url(), Some("https://example.com/1"));
    }
}
