// src/services/nogizaka.rs

//! Nogizaka46 blog API.
//!
//! The listing endpoint returns every post with its full body, so stubs carry
//! the item inline and no detail page is fetched.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::models::{GroupConfig, Item, ItemDetail, ItemStub, Locator, normalize_author};
use crate::services::{RawPage, SourceAdapter};
use crate::utils::date::{self, DateFormat};
use crate::utils::http::fetch_json;
use crate::utils::resolve_url;

/// JSONP callback name the endpoint wraps its payload in.
const CALLBACK: &str = "res";

static IMAGE_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]+)""#).expect("image pattern is valid"));

/// One record of the list API.
#[derive(Debug, Deserialize)]
struct BlogRecord {
    code: Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    text: String,
}

impl BlogRecord {
    /// `code` arrives as either a string or a number.
    fn id(&self) -> Option<String> {
        match &self.code {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct NogizakaAdapter {
    group: GroupConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl NogizakaAdapter {
    pub fn new(group: GroupConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(&group.base_url)?;
        Ok(Self {
            group,
            base_url,
            client,
        })
    }

    fn list_url(&self, page: usize) -> String {
        let rows = self.group.page_size.max(1);
        let path = format!(
            "/s/n46/api/list/blog?rw={rows}&st={}&callback={CALLBACK}",
            page * rows
        );
        resolve_url(&self.base_url, &path)
    }

    fn to_detail(&self, record: BlogRecord) -> Option<ItemDetail> {
        let id = record.id()?;
        let image_urls = IMAGE_SRC
            .captures_iter(&record.text)
            .map(|caps| resolve_url(&self.base_url, &caps[1]))
            .collect();

        Some(ItemDetail {
            item: Item {
                id,
                title: record.title.trim().to_string(),
                author_name: normalize_author(&record.name),
                timestamp: date::normalize(&record.date, DateFormat::SlashSeconds),
                image_urls,
                group_id: self.group.id.clone(),
            },
            content: record.text,
        })
    }
}

#[async_trait]
impl SourceAdapter for NogizakaAdapter {
    fn group_id(&self) -> &str {
        &self.group.id
    }

    async fn fetch_page_list(&self, page: usize) -> Option<RawPage> {
        fetch_json(&self.client, &self.list_url(page), CALLBACK)
            .await
            .map(RawPage::Json)
    }

    fn parse_page_list(&self, raw: &RawPage) -> Vec<ItemStub> {
        let RawPage::Json(payload) = raw else {
            log::warn!("{}: markup payload on a JSON listing", self.group.id);
            return Vec::new();
        };
        let Some(records) = payload.get("data").and_then(Value::as_array) else {
            return Vec::new();
        };

        records
            .iter()
            .filter_map(|value| match BlogRecord::deserialize(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("{}: skipping malformed record: {}", self.group.id, e);
                    None
                }
            })
            .filter_map(|record| self.to_detail(record))
            .map(ItemStub::inline)
            .collect()
    }

    async fn fetch_detail(&self, stub: &ItemStub) -> Option<ItemDetail> {
        match &stub.locator {
            Locator::Inline(detail) => Some((**detail).clone()),
            Locator::Url(_) => None,
        }
    }
}
