// src/services/mod.rs

//! Service layer for the harvester.
//!
//! This module contains:
//! - Source adapters, one per publisher (`SourceAdapter`)
//! - The translation client (`LlmTranslator`)

mod bokuao;
mod hinatazaka;
mod markup;
mod nogizaka;
mod sakurazaka;
pub mod selectors;
mod translator;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{GroupConfig, ItemDetail, ItemStub, SourceKind};

pub use markup::{MarkupAdapter, SiteProfile};
pub use nogizaka::NogizakaAdapter;
pub use translator::{LlmTranslator, Prompt, TranslationContext, Translator, build_prompt};

/// A fetched listing page, before parsing.
#[derive(Debug, Clone)]
pub enum RawPage {
    Markup(String),
    Json(Value),
}

/// Per-source fetching and parsing.
///
/// Fetch methods absorb transport and decode failures: a page that cannot be
/// fetched is `None`, and a page that cannot be parsed yields no stubs.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Group this adapter crawls.
    fn group_id(&self) -> &str;

    /// First page index of the listing.
    fn start_page(&self) -> usize {
        0
    }

    /// Fetch one listing page.
    async fn fetch_page_list(&self, page: usize) -> Option<RawPage>;

    /// Extract item stubs from a listing page, in listing order.
    fn parse_page_list(&self, raw: &RawPage) -> Vec<ItemStub>;

    /// Resolve a stub to the full item and its content.
    async fn fetch_detail(&self, stub: &ItemStub) -> Option<ItemDetail>;
}

/// Build the adapter for a configured group.
pub fn build_adapter(
    group: &GroupConfig,
    client: reqwest::Client,
) -> Result<Box<dyn SourceAdapter>> {
    let adapter: Box<dyn SourceAdapter> = match group.source {
        SourceKind::Nogizaka => Box::new(NogizakaAdapter::new(group.clone(), client)?),
        SourceKind::Hinatazaka => {
            Box::new(MarkupAdapter::new(group.clone(), client, hinatazaka::profile())?)
        }
        SourceKind::Sakurazaka => {
            Box::new(MarkupAdapter::new(group.clone(), client, sakurazaka::profile())?)
        }
        SourceKind::Bokuao => Box::new(MarkupAdapter::new(group.clone(), client, bokuao::profile())?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    #[test]
    fn test_build_adapter_for_default_groups() {
        let config = Config::default();
        let client = reqwest::Client::new();
        for group in &config.groups {
            let adapter = build_adapter(group, client.clone()).unwrap();
            assert_eq!(adapter.group_id(), group.id);
            let expected_start = if group.source == SourceKind::Bokuao { 1 } else { 0 };
            assert_eq!(adapter.start_page(), expected_start);
        }
    }

    #[test]
    fn test_build_adapter_rejects_bad_base_url() {
        let mut group = Config::default().groups[0].clone();
        group.base_url = "not a url".into();
        assert!(build_adapter(&group, reqwest::Client::new()).is_err());
    }
}
