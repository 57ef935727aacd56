//! Adapter for sources that publish paginated HTML listings with one detail
//! page per post.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::models::{GroupConfig, ItemDetail, ItemStub, Locator};
use crate::services::selectors::{SelectorSpec, SiteSelectors};
use crate::services::{RawPage, SourceAdapter};
use crate::utils::date::DateFormat;
use crate::utils::http::fetch_text;

/// Site-specific shape of a markup source.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    /// Listing path for a page number, relative to the group's base URL
    pub list_path: fn(usize) -> String,
    /// First page index of the listing
    pub start_page: usize,
    pub selectors: SelectorSpec,
    pub date_format: DateFormat,
}

/// Markup source adapter driven by a [`SiteProfile`].
pub struct MarkupAdapter {
    group: GroupConfig,
    base_url: Url,
    client: reqwest::Client,
    profile: SiteProfile,
    selectors: SiteSelectors,
}

impl MarkupAdapter {
    /// Create an adapter, compiling the profile's selectors.
    pub fn new(group: GroupConfig, client: reqwest::Client, profile: SiteProfile) -> Result<Self> {
        let base_url = Url::parse(&group.base_url)?;
        let selectors = SiteSelectors::compile(&profile.selectors)?;
        Ok(Self {
            group,
            base_url,
            client,
            profile,
            selectors,
        })
    }

    fn list_url(&self, page: usize) -> String {
        crate::utils::resolve_url(&self.base_url, &(self.profile.list_path)(page))
    }

    fn cookie(&self) -> Option<&str> {
        self.group.cookie.as_deref()
    }
}

#[async_trait]
impl SourceAdapter for MarkupAdapter {
    fn group_id(&self) -> &str {
        &self.group.id
    }

    fn start_page(&self) -> usize {
        self.profile.start_page
    }

    async fn fetch_page_list(&self, page: usize) -> Option<RawPage> {
        let url = self.list_url(page);
        fetch_text(&self.client, &url, self.cookie())
            .await
            .map(RawPage::Markup)
    }

    fn parse_page_list(&self, raw: &RawPage) -> Vec<ItemStub> {
        match raw {
            RawPage::Markup(html) => self.selectors.extract_stubs(html, &self.base_url),
            RawPage::Json(_) => {
                log::warn!("{}: JSON payload on a markup listing", self.group.id);
                Vec::new()
            }
        }
    }

    async fn fetch_detail(&self, stub: &ItemStub) -> Option<ItemDetail> {
        let url = match &stub.locator {
            Locator::Url(url) => url,
            Locator::Inline(detail) => return Some((**detail).clone()),
        };
        let page_url = Url::parse(url).ok()?;
        let html = fetch_text(&self.client, url, self.cookie()).await?;

        let detail = self.selectors.extract_detail(
            &html,
            &stub.id,
            &page_url,
            &self.group.id,
            self.profile.date_format,
        );
        if detail.is_none() {
            log::warn!(
                "{}: skipping {} ({}), detail page is missing required fields",
                self.group.id,
                stub.id,
                url
            );
        }
        detail
    }
}
