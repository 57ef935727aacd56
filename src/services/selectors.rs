//! Compiled CSS selectors and extraction helpers for markup sources.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Item, ItemDetail, ItemStub, normalize_author};
use crate::utils::date::{self, DateFormat};
use crate::utils::{extract_item_id, resolve_url};

/// Selector strings for one site's listing and detail pages.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSpec {
    /// Each listed post on a page
    pub row: &'static str,
    /// Link to the detail page, within a row
    pub link: &'static str,
    /// Only rows whose `class` attribute equals this exactly
    pub exact_row_class: Option<&'static str>,
    pub title: &'static str,
    pub author: &'static str,
    pub date: &'static str,
    /// Post body; its inner markup is the stored content
    pub body: &'static str,
    /// Extra element a well-formed detail page must contain
    pub must_have: Option<&'static str>,
}

/// Parsed selectors for one site.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    row: Selector,
    link: Selector,
    exact_row_class: Option<&'static str>,
    title: Selector,
    author: Selector,
    date: Selector,
    body: Selector,
    must_have: Option<Selector>,
    image: Selector,
}

impl SiteSelectors {
    /// Compile a selector spec.
    pub fn compile(spec: &SelectorSpec) -> Result<Self> {
        Ok(Self {
            row: parse_selector(spec.row)?,
            link: parse_selector(spec.link)?,
            exact_row_class: spec.exact_row_class,
            title: parse_selector(spec.title)?,
            author: parse_selector(spec.author)?,
            date: parse_selector(spec.date)?,
            body: parse_selector(spec.body)?,
            must_have: spec.must_have.map(parse_selector).transpose()?,
            image: parse_selector("img")?,
        })
    }

    /// Extract item stubs from a listing page.
    ///
    /// Rows without a link or a usable id are skipped.
    pub fn extract_stubs(&self, html: &str, base_url: &Url) -> Vec<ItemStub> {
        let document = Html::parse_document(html);

        document
            .select(&self.row)
            .filter(|row| match self.exact_row_class {
                Some(class) => row.value().attr("class") == Some(class),
                None => true,
            })
            .filter_map(|row| {
                let href = row.select(&self.link).next()?.value().attr("href")?;
                let id = extract_item_id(href)?;
                Some(ItemStub::linked(id, resolve_url(base_url, href)))
            })
            .collect()
    }

    /// Extract a full item from a detail page.
    ///
    /// Returns `None` when the body, the author or the `must_have` element
    /// is missing.
    pub fn extract_detail(
        &self,
        html: &str,
        id: &str,
        page_url: &Url,
        group_id: &str,
        format: DateFormat,
    ) -> Option<ItemDetail> {
        let document = Html::parse_document(html);

        if let Some(required) = &self.must_have {
            document.select(required).next()?;
        }
        let body = document.select(&self.body).next()?;
        let author = document
            .select(&self.author)
            .next()
            .map(|el| normalize_author(&element_text(el)))
            .filter(|name| !name.is_empty())?;

        let title = document
            .select(&self.title)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let raw_date = document
            .select(&self.date)
            .next()
            .map(element_text)
            .unwrap_or_default();

        Some(ItemDetail {
            item: Item {
                id: id.to_string(),
                title,
                author_name: author,
                timestamp: date::normalize(&raw_date, format),
                image_urls: image_sources(body, &self.image, page_url),
                group_id: group_id.to_string(),
            },
            content: body.inner_html(),
        })
    }
}

/// Parse a CSS selector.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text content of an element with whitespace runs collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `src` of every image under an element, resolved against the page URL.
pub fn image_sources(element: ElementRef<'_>, image: &Selector, page_url: &Url) -> Vec<String> {
    element
        .select(image)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(|src| resolve_url(page_url, src.trim()))
        .collect()
}
