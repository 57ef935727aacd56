// src/pipeline/crawl.rs

//! Incremental crawl of one group.
//!
//! A run loads the group manifest into an in-memory snapshot, sweeps listing
//! pages in fixed-size batches, admits every unseen item (blob first, then
//! metadata), and flushes the manifest once at the end if anything was added.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{CrawlerConfig, ItemMap, ItemStub, Locator};
use crate::services::SourceAdapter;
use crate::storage::ContentStore;

/// Summary of one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub group_id: String,
    /// Listing pages processed
    pub pages: usize,
    /// Highest page index processed
    pub last_page: Option<usize>,
    pub new_items: usize,
    /// Pages whose processing failed and counted as empty
    pub failed_pages: usize,
    /// Items in the manifest after the run
    pub total_items: usize,
    /// Whether the manifest was written
    pub saved: bool,
}

/// In-memory state shared by the page units of one run.
#[derive(Debug, Default)]
struct Sweep {
    snapshot: ItemMap,
    /// Ids currently being fetched by some page unit
    in_flight: HashSet<String>,
    added: usize,
    failed_pages: usize,
}

impl Sweep {
    /// Claim an id for this unit. False if it is known or already claimed.
    fn reserve(&mut self, id: &str) -> bool {
        if self.snapshot.contains_key(id) || self.in_flight.contains(id) {
            return false;
        }
        self.in_flight.insert(id.to_string())
    }

    fn release(&mut self, id: &str) {
        self.in_flight.remove(id);
    }
}

/// Sweeps one group's listing through its adapter into a content store.
pub struct CrawlOrchestrator<'a> {
    adapter: &'a dyn SourceAdapter,
    store: &'a dyn ContentStore,
    settings: &'a CrawlerConfig,
    concurrency: usize,
}

impl<'a> CrawlOrchestrator<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        store: &'a dyn ContentStore,
        settings: &'a CrawlerConfig,
    ) -> Self {
        Self {
            adapter,
            store,
            settings,
            concurrency: settings.concurrency().max(1),
        }
    }

    fn group_id(&self) -> &str {
        self.adapter.group_id()
    }

    /// Run one sweep.
    ///
    /// Fatal storage errors abort the run without touching the manifest.
    pub async fn run(&self) -> Result<CrawlReport> {
        let group_id = self.group_id().to_string();
        let lock = self.store.group_lock(&group_id);
        let _guard = lock.lock().await;

        log::info!("--- Starting {} ---", group_id);
        let snapshot = self.store.load_manifest(&group_id).await;
        log::info!("Loaded {} existing items for {}", snapshot.len(), group_id);

        let state = Mutex::new(Sweep {
            snapshot,
            ..Sweep::default()
        });

        let batch_size = self.settings.batch_size.max(1);
        let max_pages = self.settings.max_pages;
        let threshold = self.settings.stop_after_empty_pages;

        let mut report = CrawlReport {
            group_id: group_id.clone(),
            ..CrawlReport::default()
        };
        let mut page = self.adapter.start_page();
        let mut empty_pages = 0;

        while page < max_pages {
            let batch_end = (page + batch_size).min(max_pages);
            let results: Vec<Result<bool>> = stream::iter(page..batch_end)
                .map(|p| self.process_page(p, &state))
                .buffered(self.concurrency)
                .collect()
                .await;

            let mut any_new = false;
            for result in results {
                any_new |= result?;
            }
            report.pages += batch_end - page;
            report.last_page = Some(batch_end - 1);

            if any_new {
                empty_pages = 0;
            } else {
                empty_pages += batch_end - page;
            }
            if empty_pages >= threshold {
                log::info!(
                    "{}: stopping, no new items for {} pages",
                    group_id,
                    empty_pages
                );
                break;
            }
            page = batch_end;
        }

        let state = state.into_inner();
        report.new_items = state.added;
        report.failed_pages = state.failed_pages;
        report.total_items = state.snapshot.len();

        if state.added > 0 {
            log::info!("Saving {} new items for {}", state.added, group_id);
            self.store.save_manifest(&group_id, &state.snapshot).await?;
            report.saved = true;
        } else {
            log::info!("{} is up to date", group_id);
        }
        Ok(report)
    }

    /// Process one listing page. True if it yielded at least one new item.
    ///
    /// Only fatal errors escape; anything else is logged and the page counts
    /// as empty.
    async fn process_page(&self, page: usize, state: &Mutex<Sweep>) -> Result<bool> {
        match self.collect_page(page, state).await {
            Ok(added) => Ok(added > 0),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::error!("{}: error processing page {}: {}", self.group_id(), page, e);
                state.lock().await.failed_pages += 1;
                Ok(false)
            }
        }
    }

    async fn collect_page(&self, page: usize, state: &Mutex<Sweep>) -> Result<usize> {
        let Some(raw) = self.adapter.fetch_page_list(page).await else {
            log::debug!("{}: page {} unavailable", self.group_id(), page);
            return Ok(0);
        };
        let stubs = self.adapter.parse_page_list(&raw);
        if stubs.is_empty() {
            return Ok(0);
        }

        let mut added = 0;
        for stub in stubs {
            if !state.lock().await.reserve(&stub.id) {
                continue;
            }
            match self.admit(&stub, state).await {
                Ok(true) => added += 1,
                Ok(false) => state.lock().await.release(&stub.id),
                Err(e) => {
                    state.lock().await.release(&stub.id);
                    return Err(e);
                }
            }
        }
        Ok(added)
    }

    /// Resolve a reserved stub and persist it. False if it was skipped.
    async fn admit(&self, stub: &ItemStub, state: &Mutex<Sweep>) -> Result<bool> {
        let detail = match &stub.locator {
            Locator::Inline(detail) => Some((**detail).clone()),
            Locator::Url(_) => self.adapter.fetch_detail(stub).await,
        };
        let Some(detail) = detail else {
            return Ok(false);
        };
        let (mut item, content) = detail.into_parts();
        item.id = stub.id.clone();

        let group_id = self.group_id();
        match self
            .store
            .write_blob_if_absent(group_id, &item.id, &content)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("{}: skipping {}: {}", group_id, item.id, e);
                return Ok(false);
            }
        }

        log::info!(
            "[NEW] {}|{}|{}|images: {}|{}",
            group_id,
            item.author_name,
            item.id,
            item.image_urls.len(),
            item.title
        );

        let mut state = state.lock().await;
        state.in_flight.remove(&item.id);
        state.snapshot.insert(item.id.clone(), item);
        state.added += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use crate::error::AppError;
    use crate::models::{Item, ItemDetail, PathsConfig};
    use crate::services::RawPage;
    use crate::storage::LocalStorage;

    /// Listing pages keyed by index; missing pages list nothing.
    #[derive(Default)]
    struct FakeSource {
        start: usize,
        pages: HashMap<usize, Vec<String>>,
        unavailable: HashSet<usize>,
        listed: std::sync::Mutex<Vec<usize>>,
        detail_calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_pages(pages: impl IntoIterator<Item = (usize, Vec<&'static str>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(p, ids)| (p, ids.into_iter().map(str::to_string).collect()))
                    .collect(),
                ..Self::default()
            }
        }

        fn listed(&self) -> Vec<usize> {
            let mut pages = self.listed.lock().unwrap().clone();
            pages.sort_unstable();
            pages
        }
    }

    fn detail(id: &str) -> ItemDetail {
        let n: u32 = id.parse().unwrap_or(0);
        ItemDetail {
            item: Item {
                id: id.to_string(),
                title: format!("post {id}"),
                author_name: if n % 2 == 0 { "金村美玖" } else { "小坂菜緒" }.to_string(),
                timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, n % 60, 0).unwrap(),
                image_urls: vec![],
                group_id: "Hinatazaka46".to_string(),
            },
            content: format!("<p>{id}</p>"),
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeSource {
        fn group_id(&self) -> &str {
            "Hinatazaka46"
        }

        fn start_page(&self) -> usize {
            self.start
        }

        async fn fetch_page_list(&self, page: usize) -> Option<RawPage> {
            self.listed.lock().unwrap().push(page);
            if self.unavailable.contains(&page) {
                return None;
            }
            Some(RawPage::Markup(page.to_string()))
        }

        fn parse_page_list(&self, raw: &RawPage) -> Vec<ItemStub> {
            let RawPage::Markup(page) = raw else {
                return Vec::new();
            };
            let page: usize = page.parse().unwrap();
            self.pages
                .get(&page)
                .map(|ids| {
                    ids.iter()
                        .map(|id| ItemStub::linked(id.clone(), format!("https://example.com/{id}")))
                        .collect()
                })
                .unwrap_or_default()
        }

        async fn fetch_detail(&self, stub: &ItemStub) -> Option<ItemDetail> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Some(detail(&stub.id))
        }
    }

    /// Local store that counts manifest saves and can fail blob writes.
    struct CountingStore {
        inner: LocalStorage,
        saves: AtomicUsize,
        fail_blobs: bool,
    }

    impl CountingStore {
        fn new(tmp: &TempDir) -> Self {
            Self {
                inner: LocalStorage::new(PathsConfig {
                    root: tmp.path().to_path_buf(),
                    ..PathsConfig::default()
                }),
                saves: AtomicUsize::new(0),
                fail_blobs: false,
            }
        }

        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentStore for CountingStore {
        async fn load_manifest(&self, group_id: &str) -> ItemMap {
            self.inner.load_manifest(group_id).await
        }

        async fn save_manifest(&self, group_id: &str, items: &ItemMap) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_manifest(group_id, items).await
        }

        async fn write_blob_if_absent(
            &self,
            group_id: &str,
            item_id: &str,
            content: &str,
        ) -> Result<bool> {
            if self.fail_blobs {
                return Err(AppError::storage(self.inner.root(), "disk full"));
            }
            self.inner.write_blob_if_absent(group_id, item_id, content).await
        }

        async fn has_blob(&self, group_id: &str, item_id: &str) -> Result<bool> {
            self.inner.has_blob(group_id, item_id).await
        }

        async fn read_blob(&self, group_id: &str, item_id: &str) -> Result<Option<String>> {
            self.inner.read_blob(group_id, item_id).await
        }

        async fn list_blob_groups(&self) -> Result<Vec<String>> {
            self.inner.list_blob_groups().await
        }

        async fn list_blobs(&self, group_id: &str) -> Result<Vec<String>> {
            self.inner.list_blobs(group_id).await
        }

        async fn has_translation(&self, group_id: &str, item_id: &str) -> Result<bool> {
            self.inner.has_translation(group_id, item_id).await
        }

        async fn write_translation(
            &self,
            group_id: &str,
            item_id: &str,
            content: &str,
        ) -> Result<()> {
            self.inner.write_translation(group_id, item_id, content).await
        }

        fn group_lock(&self, group_id: &str) -> Arc<tokio::sync::Mutex<()>> {
            self.inner.group_lock(group_id)
        }
    }

    fn settings() -> CrawlerConfig {
        CrawlerConfig {
            max_concurrent: 4,
            ..CrawlerConfig::default()
        }
    }

    fn five_busy_pages() -> FakeSource {
        FakeSource::with_pages([
            (0, vec!["1", "2"]),
            (1, vec!["3", "4"]),
            (2, vec!["5", "6"]),
            (3, vec!["7", "8"]),
            (4, vec!["9", "10"]),
            (5, vec!["1"]),
            (6, vec!["2"]),
        ])
    }

    #[tokio::test]
    async fn test_sweep_halts_after_empty_batch() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let source = five_busy_pages();
        let settings = settings();

        let report = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.new_items, 10);
        assert_eq!(report.last_page, Some(9));
        assert_eq!(report.pages, 10);
        assert!(report.saved);
        assert_eq!(store.saves(), 1);
        assert_eq!(source.listed(), (0..10).collect::<Vec<_>>());

        let manifest = store.load_manifest("Hinatazaka46").await;
        assert_eq!(manifest.len(), 10);
        assert!(store.has_blob("Hinatazaka46", "7").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let settings = settings();

        let first = five_busy_pages();
        CrawlOrchestrator::new(&first, &store, &settings)
            .run()
            .await
            .unwrap();
        let manifest_path = tmp.path().join("record/Hinatazaka46/BlogStatus.json");
        let before = std::fs::read_to_string(&manifest_path).unwrap();

        let second = five_busy_pages();
        let report = CrawlOrchestrator::new(&second, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.new_items, 0);
        assert!(!report.saved);
        assert_eq!(store.saves(), 1);
        assert_eq!(second.detail_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.listed(), vec![0, 1, 2, 3, 4]);
        assert_eq!(std::fs::read_to_string(&manifest_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_exhausted_source_stops_after_five_pages() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let source = FakeSource::default();
        let settings = settings();

        let report = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.pages, 5);
        assert_eq!(source.listed(), vec![0, 1, 2, 3, 4]);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn test_page_cap_clips_last_batch() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let source = five_busy_pages();
        let settings = CrawlerConfig {
            max_pages: 3,
            ..settings()
        };

        let report = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(source.listed(), vec![0, 1, 2]);
        assert_eq!(report.new_items, 6);
        assert_eq!(report.last_page, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_ids_across_pages_are_fetched_once() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let source = FakeSource::with_pages([
            (0, vec!["42"]),
            (1, vec!["42"]),
            (2, vec!["42", "43"]),
        ]);
        let settings = settings();

        let report = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.new_items, 2);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.load_manifest("Hinatazaka46").await.len(), 2);
    }

    #[tokio::test]
    async fn test_start_page_is_adapter_defined() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let source = FakeSource {
            start: 1,
            ..FakeSource::default()
        };
        let settings = settings();

        CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(source.listed(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_unavailable_page_does_not_abort_sweep() {
        let tmp = TempDir::new().unwrap();
        let store = CountingStore::new(&tmp);
        let mut source = five_busy_pages();
        source.unavailable.insert(2);
        let settings = settings();

        let report = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.new_items, 8);
        assert!(report.saved);
        assert!(!store.has_blob("Hinatazaka46", "5").await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_without_saving() {
        let tmp = TempDir::new().unwrap();
        let mut store = CountingStore::new(&tmp);
        store.fail_blobs = true;
        let source = five_busy_pages();
        let settings = settings();

        let err = CrawlOrchestrator::new(&source, &store, &settings)
            .run()
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(store.saves(), 0);
        assert!(store.load_manifest("Hinatazaka46").await.is_empty());
    }
}
