// src/pipeline/translate.rs

//! Translation pass over captured content.

use crate::error::Result;
use crate::services::{TranslationContext, Translator};
use crate::storage::ContentStore;

/// Author used when an item is missing from its group manifest.
const UNKNOWN_AUTHOR: &str = "Unknown";

/// Summary of one forwarder pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    pub translated: usize,
    /// Items the translator returned nothing for; retried next pass
    pub failed: usize,
    pub already_done: usize,
    /// Groups skipped because of a storage error
    pub failed_groups: usize,
    /// Pass stopped early because the crawl window opened
    pub interrupted: bool,
}

type StopCheck<'a> = Box<dyn Fn() -> bool + Send + Sync + 'a>;

/// Forwards untranslated blobs through a [`Translator`].
pub struct TranslationForwarder<'a> {
    store: &'a dyn ContentStore,
    translator: &'a dyn Translator,
    stop: Option<StopCheck<'a>>,
}

impl<'a> TranslationForwarder<'a> {
    pub fn new(store: &'a dyn ContentStore, translator: &'a dyn Translator) -> Self {
        Self {
            store,
            translator,
            stop: None,
        }
    }

    /// Stop the pass between items once `check` returns true.
    pub fn stop_when(mut self, check: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.stop = Some(Box::new(check));
        self
    }

    fn should_stop(&self) -> bool {
        self.stop.as_ref().is_some_and(|check| check())
    }

    /// Run one pass over every group with captured content.
    pub async fn run_pass(&self) -> Result<TranslationReport> {
        let mut report = TranslationReport::default();

        for group_id in self.store.list_blob_groups().await? {
            if let Err(e) = self.translate_group(&group_id, &mut report).await {
                log::error!("[Translate] {}: pass aborted: {}", group_id, e);
                report.failed_groups += 1;
            }
            if report.interrupted {
                log::info!("[Translate] crawl window open, stopping translation");
                break;
            }
        }

        if report.translated == 0 && report.failed == 0 {
            log::info!("[Translate] no untranslated content found");
        } else {
            log::info!(
                "[Translate] pass complete: {} translated, {} failed",
                report.translated,
                report.failed
            );
        }
        Ok(report)
    }

    async fn translate_group(&self, group_id: &str, report: &mut TranslationReport) -> Result<()> {
        let lock = self.store.group_lock(group_id);
        let _guard = lock.lock().await;

        let manifest = self.store.load_manifest(group_id).await;

        for item_id in self.store.list_blobs(group_id).await? {
            if self.should_stop() {
                report.interrupted = true;
                return Ok(());
            }
            if self.store.has_translation(group_id, &item_id).await? {
                report.already_done += 1;
                continue;
            }
            let Some(content) = self.store.read_blob(group_id, &item_id).await? else {
                log::warn!("[Translate] source vanished, skipping {}/{}", group_id, item_id);
                continue;
            };

            let author_name = manifest
                .get(&item_id)
                .map(|item| item.author_name.clone())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
            let context = TranslationContext {
                author_name,
                group_name: group_id.to_string(),
                preserve_markup: true,
            };

            match self
                .translator
                .translate(&content, &context)
                .await
                .filter(|text| !text.trim().is_empty())
            {
                Some(translated) => {
                    self.store
                        .write_translation(group_id, &item_id, &translated)
                        .await?;
                    report.translated += 1;
                    log::info!(
                        "[Translate] {} {} by {}",
                        group_id,
                        item_id,
                        context.author_name
                    );
                }
                None => {
                    report.failed += 1;
                    log::error!(
                        "[Translate] failed for {} {} by {}",
                        group_id,
                        item_id,
                        context.author_name
                    );
                }
            }
        }
        Ok(())
    }
}
