// src/pipeline/schedule.rs

//! Cycle selection and the polling loop.
//!
//! Each cycle runs in exactly one mode. Crawl mode covers local hours after
//! `crawl_after_hour`; translate mode covers the rest of the day.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::{AppError, Result};
use crate::models::{Config, GroupConfig};
use crate::pipeline::{CrawlOrchestrator, CrawlReport, TranslationForwarder, TranslationReport};
use crate::services::{Translator, build_adapter};
use crate::storage::ContentStore;

/// What a cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub mode: CycleMode,
    pub crawls: Vec<CrawlReport>,
    /// Groups whose run failed, with the error message
    pub failed_groups: Vec<(String, String)>,
    pub translation: Option<TranslationReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleMode {
    #[default]
    Crawl,
    Translate,
}

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives crawl runs and translation passes on the configured cadence.
pub struct Scheduler {
    config: Config,
    store: Arc<dyn ContentStore>,
    client: reqwest::Client,
    translator: Option<Arc<dyn Translator>>,
    clock: Clock,
}

impl Scheduler {
    pub fn new(config: Config, store: Arc<dyn ContentStore>, client: reqwest::Client) -> Self {
        Self {
            config,
            store,
            client,
            translator: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used by the polling loop and the translation gate.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attach the translator used in translate mode.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one cycle in the mode selected by `now`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let schedule = &self.config.schedule;
        let local_hour = schedule.local_hour(now);

        if schedule.is_crawl_window(now) {
            log::info!("Starting cycle at local hour {} for crawling", local_hour);
            let groups: Vec<&GroupConfig> = self
                .config
                .groups
                .iter()
                .filter(|g| g.is_active_at(local_hour))
                .collect();
            let mut report = self.crawl_groups(&groups).await;
            report.mode = CycleMode::Crawl;
            log::info!("Cycle complete");
            return report;
        }

        log::info!("Starting cycle at local hour {} for translation", local_hour);
        let mut report = CycleReport {
            mode: CycleMode::Translate,
            ..CycleReport::default()
        };
        if self.config.translation.enabled {
            match self.translate(true).await {
                Ok(pass) => report.translation = Some(pass),
                Err(e) => log::error!("Translation pass failed: {}", e),
            }
        } else {
            log::info!("Translation disabled, nothing to do");
        }
        log::info!("Cycle complete");
        report
    }

    /// Crawl enabled groups now, regardless of the time of day.
    ///
    /// With `only`, crawl just that group.
    pub async fn crawl_now(&self, only: Option<&str>) -> Result<CycleReport> {
        let groups: Vec<&GroupConfig> = match only {
            Some(id) => {
                let group = self
                    .config
                    .group(id)
                    .ok_or_else(|| AppError::config(format!("unknown group '{id}'")))?;
                vec![group]
            }
            None => self.config.groups.iter().filter(|g| g.enabled).collect(),
        };
        Ok(self.crawl_groups(&groups).await)
    }

    /// Run one translation pass now, regardless of the time of day.
    pub async fn translate_now(&self) -> Result<TranslationReport> {
        self.translate(false).await
    }

    /// Run cycles forever: one immediately, then one per polling interval.
    pub async fn run_forever(&self) {
        let period = Duration::from_secs(self.config.schedule.polling_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.run_cycle((self.clock)()).await;
        }
    }

    async fn crawl_groups(&self, groups: &[&GroupConfig]) -> CycleReport {
        let runs = groups.iter().map(|group| async move {
            (group.id.clone(), self.crawl_group(group).await)
        });

        let mut report = CycleReport::default();
        for (group_id, result) in join_all(runs).await {
            match result {
                Ok(crawl) => report.crawls.push(crawl),
                Err(e) => {
                    log::error!("{}: crawl failed: {}", group_id, e);
                    report.failed_groups.push((group_id, e.to_string()));
                }
            }
        }
        report
    }

    async fn crawl_group(&self, group: &GroupConfig) -> Result<CrawlReport> {
        let adapter = build_adapter(group, self.client.clone())?;
        CrawlOrchestrator::new(adapter.as_ref(), self.store.as_ref(), &self.config.crawler)
            .run()
            .await
    }

    async fn translate(&self, gated: bool) -> Result<TranslationReport> {
        let translator = self
            .translator
            .as_deref()
            .ok_or_else(|| AppError::translation("no translator configured"))?;

        let forwarder = TranslationForwarder::new(self.store.as_ref(), translator);
        if gated {
            let schedule = &self.config.schedule;
            let clock = &self.clock;
            forwarder
                .stop_when(move || schedule.is_crawl_window(clock()))
                .run_pass()
                .await
        } else {
            forwarder.run_pass().await
        }
    }
}
