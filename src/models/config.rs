//! Application configuration structures.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CohortMap;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and sweep behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// On-disk layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Polling cadence and crawl/translate windows
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Translation backend settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Content sources
    #[serde(default = "defaults::default_groups")]
    pub groups: Vec<GroupConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Look up a group by id.
    pub fn group(&self, id: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.batch_size == 0 {
            return Err(AppError::validation("crawler.batch_size must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.crawler.stop_after_empty_pages == 0 {
            return Err(AppError::validation(
                "crawler.stop_after_empty_pages must be > 0",
            ));
        }
        if self.schedule.polling_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.polling_interval_secs must be > 0",
            ));
        }
        if self.schedule.crawl_after_hour > 23 {
            return Err(AppError::validation(
                "schedule.crawl_after_hour must be within 0..=23",
            ));
        }
        if self.groups.is_empty() {
            return Err(AppError::validation("No groups defined"));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.id.trim().is_empty() {
                return Err(AppError::validation("group id is empty"));
            }
            if !seen.insert(group.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate group id '{}'",
                    group.id
                )));
            }
            if group.page_size == 0 {
                return Err(AppError::validation(format!(
                    "groups.{}.page_size must be > 0",
                    group.id
                )));
            }
            if let Some(hour) = group.active_hours.iter().find(|h| **h > 23) {
                return Err(AppError::validation(format!(
                    "groups.{}.active_hours contains invalid hour {}",
                    group.id, hour
                )));
            }
            if let Some((column, _)) = group.cohorts.iter().find(|(_, m)| m.is_empty()) {
                return Err(AppError::validation(format!(
                    "groups.{}.cohorts.{} has no members",
                    group.id, column
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            paths: PathsConfig::default(),
            schedule: ScheduleConfig::default(),
            translation: TranslationConfig::default(),
            groups: defaults::default_groups(),
        }
    }
}

/// HTTP client and sweep behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent page units (0 = available processing units)
    #[serde(default)]
    pub max_concurrent: usize,

    /// Pages submitted together per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Hard cap on the page index
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Consecutive pages without new items that end a sweep
    #[serde(default = "defaults::stop_after_empty_pages")]
    pub stop_after_empty_pages: usize,
}

impl CrawlerConfig {
    /// Effective concurrency limit for page units.
    pub fn concurrency(&self) -> usize {
        if self.max_concurrent > 0 {
            return self.max_concurrent;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: 0,
            batch_size: defaults::batch_size(),
            max_pages: defaults::max_pages(),
            stop_after_empty_pages: defaults::stop_after_empty_pages(),
        }
    }
}

/// On-disk layout, relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::root")]
    pub root: PathBuf,

    /// Per-group manifest directories
    #[serde(default = "defaults::record_dir")]
    pub record_dir: String,

    /// Raw content blobs
    #[serde(default = "defaults::content_dir")]
    pub content_dir: String,

    /// Translated content blobs
    #[serde(default = "defaults::translated_dir")]
    pub translated_dir: String,

    /// Manifest file name inside each group's record directory
    #[serde(default = "defaults::manifest_file")]
    pub manifest_file: String,

    /// Blob file extension
    #[serde(default = "defaults::blob_extension")]
    pub blob_extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: defaults::root(),
            record_dir: defaults::record_dir(),
            content_dir: defaults::content_dir(),
            translated_dir: defaults::translated_dir(),
            manifest_file: defaults::manifest_file(),
            blob_extension: defaults::blob_extension(),
        }
    }
}

/// Polling cadence and the crawl/translate split of the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between cycles
    #[serde(default = "defaults::polling_interval")]
    pub polling_interval_secs: u64,

    /// Offset applied to the UTC hour to get the local hour
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Crawl mode when the local hour is strictly greater than this
    #[serde(default = "defaults::crawl_after_hour")]
    pub crawl_after_hour: u32,
}

impl ScheduleConfig {
    /// Local hour of day (0-23) for an instant.
    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        (now.hour() as i32 + self.utc_offset_hours).rem_euclid(24) as u32
    }

    /// Whether an instant falls inside the crawl window.
    pub fn is_crawl_window(&self, now: DateTime<Utc>) -> bool {
        self.local_hour(now) > self.crawl_after_hour
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: defaults::polling_interval(),
            utc_offset_hours: defaults::utc_offset_hours(),
            crawl_after_hour: defaults::crawl_after_hour(),
        }
    }
}

/// Translation backend.
///
/// Names are matched case-insensitively; unknown names select Gemini.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Provider {
    #[default]
    Gemini,
    Claude,
    #[serde(rename = "openai")]
    OpenAi,
}

impl From<String> for Provider {
    fn from(name: String) -> Self {
        let Ok(provider) = name.parse::<Provider>();
        provider
    }
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    /// Unknown names select Gemini.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "claude" => Provider::Claude,
            "openai" => Provider::OpenAi,
            _ => Provider::Gemini,
        })
    }
}

/// Translation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub provider: Provider,

    /// Language the posts are translated into
    #[serde(default = "defaults::target_language")]
    pub target_language: String,

    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Gemini models tried in order when rate limited
    #[serde(default = "defaults::gemini_models")]
    pub gemini_models: Vec<String>,

    #[serde(default = "defaults::gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default)]
    pub claude_api_key: Option<String>,

    #[serde(default = "defaults::claude_model")]
    pub claude_model: String,

    #[serde(default = "defaults::claude_base_url")]
    pub claude_base_url: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "defaults::openai_model")]
    pub openai_model: String,

    #[serde(default = "defaults::openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    /// Gemini attempts before giving up on a rate-limited item
    #[serde(default = "defaults::max_retries")]
    pub max_retries: usize,

    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,

    #[serde(default = "defaults::translation_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: Provider::default(),
            target_language: defaults::target_language(),
            gemini_api_key: None,
            gemini_models: defaults::gemini_models(),
            gemini_base_url: defaults::gemini_base_url(),
            claude_api_key: None,
            claude_model: defaults::claude_model(),
            claude_base_url: defaults::claude_base_url(),
            openai_api_key: None,
            openai_model: defaults::openai_model(),
            openai_base_url: defaults::openai_base_url(),
            max_tokens: defaults::max_tokens(),
            temperature: defaults::temperature(),
            max_retries: defaults::max_retries(),
            rate_limit_backoff_secs: defaults::rate_limit_backoff(),
            timeout_secs: defaults::translation_timeout(),
        }
    }
}

/// Which site-specific adapter serves a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hinatazaka,
    Sakurazaka,
    Nogizaka,
    Bokuao,
}

/// One content source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Group name, also used as its directory name
    pub id: String,

    pub source: SourceKind,

    pub base_url: String,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Local hours during which the group is crawled (empty = always)
    #[serde(default)]
    pub active_hours: Vec<u32>,

    /// Session cookie sent with every request
    #[serde(default)]
    pub cookie: Option<String>,

    /// Records per request for offset-paginated APIs
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Shared column name to the members it rotates through
    #[serde(default)]
    pub cohorts: CohortMap,
}

impl GroupConfig {
    /// Whether the group should be crawled at this local hour.
    pub fn is_active_at(&self, local_hour: u32) -> bool {
        self.enabled && (self.active_hours.is_empty() || self.active_hours.contains(&local_hour))
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{GroupConfig, SourceKind};
    use crate::models::CohortMap;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn batch_size() -> usize {
        5
    }
    pub fn max_pages() -> usize {
        100
    }
    pub fn stop_after_empty_pages() -> usize {
        5
    }

    // Path defaults
    pub fn root() -> PathBuf {
        PathBuf::from(".")
    }
    pub fn record_dir() -> String {
        "record".into()
    }
    pub fn content_dir() -> String {
        "blogContent".into()
    }
    pub fn translated_dir() -> String {
        "blogContent_TC".into()
    }
    pub fn manifest_file() -> String {
        "BlogStatus.json".into()
    }
    pub fn blob_extension() -> String {
        "html".into()
    }

    // Schedule defaults
    pub fn polling_interval() -> u64 {
        900
    }
    pub fn utc_offset_hours() -> i32 {
        8
    }
    pub fn crawl_after_hour() -> u32 {
        8
    }

    // Translation defaults
    pub fn target_language() -> String {
        "Traditional Chinese (Taiwan style)".into()
    }
    pub fn gemini_models() -> Vec<String> {
        vec!["gemini-2.5-flash".to_string(), "gemini-2.0-flash".to_string()]
    }
    pub fn gemini_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".into()
    }
    pub fn claude_model() -> String {
        "claude-3-5-sonnet-20240620".into()
    }
    pub fn claude_base_url() -> String {
        "https://api.anthropic.com/v1".into()
    }
    pub fn openai_model() -> String {
        "gpt-4o".into()
    }
    pub fn openai_base_url() -> String {
        "https://api.openai.com/v1".into()
    }
    pub fn max_tokens() -> u32 {
        4096
    }
    pub fn temperature() -> f32 {
        0.7
    }
    pub fn max_retries() -> usize {
        3
    }
    pub fn rate_limit_backoff() -> u64 {
        10
    }
    pub fn translation_timeout() -> u64 {
        120
    }

    // Group defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn page_size() -> usize {
        1024
    }

    fn cohorts(entries: &[(&str, &[&str])]) -> CohortMap {
        entries
            .iter()
            .map(|(column, members)| {
                (
                    column.to_string(),
                    members.iter().map(|m| m.to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn default_groups() -> Vec<GroupConfig> {
        vec![
            GroupConfig {
                id: "Hinatazaka46".to_string(),
                source: SourceKind::Hinatazaka,
                base_url: "https://hinatazaka46.com".to_string(),
                enabled: true,
                active_hours: Vec::new(),
                cookie: None,
                page_size: page_size(),
                cohorts: cohorts(&[(
                    "五期生リレー",
                    &[
                        "大野愛実", "鶴崎仁香", "坂井新奈", "佐藤優羽", "下田衣珠季",
                        "片山紗希", "大田美月", "高井俐香", "松尾桜", "蔵盛妃那乃",
                    ],
                )]),
            },
            GroupConfig {
                id: "Sakurazaka46".to_string(),
                source: SourceKind::Sakurazaka,
                base_url: "https://sakurazaka46.com".to_string(),
                enabled: true,
                active_hours: Vec::new(),
                cookie: None,
                page_size: page_size(),
                cohorts: cohorts(&[(
                    "四期生リレー",
                    &[
                        "浅井恋乃未", "稲熊ひな", "勝又春", "佐藤愛桜", "中川智尋",
                        "松本和子", "目黒陽色", "山川宇衣", "山田桃実",
                    ],
                )]),
            },
            GroupConfig {
                id: "Nogizaka46".to_string(),
                source: SourceKind::Nogizaka,
                base_url: "https://nogizaka46.com".to_string(),
                enabled: true,
                active_hours: Vec::new(),
                cookie: None,
                page_size: page_size(),
                cohorts: cohorts(&[
                    (
                        "３期生",
                        &[
                            "伊藤理々杏", "岩本蓮加", "梅澤美波", "大園桃子", "久保史緒里",
                            "阪口珠美", "佐藤楓", "中村麗乃", "向井葉月", "山下美月",
                            "吉田綾乃クリスティー", "与田祐希",
                        ],
                    ),
                    (
                        "４期生",
                        &[
                            "遠藤さくら", "賀喜遥香", "掛橋沙耶香", "金川紗耶", "北川悠理",
                            "柴田柚菜", "清宮レイ", "田村真佑", "筒井あやめ", "早川聖来",
                            "矢久保美緒",
                        ],
                    ),
                    (
                        "新4期生",
                        &["黒見明香", "佐藤璃果", "林瑠奈", "松尾美佑", "弓木奈於"],
                    ),
                    (
                        "5期生",
                        &[
                            "五百城茉央", "池田瑛紗", "一ノ瀬美空", "井上和", "岡本姫奈",
                            "小川彩", "奥田いろは", "川﨑桜", "菅原咲月", "冨里奈央",
                            "中西アルノ",
                        ],
                    ),
                    (
                        "6期生",
                        &[
                            "愛宕心響", "大越ひなの", "小津玲奈", "海邉朱莉", "川端晃菜",
                            "鈴木佑捺", "瀬戸口心月", "長嶋凛桜", "増田三莉音", "森平麗心",
                            "矢田萌華",
                        ],
                    ),
                ]),
            },
            GroupConfig {
                id: "Bokuao".to_string(),
                source: SourceKind::Bokuao,
                base_url: "https://bokuao.com".to_string(),
                enabled: true,
                active_hours: vec![21],
                cookie: None,
                page_size: page_size(),
                cohorts: CohortMap::new(),
            },
        ]
    }
}
