// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod item;
pub mod manifest;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, GroupConfig, PathsConfig, Provider, ScheduleConfig, SourceKind,
    TranslationConfig,
};
pub use item::{Item, ItemDetail, ItemMap, ItemStub, Locator, normalize_author};
pub use manifest::{CohortMap, MemberRecord};
