//! Pipeline entry points.
//!
//! - `CrawlOrchestrator`: incremental sweep of one group
//! - `TranslationForwarder`: translation pass over captured content
//! - `Scheduler`: chooses between the two on each polling cycle

pub mod crawl;
pub mod schedule;
pub mod translate;

pub use crawl::{CrawlOrchestrator, CrawlReport};
pub use schedule::{CycleMode, CycleReport, Scheduler};
pub use translate::{TranslationForwarder, TranslationReport};
