//! Per-group mutual exclusion.
//!
//! A crawl run and a translation pass over the same group each hold the
//! group's lock for their whole duration, so overlapping schedules cannot
//! interleave writes to one group's files.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of one async mutex per group id.
#[derive(Debug, Default)]
pub struct GroupLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a group, created on first use.
    pub fn get(&self, group_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(group_id.to_string()).or_default())
    }
}
