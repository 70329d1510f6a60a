use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::{AttemptStore, StoreError, StoreKind, Window};
use crate::limiter::{
    action::ActionKind,
    rules::{Rule, Rules},
};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    window_start: Instant,
}

/// In-process attempt counter.
///
/// `DashMap::entry` holds the shard write lock for the whole read-check-increment
/// sequence, which makes `record` atomic per key without a global lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(ActionKind, String), Entry>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn hit(&self, action: ActionKind, client_id: &str, rule: Rule) -> Window {
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry((action, client_id.to_string()))
            .or_insert(Entry {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(entry.window_start);

        // fresh key or expired window
        if entry.count == 0 || elapsed >= rule.window() {
            entry.count = 1;
            entry.window_start = now;
            return Window {
                admitted: true,
                count: 1,
                reset_after: rule.window(),
            };
        }

        let reset_after = rule.window().saturating_sub(elapsed);

        if entry.count < rule.limit() {
            entry.count += 1;
            return Window {
                admitted: true,
                count: entry.count,
                reset_after,
            };
        }

        Window {
            admitted: false,
            count: entry.count,
            reset_after,
        }
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn record(
        &self,
        action: ActionKind,
        client_id: &str,
        rule: Rule,
    ) -> Result<Window, StoreError> {
        Ok(self.hit(action, client_id, rule))
    }

    async fn evict(&self, rules: &Rules, grace: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let before = self.entries.len();

        self.entries.retain(|(action, _), entry| {
            let horizon = rules.get(*action).window().saturating_add(grace);
            now.saturating_duration_since(entry.window_start) < horizon
        });

        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}
