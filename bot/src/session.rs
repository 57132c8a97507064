use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Pending {
    plan_id: i64,
    selected_at: Instant,
}

/// Pending plan selections keyed by (bot id, user id).
///
/// A new selection overwrites the previous one. Entries older than the TTL
/// count as abandoned. They are dropped on the next read of the same key and
/// swept from the whole map whenever a new selection is made.
pub struct SessionStore {
    pending: DashMap<(i64, u64), Pending>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    pub fn select(&self, bot_id: i64, user_id: u64, plan_id: i64) {
        self.pending
            .retain(|_, pending| pending.selected_at.elapsed() < self.ttl);
        self.pending.insert(
            (bot_id, user_id),
            Pending {
                plan_id,
                selected_at: Instant::now(),
            },
        );
    }

    pub fn pending_plan(&self, bot_id: i64, user_id: u64) -> Option<i64> {
        let key = (bot_id, user_id);
        let plan_id = {
            let entry = self.pending.get(&key)?;
            (entry.selected_at.elapsed() < self.ttl).then_some(entry.plan_id)
        };
        if plan_id.is_none() {
            log::debug!("Selection of user {} expired", user_id);
            self.pending.remove(&key);
        }
        plan_id
    }

    pub fn clear(&self, bot_id: i64, user_id: u64) {
        self.pending.remove(&(bot_id, user_id));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
