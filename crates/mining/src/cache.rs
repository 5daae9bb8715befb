//! In-process cache of mining reports backed by DashMap.
//!
//! Keyed on (snapshot, mining parameters). Each key owns a mutex-guarded
//! slot that stays locked while the report is computed, so concurrent
//! callers asking for the same key wait for one computation instead of
//! repeating it.

use crate::pipeline::{MiningParams, MiningPipeline, MiningReport};
use basket_core::{BasketError, BasketResult, RuleMetric, SnapshotId, TransactionStore};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    snapshot: SnapshotId,
    min_support_bits: u64,
    metric: RuleMetric,
    min_threshold_bits: u64,
    max_len: Option<usize>,
    max_candidates: Option<usize>,
    cancellation_marker: String,
}

impl CacheKey {
    pub fn new(snapshot: &SnapshotId, params: &MiningParams) -> Self {
        Self {
            snapshot: snapshot.clone(),
            min_support_bits: params.min_support.to_bits(),
            metric: params.metric,
            min_threshold_bits: params.min_threshold.to_bits(),
            max_len: params.max_len,
            max_candidates: params.max_candidates,
            cancellation_marker: params.cancellation_marker.clone(),
        }
    }

    pub fn snapshot(&self) -> &SnapshotId {
        &self.snapshot
    }
}

type Slot = Arc<Mutex<Option<Arc<MiningReport>>>>;

/// Bounded memo of mining reports.
pub struct RuleCache {
    slots: DashMap<CacheKey, Slot>,
    max_entries: usize,
}

impl RuleCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(max_entries),
            max_entries: max_entries.max(1),
        }
    }

    /// Cached report for `params` on `store`, mining it on first request.
    pub fn get_or_mine(
        &self,
        store: &TransactionStore,
        params: &MiningParams,
    ) -> BasketResult<Arc<MiningReport>> {
        let key = CacheKey::new(store.snapshot(), params);
        self.get_or_compute(key, || MiningPipeline::new(params.clone())?.run(store))
    }

    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> BasketResult<Arc<MiningReport>>
    where
        F: FnOnce() -> BasketResult<MiningReport>,
    {
        let mut compute = Some(compute);
        loop {
            let slot = self.slot(&key);
            let mut guard = slot.lock();
            if let Some(report) = guard.as_ref() {
                metrics::counter!("rule_cache.hit").increment(1);
                return Ok(report.clone());
            }
            // A failed computation removes its slot; waiters woken on it
            // start over on whatever slot the map now holds.
            if !self.holds(&key, &slot) {
                continue;
            }
            let Some(compute) = compute.take() else {
                return Err(BasketError::Internal(anyhow::anyhow!(
                    "rule cache computation requested twice"
                )));
            };
            metrics::counter!("rule_cache.miss").increment(1);

            return match compute() {
                Ok(report) => {
                    let report = Arc::new(report);
                    *guard = Some(report.clone());
                    drop(guard);
                    if self.slots.len() > self.max_entries {
                        // Waiters already hold the slot and still see the report.
                        self.slots.remove_if(&key, |_, s| Arc::ptr_eq(s, &slot));
                        metrics::counter!("rule_cache.bypass").increment(1);
                        debug!(entries = self.slots.len(), "Rule cache full, report not retained");
                    }
                    Ok(report)
                }
                Err(e) => {
                    // Unmapped before the lock is released so waiters see it as stale.
                    self.slots.remove_if(&key, |_, s| Arc::ptr_eq(s, &slot));
                    drop(guard);
                    Err(e)
                }
            };
        }
    }

    /// Slot for `key`, inserting an empty one when absent. A full cache
    /// first drops entries of other snapshots; the new slot is admitted
    /// regardless so that same-key callers still wait on one computation.
    fn slot(&self, key: &CacheKey) -> Slot {
        // Clone the slot out before touching the map again; holding a
        // DashMap guard across `entry` on the same shard deadlocks.
        if let Some(slot) = self.slots.get(key).map(|s| s.value().clone()) {
            return slot;
        }
        if self.slots.len() >= self.max_entries {
            self.slots.retain(|k, _| k.snapshot == key.snapshot);
        }
        self.slots.entry(key.clone()).or_default().value().clone()
    }

    fn holds(&self, key: &CacheKey, slot: &Slot) -> bool {
        self.slots
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    /// Drop every entry not computed from `current`. Returns the number removed.
    pub fn invalidate_except(&self, current: &SnapshotId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|k, _| &k.snapshot == current);
        let removed = before - self.slots.len();
        if removed > 0 {
            debug!(removed = removed, snapshot = current.short(), "Rule cache invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(32)
    }
}
