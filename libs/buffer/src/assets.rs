//! Bounded, insertion-ordered asset store.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use types::Asset;

/// Filter for [`AssetBuffer::get`]. Empty/None fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AssetQuery {
    pub asset_ids: Vec<String>,
    pub asset_type: Option<String>,
    pub device_uuid: Option<String>,
    /// Exclude assets flagged removed. Removed assets stay queryable by
    /// default so callers can see that they were removed.
    pub exclude_removed: bool,
    pub count: Option<usize>,
}

impl AssetQuery {
    fn matches(&self, asset: &Asset) -> bool {
        if self.exclude_removed && asset.removed {
            return false;
        }
        if !self.asset_ids.is_empty() && !self.asset_ids.iter().any(|id| *id == asset.asset_id) {
            return false;
        }
        if self
            .asset_type
            .as_ref()
            .is_some_and(|t| *t != asset.asset_type)
        {
            return false;
        }
        if self
            .device_uuid
            .as_ref()
            .is_some_and(|d| *d != asset.device_uuid)
        {
            return false;
        }
        true
    }
}

/// Fixed-capacity asset collection keyed by asset id.
///
/// Upserts append (or move) the asset to the most-recent position; past
/// capacity the least-recently-inserted asset is evicted. Removal is
/// logical: the record survives with `removed` set until evicted.
pub struct AssetBuffer {
    capacity: usize,
    // Most recent at the back.
    state: RwLock<VecDeque<Arc<Asset>>>,
}

impl AssetBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.state.read().len()
    }

    /// Insert or supersede by asset id; returns the evicted asset, if the
    /// insert pushed one out.
    pub fn upsert(&self, asset: Asset) -> Option<Arc<Asset>> {
        let mut state = self.state.write();
        if let Some(position) = state.iter().position(|a| a.asset_id == asset.asset_id) {
            state.remove(position);
        }
        state.push_back(Arc::new(asset));
        if state.len() > self.capacity {
            return state.pop_front();
        }
        None
    }

    /// Logical removal: a fresh insertion of the asset with `removed`
    /// set, superseding its position. Returns false for unknown ids.
    pub fn mark_removed(&self, asset_id: &str, timestamp: DateTime<Utc>) -> bool {
        let mut state = self.state.write();
        let Some(position) = state.iter().position(|a| a.asset_id == asset_id) else {
            return false;
        };
        let prior = state.remove(position).expect("position is in bounds");
        state.push_back(Arc::new(Asset::clone(&prior).into_removed(timestamp)));
        true
    }

    /// Flag every matching asset removed, in place. Returns how many were
    /// flagged. Bulk removal is bookkeeping, not a touch, so insertion
    /// order is preserved.
    pub fn mark_all_removed(
        &self,
        asset_type: Option<&str>,
        device_uuid: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> usize {
        let mut state = self.state.write();
        let mut flagged = 0;
        for slot in state.iter_mut() {
            if slot.removed {
                continue;
            }
            if asset_type.is_some_and(|t| t != slot.asset_type) {
                continue;
            }
            if device_uuid.is_some_and(|d| d != slot.device_uuid) {
                continue;
            }
            *slot = Arc::new(Asset::clone(slot).into_removed(timestamp));
            flagged += 1;
        }
        flagged
    }

    /// Filtered listing, most recent first.
    pub fn get(&self, query: &AssetQuery) -> Vec<Arc<Asset>> {
        let state = self.state.read();
        state
            .iter()
            .rev()
            .filter(|asset| query.matches(asset))
            .take(query.count.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
