//! Latest-value and active-condition state at a point in the sequence.
//!
//! A checkpoint is a fold over sequenced observations. The buffer keeps
//! two: *latest* (fed by every insert — answers `current`) and *first*
//! (state as of the eviction boundary, fed by evictions — the base for
//! historical `current?at=` reconstruction). Because the "latest" fold is
//! independent of the ring, latest values survive eviction of their
//! originating entries.

use std::collections::HashMap;

use types::{ItemAddress, ObservationKind, SequencedObservation};

/// Accumulated per-key state: most recent observation per address, plus
/// the set of active non-normal condition instances per condition address.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    latest: HashMap<ItemAddress, SequencedObservation>,
    conditions: HashMap<ItemAddress, Vec<SequencedObservation>>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the checkpoint.
    ///
    /// Condition rule: NORMAL (and UNAVAILABLE) clears the address's whole
    /// active set; a non-normal instance replaces the active instance with
    /// the same native code and is otherwise added. An instance is
    /// identified only within its data item's scope.
    pub fn apply(&mut self, record: &SequencedObservation) {
        let address = record.address().clone();
        if let ObservationKind::Condition(condition) = &record.observation.kind {
            let active = self.conditions.entry(address.clone()).or_default();
            if condition.level.clears_active_set() {
                active.clear();
            } else if let Some(existing) = active.iter_mut().find(|entry| {
                matches!(
                    &entry.observation.kind,
                    ObservationKind::Condition(prior) if prior.native_code == condition.native_code
                )
            }) {
                *existing = record.clone();
            } else {
                active.push(record.clone());
            }
        }
        self.latest.insert(address, record.clone());
    }

    /// Most recent observation for one address.
    pub fn latest(&self, address: &ItemAddress) -> Option<&SequencedObservation> {
        self.latest.get(address)
    }

    /// Active non-normal condition instances for one address.
    pub fn active_conditions(&self, address: &ItemAddress) -> &[SequencedObservation] {
        self.conditions
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Snapshot the checkpoint as a sequence-ordered observation list.
    ///
    /// Condition addresses contribute their full active set, or their
    /// latest (normal/unavailable) observation when the set is empty;
    /// every other address contributes its latest observation.
    pub fn snapshot<F>(&self, filter: F) -> Vec<SequencedObservation>
    where
        F: Fn(&ItemAddress) -> bool,
    {
        let mut out = Vec::with_capacity(self.latest.len());
        for (address, latest) in &self.latest {
            if !filter(address) {
                continue;
            }
            if latest.observation.kind.is_condition() {
                match self.conditions.get(address).filter(|set| !set.is_empty()) {
                    Some(active) => out.extend(active.iter().cloned()),
                    None => out.push(latest.clone()),
                }
            } else {
                out.push(latest.clone());
            }
        }
        out.sort_by_key(|record| record.sequence);
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use types::{Condition, ConditionLevel, Observation};

    use super::*;

    fn address() -> ItemAddress {
        ItemAddress::new("dev-1", "system")
    }

    fn condition(sequence: u64, level: ConditionLevel, code: &str, message: &str) -> SequencedObservation {
        SequencedObservation::new(
            sequence,
            Arc::new(Observation::condition(
                address(),
                Utc::now(),
                Condition {
                    level,
                    native_code: code.to_string(),
                    native_severity: String::new(),
                    qualifier: String::new(),
                    message: message.to_string(),
                },
            )),
        )
    }

    #[test]
    fn normal_clears_the_active_set() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.apply(&condition(1, ConditionLevel::Fault, "A", ""));
        checkpoint.apply(&condition(2, ConditionLevel::Fault, "B", ""));
        assert_eq!(checkpoint.active_conditions(&address()).len(), 2);

        checkpoint.apply(&condition(3, ConditionLevel::Normal, "", ""));
        assert!(checkpoint.active_conditions(&address()).is_empty());

        // The snapshot still reports the NORMAL as the key's state.
        let snapshot = checkpoint.snapshot(|_| true);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sequence, 3);
    }

    #[test]
    fn same_native_code_replaces_in_place() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.apply(&condition(1, ConditionLevel::Fault, "A", "first"));
        checkpoint.apply(&condition(2, ConditionLevel::Fault, "B", ""));
        checkpoint.apply(&condition(3, ConditionLevel::Fault, "A", "updated"));

        let active = checkpoint.active_conditions(&address());
        assert_eq!(active.len(), 2);
        let a = active
            .iter()
            .find_map(|record| match &record.observation.kind {
                ObservationKind::Condition(c) if c.native_code == "A" => Some(c),
                _ => None,
            })
            .expect("A still active");
        assert_eq!(a.message, "updated");
    }

    #[test]
    fn unavailable_clears_like_normal_but_is_the_state() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.apply(&condition(1, ConditionLevel::Fault, "A", ""));
        checkpoint.apply(&condition(2, ConditionLevel::Unavailable, "", ""));
        assert!(checkpoint.active_conditions(&address()).is_empty());
        let snapshot = checkpoint.snapshot(|_| true);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sequence, 2);
    }

    #[test]
    fn condition_scope_is_per_data_item() {
        let other = ItemAddress::new("dev-1", "hydraulic");
        let mut checkpoint = Checkpoint::new();
        checkpoint.apply(&condition(1, ConditionLevel::Fault, "A", ""));
        checkpoint.apply(&SequencedObservation::new(
            2,
            Arc::new(Observation::condition(
                other.clone(),
                Utc::now(),
                Condition::new(ConditionLevel::Normal),
            )),
        ));
        assert_eq!(checkpoint.active_conditions(&address()).len(), 1);
        assert!(checkpoint.active_conditions(&other).is_empty());
    }
}
