//! The sequence-indexed observation ring.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use types::{ItemAddress, Observation, SequencedObservation};

use crate::checkpoint::Checkpoint;
use crate::error::{BufferError, BufferResult};
use crate::sequence::SequenceAllocator;

/// Retained window of the ring at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferBounds {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub count: usize,
}

/// A bounded slice of history plus the paging cursor that follows it.
#[derive(Debug, Clone)]
pub struct RangeSlice {
    pub observations: Vec<SequencedObservation>,
    /// First sequence after the slice — pass as the next `from`.
    pub next_sequence: u64,
    /// Bounds at the instant the slice was taken.
    pub bounds: BufferBounds,
}

struct BufferState {
    ring: VecDeque<SequencedObservation>,
    allocator: SequenceAllocator,
    /// State as of the eviction boundary (everything before `first_sequence`).
    first: Checkpoint,
    /// State as of `last_sequence`.
    latest: Checkpoint,
}

impl BufferState {
    fn first_sequence(&self) -> u64 {
        self.ring
            .front()
            .map(|record| record.sequence)
            .unwrap_or_else(|| self.allocator.next_sequence())
    }

    fn last_sequence(&self) -> u64 {
        self.allocator.next_sequence() - 1
    }

    fn bounds(&self) -> BufferBounds {
        BufferBounds {
            first_sequence: self.first_sequence(),
            last_sequence: self.last_sequence(),
            count: self.ring.len(),
        }
    }
}

/// Fixed-capacity, sequence-indexed observation history.
///
/// Inserts assign the next global sequence and evict the oldest entry once
/// the ring is full. Eviction removes an entry from the ring only — the
/// latest-value index and the first-checkpoint keep carrying its effects.
pub struct ObservationBuffer {
    capacity: usize,
    state: RwLock<BufferState>,
    last_sequence_tx: watch::Sender<u64>,
}

impl ObservationBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (last_sequence_tx, _) = watch::channel(0);
        Self {
            capacity,
            state: RwLock::new(BufferState {
                ring: VecDeque::with_capacity(capacity),
                allocator: SequenceAllocator::new(),
                first: Checkpoint::new(),
                latest: Checkpoint::new(),
            }),
            last_sequence_tx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert one observation, assigning its sequence number.
    ///
    /// The lock hold is O(1) amortized: sequence assignment, checkpoint
    /// fold, ring push and at most one eviction. The new last sequence is
    /// published on the watch channel before the lock is released so
    /// subscribers always observe monotonic values.
    pub fn insert(&self, observation: Observation) -> u64 {
        let mut state = self.state.write();
        let sequence = state.allocator.allocate();
        let record = SequencedObservation::new(sequence, Arc::new(observation));
        state.latest.apply(&record);
        state.ring.push_back(record);
        if state.ring.len() > self.capacity {
            let evicted = state
                .ring
                .pop_front()
                .expect("ring is non-empty past capacity");
            state.first.apply(&evicted);
        }
        self.last_sequence_tx.send_replace(sequence);
        sequence
    }

    pub fn bounds(&self) -> BufferBounds {
        self.state.read().bounds()
    }

    /// Subscribe to last-sequence changes. The receiver's current value is
    /// the last sequence at subscription time (0 before any insert).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.last_sequence_tx.subscribe()
    }

    /// Latest-state snapshot over addresses accepted by `filter`.
    pub fn latest<F>(&self, filter: F) -> Vec<SequencedObservation>
    where
        F: Fn(&ItemAddress) -> bool,
    {
        self.state.read().latest.snapshot(filter)
    }

    /// Latest-state snapshot as of a historical sequence.
    ///
    /// Reconstructs by cloning the first checkpoint and replaying ring
    /// entries up to and including `sequence`. Valid for sequences within
    /// the retained window.
    pub fn at<F>(&self, sequence: u64, filter: F) -> BufferResult<Vec<SequencedObservation>>
    where
        F: Fn(&ItemAddress) -> bool,
    {
        let state = self.state.read();
        let bounds = state.bounds();
        if bounds.count == 0 || sequence < bounds.first_sequence {
            return Err(BufferError::SequenceUnavailable {
                requested: sequence,
                first_sequence: bounds.first_sequence,
                last_sequence: bounds.last_sequence,
            });
        }
        if sequence > bounds.last_sequence {
            return Err(BufferError::SequenceNotAllocated {
                requested: sequence,
                first_sequence: bounds.first_sequence,
                last_sequence: bounds.last_sequence,
            });
        }
        if sequence == bounds.last_sequence {
            return Ok(state.latest.snapshot(filter));
        }
        let mut checkpoint = state.first.clone();
        for record in state
            .ring
            .iter()
            .take_while(|record| record.sequence <= sequence)
        {
            checkpoint.apply(record);
        }
        Ok(checkpoint.snapshot(filter))
    }

    /// Ordered history slice: observations with
    /// `from ≤ sequence < to`, at most `count` of them, clipped to the
    /// retained window.
    ///
    /// `from` defaults to `first_sequence` and may be `last_sequence + 1`
    /// (the empty delta a live tail polls for); anything below
    /// `first_sequence` is a [`BufferError::SequenceUnavailable`].
    pub fn range(
        &self,
        from: Option<u64>,
        to: Option<u64>,
        count: usize,
    ) -> BufferResult<RangeSlice> {
        let state = self.state.read();
        let bounds = state.bounds();
        let from = from.unwrap_or(bounds.first_sequence);
        if from < bounds.first_sequence {
            return Err(BufferError::SequenceUnavailable {
                requested: from,
                first_sequence: bounds.first_sequence,
                last_sequence: bounds.last_sequence,
            });
        }
        if let Some(to) = to {
            if to < from {
                return Err(BufferError::InvalidRange { from, to });
            }
        }

        // Sequences are dense, so the ring index is plain arithmetic.
        let start = (from - bounds.first_sequence) as usize;
        let mut observations = Vec::new();
        let mut next_sequence = from;
        for record in state.ring.iter().skip(start) {
            if to.is_some_and(|to| record.sequence >= to) {
                break;
            }
            if observations.len() >= count {
                break;
            }
            next_sequence = record.sequence + 1;
            observations.push(record.clone());
        }
        Ok(RangeSlice {
            observations,
            next_sequence,
            bounds,
        })
    }
}
