//! The query engine: current / sample / stream over the buffers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use buffer::{AssetBuffer, AssetQuery, BufferBounds, ObservationBuffer};

use crate::document::{
    AssetDocument, DeviceDocument, DocumentHeader, SampleDocument, SnapshotDocument, StreamChunk,
};
use crate::error::QueryError;
use crate::filter::PathFilter;
use crate::registry::DeviceRegistry;

/// Sample size when the caller does not ask for one.
const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Settings for one stream subscription.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// First sequence to deliver; defaults to the live tail
    /// (`last_sequence + 1`).
    pub from: Option<u64>,
    /// Minimum pacing between data deliveries; zero streams as fast as
    /// data arrives.
    pub interval: Duration,
    /// Quiet-spell bound: with no new data for this long, a heartbeat
    /// chunk is delivered instead.
    pub heartbeat: Duration,
    /// Most observations per data chunk.
    pub count: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            from: None,
            interval: Duration::ZERO,
            heartbeat: Duration::from_secs(10),
            count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

/// Read-only view over the buffers that answers the three query shapes.
/// Cheap to clone; every clone reads the same buffers.
#[derive(Clone)]
pub struct QueryEngine {
    observations: Arc<ObservationBuffer>,
    assets: Arc<AssetBuffer>,
    devices: Arc<DeviceRegistry>,
    instance_id: u64,
    creation_time: DateTime<Utc>,
    max_sample_count: usize,
}

impl QueryEngine {
    pub fn new(
        observations: Arc<ObservationBuffer>,
        assets: Arc<AssetBuffer>,
        devices: Arc<DeviceRegistry>,
        instance_id: u64,
        creation_time: DateTime<Utc>,
        max_sample_count: usize,
    ) -> Self {
        Self {
            observations,
            assets,
            devices,
            instance_id,
            creation_time,
            max_sample_count,
        }
    }

    fn header(&self, bounds: BufferBounds, next_sequence: u64) -> DocumentHeader {
        DocumentHeader {
            instance_id: self.instance_id,
            buffer_size: self.observations.capacity(),
            first_sequence: bounds.first_sequence,
            last_sequence: bounds.last_sequence,
            next_sequence,
            creation_time: self.creation_time,
        }
    }

    /// Latest-state snapshot, or state as of a historical sequence when
    /// `at` is given. An `at` outside the retained window fails with
    /// [`QueryError::SequenceOutOfRange`].
    pub fn current(
        &self,
        filter: &PathFilter,
        at: Option<u64>,
    ) -> Result<SnapshotDocument, QueryError> {
        let observations = match at {
            None => self.observations.latest(|address| filter.matches(address)),
            Some(sequence) => self
                .observations
                .at(sequence, |address| filter.matches(address))?,
        };
        let bounds = self.observations.bounds();
        Ok(SnapshotDocument {
            header: self.header(bounds, bounds.last_sequence + 1),
            observations,
        })
    }

    /// Bounded history slice. `from` defaults to `first_sequence`; the
    /// header's `next_sequence` is the paging cursor. `count` bounds the
    /// scanned sequence window, so paging stays gap-free under a filter.
    pub fn sample(
        &self,
        filter: &PathFilter,
        from: Option<u64>,
        to: Option<u64>,
        count: Option<usize>,
    ) -> Result<SampleDocument, QueryError> {
        let count = count.unwrap_or_else(|| DEFAULT_SAMPLE_COUNT.min(self.max_sample_count));
        if count > self.max_sample_count {
            return Err(QueryError::CountTooLarge {
                requested: count,
                max: self.max_sample_count,
            });
        }
        let slice = self.observations.range(from, to, count)?;
        let observations = slice
            .observations
            .into_iter()
            .filter(|record| filter.matches(record.address()))
            .collect();
        Ok(SampleDocument {
            header: self.header(slice.bounds, slice.next_sequence),
            observations,
        })
    }

    /// Filtered asset listing, most recent first.
    pub fn assets(&self, query: &AssetQuery) -> AssetDocument {
        let assets = self.assets.get(query);
        let bounds = self.observations.bounds();
        AssetDocument {
            header: self.header(bounds, bounds.last_sequence + 1),
            assets,
        }
    }

    /// Device catalog contents (`probe`).
    pub fn devices(&self) -> DeviceDocument {
        let devices = self.devices.list();
        let bounds = self.observations.bounds();
        DeviceDocument {
            header: self.header(bounds, bounds.last_sequence + 1),
            devices,
        }
    }

    /// Open a live-tail subscription. A `from` preceding the retained
    /// window is rejected up front.
    pub fn stream(
        &self,
        filter: PathFilter,
        options: StreamOptions,
        cancel: CancellationToken,
    ) -> Result<StreamSession, QueryError> {
        if options.count > self.max_sample_count {
            return Err(QueryError::CountTooLarge {
                requested: options.count,
                max: self.max_sample_count,
            });
        }
        let bounds = self.observations.bounds();
        let next_sequence = options.from.unwrap_or(bounds.last_sequence + 1);
        if next_sequence < bounds.first_sequence {
            return Err(QueryError::SequenceOutOfRange {
                requested: next_sequence,
                first_sequence: bounds.first_sequence,
                last_sequence: bounds.last_sequence,
            });
        }
        let sequence_rx = self.observations.subscribe();
        Ok(StreamSession {
            engine: self.clone(),
            filter,
            options,
            cancel,
            sequence_rx,
            next_sequence,
            last_delivery: None,
        })
    }
}

/// One live-tail subscription.
///
/// Each [`next_chunk`](Self::next_chunk) call delivers the next sequence
/// delta, or a heartbeat after a quiet spell. Deliveries follow sequence
/// order across devices — never per-device order — with no duplicates and
/// no gaps. Dropping the session releases its subscription; cancelling
/// its token unblocks a pending call within one heartbeat interval.
pub struct StreamSession {
    engine: QueryEngine,
    filter: PathFilter,
    options: StreamOptions,
    cancel: CancellationToken,
    sequence_rx: watch::Receiver<u64>,
    next_sequence: u64,
    last_delivery: Option<Instant>,
}

impl StreamSession {
    /// The sequence the next data chunk will start at.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Wait for the next delivery. Returns [`QueryError::Cancelled`] once
    /// the session's token fires, and [`QueryError::SequenceOutOfRange`]
    /// if the subscription fell behind the retained window.
    pub async fn next_chunk(&mut self) -> Result<StreamChunk, QueryError> {
        loop {
            let slice = self.engine.observations.range(
                Some(self.next_sequence),
                None,
                self.options.count,
            )?;
            if !slice.observations.is_empty() {
                // Advance past everything scanned, delivered or filtered
                // out, so the delta never re-scans.
                self.next_sequence = slice.next_sequence;
                let observations: Vec<_> = slice
                    .observations
                    .into_iter()
                    .filter(|record| self.filter.matches(record.address()))
                    .collect();
                if observations.is_empty() {
                    continue;
                }
                self.pace().await?;
                let header = self.engine.header(slice.bounds, self.next_sequence);
                return Ok(StreamChunk::Data(SampleDocument {
                    header,
                    observations,
                }));
            }

            // Nothing new: suspend until data arrives or the heartbeat
            // interval elapses.
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                changed = tokio::time::timeout(
                    self.options.heartbeat,
                    self.sequence_rx.changed(),
                ) => match changed {
                    Err(_elapsed) => {
                        debug!(last_sequence = slice.bounds.last_sequence, "stream heartbeat");
                        return Ok(StreamChunk::Heartbeat {
                            last_sequence: slice.bounds.last_sequence,
                        });
                    }
                    Ok(Ok(())) => continue,
                    // The buffer was dropped; nothing more will arrive.
                    Ok(Err(_)) => return Err(QueryError::Cancelled),
                },
            }
        }
    }

    /// Enforce the minimum delivery interval, staying cancellable.
    async fn pace(&mut self) -> Result<(), QueryError> {
        if !self.options.interval.is_zero() {
            if let Some(last) = self.last_delivery {
                let elapsed = last.elapsed();
                if elapsed < self.options.interval {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                        _ = tokio::time::sleep(self.options.interval - elapsed) => {}
                    }
                }
            }
        }
        self.last_delivery = Some(Instant::now());
        Ok(())
    }
}
