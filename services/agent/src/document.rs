//! Renderer-facing document models.
//!
//! These are the in-memory results the query engine hands to the external
//! rendering collaborator. They carry everything a response document
//! needs: the instance/window header plus the observation, asset or
//! device listings. Serialization to an actual wire format happens
//! outside this crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use types::{Asset, SequencedObservation};

use crate::registry::DeviceRecord;

/// Header common to every response document.
///
/// `instance_id` changes only on process restart and signals clients that
/// sequence numbers reset. For sample documents `next_sequence` is the
/// paging cursor (first sequence after the returned slice); elsewhere it
/// is `last_sequence + 1`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHeader {
    pub instance_id: u64,
    pub buffer_size: usize,
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub next_sequence: u64,
    pub creation_time: DateTime<Utc>,
}

/// `current` result: latest state per data item.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDocument {
    pub header: DocumentHeader,
    pub observations: Vec<SequencedObservation>,
}

/// `sample` result: a bounded, sequence-ordered history slice.
#[derive(Debug, Clone, Serialize)]
pub struct SampleDocument {
    pub header: DocumentHeader,
    pub observations: Vec<SequencedObservation>,
}

/// Asset listing, most recent first.
#[derive(Debug, Clone, Serialize)]
pub struct AssetDocument {
    pub header: DocumentHeader,
    pub assets: Vec<Arc<Asset>>,
}

/// `probe` result: the device registry contents.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDocument {
    pub header: DocumentHeader,
    pub devices: Vec<DeviceRecord>,
}

/// One delivery on a stream subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "chunk", rename_all = "snake_case")]
pub enum StreamChunk {
    /// New observations past the last delivered sequence.
    Data(SampleDocument),
    /// Nothing new within the heartbeat interval; proves liveness.
    Heartbeat { last_sequence: u64 },
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use types::{ItemAddress, Observation, ObservationKind, SequencedObservation};

    use super::*;

    #[test]
    fn documents_serialize_for_the_renderer() {
        let header = DocumentHeader {
            instance_id: 42,
            buffer_size: 1024,
            first_sequence: 1,
            last_sequence: 1,
            next_sequence: 2,
            creation_time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        let record = SequencedObservation::new(
            1,
            Arc::new(Observation::scalar(
                ItemAddress::new("mill-3", "temp"),
                ObservationKind::Sample,
                header.creation_time,
                "21.5",
            )),
        );
        let doc = SnapshotDocument {
            header,
            observations: vec![record],
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["header"]["instance_id"], 42);
        assert_eq!(json["observations"][0]["sequence"], 1);
        assert_eq!(
            json["observations"][0]["observation"]["kind"]["shape"],
            "SAMPLE"
        );
    }
}
