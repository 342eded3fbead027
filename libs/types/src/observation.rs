//! Observation records and their addressing.
//!
//! An observation is one reported value (or value set) for one data item at
//! one instant. Observations are immutable once built; the buffer assigns
//! the sequence number at insertion and wraps the record in
//! [`SequencedObservation`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionLevel};

/// Distinguished scalar value marking a data item as unavailable.
pub const UNAVAILABLE: &str = "UNAVAILABLE";

/// Entry key under which scalar and time-series values are stored.
pub const VALUE_KEY: &str = "VALUE";

/// Reporting category of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Sample,
    Event,
    Condition,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Sample => "SAMPLE",
            Category::Event => "EVENT",
            Category::Condition => "CONDITION",
        };
        f.write_str(name)
    }
}

/// Fully-qualified address of a data item: device uuid plus item key.
///
/// The device catalog itself is external collaborator state; the core only
/// ever needs this opaque pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemAddress {
    pub device_uuid: String,
    pub key: String,
}

impl ItemAddress {
    pub fn new(device_uuid: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            device_uuid: device_uuid.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ItemAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_uuid, self.key)
    }
}

/// Closed set of observation shapes; the codec and buffer match on it
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationKind {
    Sample,
    Event,
    Message {
        native_code: String,
    },
    DataSet,
    Table,
    TimeSeries {
        count: u32,
        frequency: Option<f64>,
    },
    Condition(Condition),
}

impl ObservationKind {
    pub fn category(&self) -> Category {
        match self {
            ObservationKind::Sample | ObservationKind::TimeSeries { .. } => Category::Sample,
            ObservationKind::Event
            | ObservationKind::Message { .. }
            | ObservationKind::DataSet
            | ObservationKind::Table => Category::Event,
            ObservationKind::Condition(_) => Category::Condition,
        }
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, ObservationKind::Condition(_))
    }
}

/// One reported value set for one data item at one instant.
///
/// `values` is an ordered key/value collection: scalars store a single
/// [`VALUE_KEY`] entry, data sets one entry per set key, tables one entry
/// per row, time series the sample vector under [`VALUE_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub address: ItemAddress,
    pub kind: ObservationKind,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<(String, String)>,
}

impl Observation {
    pub fn new(
        address: ItemAddress,
        kind: ObservationKind,
        timestamp: DateTime<Utc>,
        values: Vec<(String, String)>,
    ) -> Self {
        Self {
            address,
            kind,
            timestamp,
            values,
        }
    }

    /// Scalar observation carrying a single value.
    pub fn scalar(
        address: ItemAddress,
        kind: ObservationKind,
        timestamp: DateTime<Utc>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            address,
            kind,
            timestamp,
            vec![(VALUE_KEY.to_string(), value.into())],
        )
    }

    /// Condition observation; the condition payload lives on the kind.
    pub fn condition(address: ItemAddress, timestamp: DateTime<Utc>, condition: Condition) -> Self {
        Self::new(
            address,
            ObservationKind::Condition(condition),
            timestamp,
            Vec::new(),
        )
    }

    /// Replacement observation marking a data item unavailable, preserving
    /// the category the item was last seen with.
    pub fn unavailable(address: ItemAddress, category: Category, timestamp: DateTime<Utc>) -> Self {
        match category {
            Category::Sample => {
                Self::scalar(address, ObservationKind::Sample, timestamp, UNAVAILABLE)
            }
            Category::Event => Self::scalar(address, ObservationKind::Event, timestamp, UNAVAILABLE),
            Category::Condition => Self::condition(
                address,
                timestamp,
                Condition::new(ConditionLevel::Unavailable),
            ),
        }
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// The scalar value, if this observation carries one.
    pub fn value(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == VALUE_KEY)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_unavailable(&self) -> bool {
        match &self.kind {
            ObservationKind::Condition(condition) => {
                condition.level == ConditionLevel::Unavailable
            }
            _ => self.value() == Some(UNAVAILABLE),
        }
    }
}

/// An observation after the buffer has assigned its sequence number.
///
/// The record itself is shared: the ring, the latest-value index and any
/// in-flight query snapshots all hold the same `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedObservation {
    pub sequence: u64,
    pub observation: Arc<Observation>,
}

impl SequencedObservation {
    pub fn new(sequence: u64, observation: Arc<Observation>) -> Self {
        Self {
            sequence,
            observation,
        }
    }

    pub fn address(&self) -> &ItemAddress {
        &self.observation.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ItemAddress {
        ItemAddress::new("dev-1", "temp")
    }

    #[test]
    fn kind_maps_onto_category() {
        assert_eq!(ObservationKind::Sample.category(), Category::Sample);
        assert_eq!(
            ObservationKind::TimeSeries {
                count: 4,
                frequency: Some(100.0)
            }
            .category(),
            Category::Sample
        );
        assert_eq!(ObservationKind::Event.category(), Category::Event);
        assert_eq!(ObservationKind::DataSet.category(), Category::Event);
        assert_eq!(
            ObservationKind::Condition(Condition::new(ConditionLevel::Fault)).category(),
            Category::Condition
        );
    }

    #[test]
    fn scalar_value_accessor() {
        let obs = Observation::scalar(address(), ObservationKind::Sample, Utc::now(), "21.5");
        assert_eq!(obs.value(), Some("21.5"));
        assert!(!obs.is_unavailable());
    }

    #[test]
    fn unavailable_preserves_category() {
        let now = Utc::now();
        let sample = Observation::unavailable(address(), Category::Sample, now);
        assert_eq!(sample.kind, ObservationKind::Sample);
        assert!(sample.is_unavailable());

        let condition = Observation::unavailable(address(), Category::Condition, now);
        match &condition.kind {
            ObservationKind::Condition(c) => assert_eq!(c.level, ConditionLevel::Unavailable),
            other => panic!("expected condition kind, got {other:?}"),
        }
        assert!(condition.is_unavailable());
    }
}
