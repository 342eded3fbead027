//! Device metadata frames.
//!
//! Device records flow through the same ingestion path as observations but
//! are routed to catalog state, never into the observation buffer. The
//! catalog proper is an external collaborator; the core keeps only the
//! opaque entries an adapter reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One device metadata update as reported by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFrame {
    pub device_uuid: String,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<(String, String)>,
}

impl DeviceFrame {
    pub fn new(
        device_uuid: impl Into<String>,
        timestamp: DateTime<Utc>,
        entries: Vec<(String, String)>,
    ) -> Self {
        Self {
            device_uuid: device_uuid.into(),
            timestamp,
            entries,
        }
    }
}
