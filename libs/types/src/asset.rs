//! Asset documents: self-contained payloads keyed by asset id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A self-contained asset document (tool definition, file reference, ...).
///
/// Assets are never versioned in place — an update is a new insertion with
/// the same `asset_id` that supersedes the prior entry's position, and
/// removal is a new insertion with `removed` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    pub device_uuid: String,
    pub asset_type: String,
    pub timestamp: DateTime<Utc>,
    pub removed: bool,
    pub body: String,
}

impl Asset {
    pub fn new(
        asset_id: impl Into<String>,
        device_uuid: impl Into<String>,
        asset_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            device_uuid: device_uuid.into(),
            asset_type: asset_type.into(),
            timestamp,
            removed: false,
            body: body.into(),
        }
    }

    /// The same asset flagged removed at `timestamp`.
    pub fn into_removed(mut self, timestamp: DateTime<Utc>) -> Self {
        self.removed = true;
        self.timestamp = timestamp;
        self
    }
}
