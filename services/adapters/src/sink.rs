//! The seam between adapter sessions and the agent's buffers.

use chrono::{DateTime, Utc};
use types::{Asset, DeviceFrame, Observation};

/// Destination for records an adapter session produced.
///
/// The broker implements this over its buffers; tests swap in recording
/// fakes. Calls are synchronous — buffer inserts are short lock holds, and
/// keeping the seam sync keeps parsing and sequencing on the session task
/// with no channel hop in between.
pub trait FrameSink: Send + Sync + 'static {
    /// Sequence and store one observation; returns the assigned sequence.
    fn ingest_observation(&self, observation: Observation) -> u64;

    /// Insert or supersede an asset.
    fn upsert_asset(&self, asset: Asset);

    /// Flag one asset removed. Unknown ids are ignored.
    fn remove_asset(&self, asset_id: &str, timestamp: DateTime<Utc>);

    /// Flag all assets removed, optionally scoped by type and device.
    fn remove_all_assets(
        &self,
        asset_type: Option<&str>,
        device_uuid: Option<&str>,
        timestamp: DateTime<Utc>,
    );

    /// Route a device metadata frame to catalog state.
    fn ingest_device(&self, frame: DeviceFrame);
}
