//! The agent broker: explicit owner of the buffers and the wiring between
//! adapters and queries.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use adapter_service::{AdapterManager, FrameSink};
use buffer::{AssetBuffer, ObservationBuffer};
use spindle_config::AgentConfig;
use types::{Asset, DeviceFrame, Observation};

use crate::query::QueryEngine;
use crate::registry::DeviceRegistry;

/// Owns every shared component of one agent instance and implements the
/// [`FrameSink`] seam adapter sessions feed.
///
/// There are no ambient globals: the broker is constructed explicitly and
/// handed (as an `Arc`) to whoever needs ingest or query access.
pub struct AgentBroker {
    config: AgentConfig,
    observations: Arc<ObservationBuffer>,
    assets: Arc<AssetBuffer>,
    devices: Arc<DeviceRegistry>,
    instance_id: u64,
    creation_time: DateTime<Utc>,
    cancel: CancellationToken,
}

impl AgentBroker {
    /// Build a broker from a validated configuration.
    pub fn new(config: AgentConfig) -> Arc<Self> {
        let instance_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        info!(
            instance_id,
            buffer_size = config.buffer_size,
            asset_buffer_size = config.asset_buffer_size,
            "creating agent broker"
        );
        Arc::new(Self {
            observations: Arc::new(ObservationBuffer::new(config.buffer_size)),
            assets: Arc::new(AssetBuffer::new(config.asset_buffer_size)),
            devices: Arc::new(DeviceRegistry::new()),
            instance_id,
            creation_time: Utc::now(),
            cancel: CancellationToken::new(),
            config,
        })
    }

    /// Identifies this run of the agent; a new value tells clients the
    /// sequence counter reset.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn observations(&self) -> &Arc<ObservationBuffer> {
        &self.observations
    }

    pub fn assets(&self) -> &Arc<AssetBuffer> {
        &self.assets
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    /// Token cancelled on [`shutdown`](Self::shutdown); streams and
    /// adapter sources derive theirs from it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A query engine reading this broker's buffers.
    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(
            Arc::clone(&self.observations),
            Arc::clone(&self.assets),
            Arc::clone(&self.devices),
            self.instance_id,
            self.creation_time,
            self.config.max_sample_count,
        )
    }

    /// Programmatic insert — the same path adapter sessions use.
    pub fn ingest(&self, observation: Observation) -> u64 {
        self.observations.insert(observation)
    }

    /// Spawn the configured adapter sources.
    pub async fn start_adapters(self: &Arc<Self>) -> adapter_service::Result<AdapterManager> {
        let mut manager = AdapterManager::new(self.cancel.child_token());
        manager
            .spawn_from_config(
                &self.config.adapters,
                Arc::clone(self),
                self.config.ignore_adapter_timestamps,
            )
            .await?;
        info!(adapters = manager.len(), "adapter sources started");
        Ok(manager)
    }

    /// Cancel everything derived from this broker.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl FrameSink for AgentBroker {
    fn ingest_observation(&self, observation: Observation) -> u64 {
        self.observations.insert(observation)
    }

    fn upsert_asset(&self, asset: Asset) {
        if let Some(evicted) = self.assets.upsert(asset) {
            debug!(asset_id = %evicted.asset_id, "asset evicted");
        }
    }

    fn remove_asset(&self, asset_id: &str, timestamp: DateTime<Utc>) {
        if !self.assets.mark_removed(asset_id, timestamp) {
            debug!(asset_id, "removal for unknown asset ignored");
        }
    }

    fn remove_all_assets(
        &self,
        asset_type: Option<&str>,
        device_uuid: Option<&str>,
        timestamp: DateTime<Utc>,
    ) {
        let flagged = self.assets.mark_all_removed(asset_type, device_uuid, timestamp);
        debug!(flagged, "bulk asset removal");
    }

    fn ingest_device(&self, frame: DeviceFrame) {
        self.devices.apply(frame);
    }
}

#[cfg(test)]
mod tests {
    use buffer::AssetQuery;
    use types::{ItemAddress, ObservationKind};

    use crate::filter::PathFilter;

    use super::*;

    #[test]
    fn ingest_and_query_through_the_broker() {
        let broker = AgentBroker::new(AgentConfig::default());
        let engine = broker.query_engine();

        let sequence = broker.ingest(Observation::scalar(
            ItemAddress::new("mill-3", "temp"),
            ObservationKind::Sample,
            Utc::now(),
            "21.5",
        ));
        assert_eq!(sequence, 1);

        let current = engine.current(&PathFilter::all(), None).unwrap();
        assert_eq!(current.header.instance_id, broker.instance_id());
        assert_eq!(current.observations.len(), 1);
    }

    #[test]
    fn sink_routes_assets_and_devices() {
        let broker = AgentBroker::new(AgentConfig::default());
        let now = Utc::now();

        broker.upsert_asset(Asset::new("T1", "mill-3", "CuttingTool", now, "<tool/>"));
        broker.remove_asset("T1", now);
        broker.ingest_device(DeviceFrame::new(
            "mill-3",
            now,
            vec![("name".to_string(), "Mill".to_string())],
        ));

        let engine = broker.query_engine();
        let assets = engine.assets(&AssetQuery::default());
        assert_eq!(assets.assets.len(), 1);
        assert!(assets.assets[0].removed);

        let devices = engine.devices();
        assert_eq!(devices.devices.len(), 1);
        assert_eq!(devices.devices[0].device_uuid, "mill-3");
    }
}
