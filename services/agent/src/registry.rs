//! Minimal device registry.
//!
//! The full device/component/data-item catalog is an external
//! collaborator; the core stores only the opaque metadata entries
//! adapters reported, keyed by device uuid, so `probe` has something to
//! answer with.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use types::DeviceFrame;

/// Merged metadata for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub device_uuid: String,
    pub entries: Vec<(String, String)>,
    pub last_updated: DateTime<Utc>,
}

/// Concurrent uuid → record map fed by adapter device frames.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one device frame: matching keys are replaced, new keys
    /// appended in arrival order.
    pub fn apply(&self, frame: DeviceFrame) {
        let mut record = self
            .devices
            .entry(frame.device_uuid.clone())
            .or_insert_with(|| DeviceRecord {
                device_uuid: frame.device_uuid.clone(),
                entries: Vec::new(),
                last_updated: frame.timestamp,
            });
        for (key, value) in frame.entries {
            match record.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => record.entries.push((key, value)),
            }
        }
        record.last_updated = frame.timestamp;
    }

    pub fn get(&self, device_uuid: &str) -> Option<DeviceRecord> {
        self.devices.get(device_uuid).map(|r| r.value().clone())
    }

    /// All known devices, ordered by uuid.
    pub fn list(&self) -> Vec<DeviceRecord> {
        let mut devices: Vec<_> = self.devices.iter().map(|r| r.value().clone()).collect();
        devices.sort_by(|a, b| a.device_uuid.cmp(&b.device_uuid));
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_entries_per_device() {
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        registry.apply(DeviceFrame::new(
            "mill-3",
            t0,
            vec![("name".to_string(), "Mill".to_string())],
        ));
        registry.apply(DeviceFrame::new(
            "mill-3",
            t0,
            vec![
                ("name".to_string(), "Mill-3".to_string()),
                ("manufacturer".to_string(), "Acme".to_string()),
            ],
        ));

        let record = registry.get("mill-3").unwrap();
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[0], ("name".to_string(), "Mill-3".to_string()));
    }

    #[test]
    fn lists_devices_sorted() {
        let registry = DeviceRegistry::new();
        registry.apply(DeviceFrame::new("b", Utc::now(), vec![]));
        registry.apply(DeviceFrame::new("a", Utc::now(), vec![]));
        let uuids: Vec<_> = registry.list().into_iter().map(|d| d.device_uuid).collect();
        assert_eq!(uuids, vec!["a", "b"]);
    }
}
