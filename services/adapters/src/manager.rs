//! The adapter manager: one task per configured adapter source.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use spindle_config::AdapterEntry;

use crate::error::Result;
use crate::sink::FrameSink;
use crate::source::{source_from_entry, AdapterSource};

/// Owns the lifecycle of every adapter source: spawning, cancellation and
/// join on shutdown. Each source gets a child token so one shutdown call
/// unblocks every pending accept, read and backoff sleep.
pub struct AdapterManager {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl AdapterManager {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    /// Spawn the sources an agent configuration calls for.
    pub async fn spawn_from_config<S: FrameSink>(
        &mut self,
        adapters: &[AdapterEntry],
        sink: Arc<S>,
        ignore_timestamps: bool,
    ) -> Result<()> {
        for entry in adapters {
            let source = source_from_entry(entry, Arc::clone(&sink), ignore_timestamps).await?;
            self.spawn(source);
        }
        Ok(())
    }

    /// Spawn one source on its own task.
    pub fn spawn(&mut self, source: Box<dyn AdapterSource>) {
        let label = source.describe();
        let cancel = self.cancel.child_token();
        info!(source = %label, "starting adapter source");
        self.handles.push(tokio::spawn(async move {
            if let Err(err) = source.run(cancel).await {
                error!(source = %label, error = %err, "adapter source terminated");
            }
        }));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every source and wait for their tasks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("adapter manager stopped");
    }
}
