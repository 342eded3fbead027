//! Shared harness for Spindle end-to-end tests: a real broker with real
//! TCP listen sources, driven by fake adapters over loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::net::TcpStream;

use adapter_service::{AdapterManager, ListenSource, SessionConfig};
use agent_service::AgentBroker;
use spindle_config::AgentConfig;

/// A running agent with one or more loopback listen sources.
pub struct TestAgent {
    pub broker: Arc<AgentBroker>,
    pub manager: AdapterManager,
    /// One bound address per spawned listen source, in spawn order.
    pub addrs: Vec<SocketAddr>,
}

impl TestAgent {
    /// Start a broker with `devices.len()` listen sources, one per device
    /// uuid (`None` = wildcard adapter), all on ephemeral loopback ports.
    pub async fn start(buffer_size: usize, devices: &[Option<&str>]) -> Result<Self> {
        let config = AgentConfig {
            buffer_size,
            ..AgentConfig::default()
        };
        let broker = AgentBroker::new(config);
        let mut manager = AdapterManager::new(broker.cancellation().child_token());
        let mut addrs = Vec::new();

        for device in devices {
            let session = SessionConfig {
                device_uuid: device.map(str::to_string),
                heartbeat: Duration::from_secs(10),
                legacy_timeout: Duration::from_secs(600),
                ignore_timestamps: false,
                mark_unavailable_on_disconnect: true,
            };
            let source =
                ListenSource::bind("127.0.0.1:0", session, Arc::clone(&broker)).await?;
            addrs.push(source.local_addr()?);
            manager.spawn(Box::new(source));
        }

        Ok(Self {
            broker,
            manager,
            addrs,
        })
    }

    /// Open an adapter connection to the `index`-th listen source.
    pub async fn connect_adapter(&self, index: usize) -> Result<TcpStream> {
        Ok(TcpStream::connect(self.addrs[index]).await?)
    }

    pub async fn shutdown(self) {
        self.broker.shutdown();
        self.manager.shutdown().await;
    }
}

/// Poll until `probe` returns true or the deadline passes.
pub async fn wait_until<F>(what: &str, mut probe: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if probe() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
