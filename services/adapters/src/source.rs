//! Adapter sources: how the agent reaches one adapter.
//!
//! Listen mode binds a port and serves the adapter's inbound connection;
//! connect mode dials out and reconnects with backoff. Both run sessions
//! one at a time — one adapter connection supplies one device.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use spindle_config::{AdapterEntry, AdapterMode};

use crate::connection::ReconnectPolicy;
use crate::error::{AdapterError, Result};
use crate::session::{AdapterSession, SessionConfig, SessionEnd};
use crate::sink::FrameSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One configured adapter endpoint the manager drives to completion.
#[async_trait]
pub trait AdapterSource: Send + 'static {
    /// Human-readable endpoint label for logs.
    fn describe(&self) -> String;

    /// Run until cancelled. Session failures are owned here (retry /
    /// re-accept); an error return means the source itself cannot
    /// continue.
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()>;
}

/// Build the source an adapter entry calls for.
pub async fn source_from_entry<S: FrameSink>(
    entry: &AdapterEntry,
    sink: Arc<S>,
    ignore_timestamps: bool,
) -> Result<Box<dyn AdapterSource>> {
    let session = SessionConfig::from_entry(entry, ignore_timestamps);
    match entry.mode {
        AdapterMode::Listen => Ok(Box::new(
            ListenSource::bind(&entry.endpoint, session, sink).await?,
        )),
        AdapterMode::Connect => Ok(Box::new(ConnectSource::new(
            entry.endpoint.clone(),
            ReconnectPolicy::new(entry.reconnect_interval()),
            session,
            sink,
        ))),
    }
}

/// Accepts inbound adapter connections on a bound port.
pub struct ListenSource<S> {
    listener: TcpListener,
    session: SessionConfig,
    sink: Arc<S>,
}

impl<S: FrameSink> ListenSource<S> {
    pub async fn bind(endpoint: &str, session: SessionConfig, sink: Arc<S>) -> Result<Self> {
        let listener = TcpListener::bind(endpoint).await.map_err(|e| {
            AdapterError::Configuration(format!("cannot bind adapter endpoint {endpoint}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;
        info!(endpoint = %local_addr, "listening for adapter");
        Ok(Self {
            listener,
            session,
            sink,
        })
    }

    /// The bound address — lets tests bind port 0 and find the port.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl<S: FrameSink> AdapterSource for ListenSource<S> {
    fn describe(&self) -> String {
        self.listener
            .local_addr()
            .map(|addr| format!("listen {addr}"))
            .unwrap_or_else(|_| "listen <unbound>".to_string())
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = self.listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(%error, "accept failed");
                    continue;
                }
            };
            info!(%peer, "adapter connected");
            let session = AdapterSession::new(Arc::clone(&self.sink), self.session.clone());
            match session.run(stream, cancel.clone()).await {
                Ok(SessionEnd::Cancelled) => return Ok(()),
                Ok(SessionEnd::PeerClosed) => info!(%peer, "adapter disconnected"),
                Err(error) => warn!(%peer, %error, "adapter session failed"),
            }
        }
    }
}

/// Dials an adapter and reconnects with exponential backoff.
pub struct ConnectSource<S> {
    endpoint: String,
    policy: ReconnectPolicy,
    session: SessionConfig,
    sink: Arc<S>,
}

impl<S: FrameSink> ConnectSource<S> {
    pub fn new(
        endpoint: String,
        policy: ReconnectPolicy,
        session: SessionConfig,
        sink: Arc<S>,
    ) -> Self {
        Self {
            endpoint,
            policy,
            session,
            sink,
        }
    }

    async fn connect_once(&self) -> Result<TcpStream> {
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.endpoint)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(error)) => Err(AdapterError::ConnectionFailed {
                endpoint: self.endpoint.clone(),
                reason: error.to_string(),
            }),
            Err(_) => Err(AdapterError::ConnectTimeout {
                endpoint: self.endpoint.clone(),
                timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<S: FrameSink> AdapterSource for ConnectSource<S> {
    fn describe(&self) -> String {
        format!("connect {}", self.endpoint)
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<()> {
        let mut failures = 0u32;
        loop {
            match self.connect_once().await {
                Ok(stream) => {
                    info!(endpoint = %self.endpoint, "connected to adapter");
                    failures = 0;
                    let session =
                        AdapterSession::new(Arc::clone(&self.sink), self.session.clone());
                    match session.run(stream, cancel.clone()).await {
                        Ok(SessionEnd::Cancelled) => return Ok(()),
                        Ok(SessionEnd::PeerClosed) => {
                            info!(endpoint = %self.endpoint, "adapter closed the connection");
                        }
                        Err(error) => {
                            warn!(endpoint = %self.endpoint, %error, "adapter session failed");
                        }
                    }
                }
                Err(error) => {
                    warn!(endpoint = %self.endpoint, %error, "connect attempt failed");
                    failures = failures.saturating_add(1);
                }
            }

            let delay = self.policy.delay(failures);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
