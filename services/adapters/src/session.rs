//! Per-connection adapter session: the read loop and heartbeat machine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codec::{parse_line, AssetBody, AssetCommand, ControlFrame, DataFrame, ParsedFrame};
use spindle_config::AdapterEntry;
use types::{Asset, Category, DeviceFrame, ItemAddress, Observation};

use crate::connection::ConnectionState;
use crate::error::{AdapterError, Result};
use crate::sink::FrameSink;

/// Settings for one adapter session, derived from the adapter's
/// configuration entry.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device this connection supplies; `None` is a wildcard adapter whose
    /// lines qualify keys as `device:key`.
    pub device_uuid: Option<String>,
    /// PONG timeout advertised to the adapter.
    pub heartbeat: Duration,
    /// Silence timeout before heartbeat negotiation.
    pub legacy_timeout: Duration,
    /// Stamp observations with agent time regardless of the wire.
    pub ignore_timestamps: bool,
    pub mark_unavailable_on_disconnect: bool,
}

impl SessionConfig {
    pub fn from_entry(entry: &AdapterEntry, ignore_timestamps: bool) -> Self {
        Self {
            device_uuid: entry.device_uuid.clone(),
            heartbeat: entry.heartbeat(),
            legacy_timeout: entry.legacy_timeout(),
            ignore_timestamps,
            mark_unavailable_on_disconnect: entry.mark_unavailable_on_disconnect,
        }
    }
}

/// How a session ended, when it ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The adapter closed the socket.
    PeerClosed,
    /// The agent is shutting down.
    Cancelled,
}

/// One adapter connection from accept/dial to close.
///
/// Owns the read loop, the PING/PONG heartbeat machine and the
/// availability fallback. Consumes itself on [`run`](Self::run); sources
/// build a fresh session per connection.
pub struct AdapterSession<S> {
    sink: Arc<S>,
    config: SessionConfig,
    state: ConnectionState,
    /// Every data item this connection reported, for the availability
    /// fallback on disconnect.
    seen: HashMap<ItemAddress, Category>,
    heartbeat_armed: bool,
}

impl<S: FrameSink> AdapterSession<S> {
    pub fn new(sink: Arc<S>, config: SessionConfig) -> Self {
        Self {
            sink,
            config,
            state: ConnectionState::Listening,
            seen: HashMap::new(),
            heartbeat_armed: false,
        }
    }

    /// Silence window after which the connection is treated as dead.
    fn silence_timeout(&self) -> Duration {
        if self.heartbeat_armed {
            self.config.heartbeat * 2
        } else {
            self.config.legacy_timeout
        }
    }

    /// Drive the connection until the peer closes, the heartbeat dies, or
    /// the agent shuts down.
    pub async fn run<IO>(mut self, stream: IO, cancel: CancellationToken) -> Result<SessionEnd>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        self.state = ConnectionState::Connected;

        let outcome = self.read_loop(&mut reader, &mut writer, &cancel).await;
        self.state = ConnectionState::Closed;

        // Shutdown is not a device failure; everything else marks the
        // connection's data items unavailable.
        if !matches!(&outcome, Ok(SessionEnd::Cancelled)) {
            self.mark_unavailable();
        }
        outcome
    }

    async fn read_loop<R, W>(
        &mut self,
        reader: &mut BufReader<R>,
        writer: &mut W,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut line = String::new();
        loop {
            line.clear();
            let silence = self.silence_timeout();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                read = reader.read_line(&mut line) => read,
                _ = tokio::time::sleep(silence) => {
                    return Err(AdapterError::HeartbeatTimeout {
                        silent_for_ms: silence.as_millis() as u64,
                    });
                }
            };
            if read? == 0 {
                return Ok(SessionEnd::PeerClosed);
            }
            self.handle_line(&line, reader, writer).await?;
        }
    }

    async fn handle_line<R, W>(
        &mut self,
        line: &str,
        reader: &mut BufReader<R>,
        writer: &mut W,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = match parse_line(line) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "dropping malformed frame");
                return Ok(());
            }
        };
        for diagnostic in &outcome.diagnostics {
            warn!(%diagnostic, "dropped frame field");
        }

        match outcome.frame {
            ParsedFrame::Empty => return Ok(()),
            ParsedFrame::Control(control) => return self.handle_control(control, writer).await,
            ParsedFrame::Data(frame) => self.ingest_data(frame),
            ParsedFrame::Asset { timestamp, command } => {
                let command = self.complete_asset_body(command, reader).await?;
                self.ingest_asset(timestamp, command);
            }
            ParsedFrame::Device { timestamp, device } => {
                let timestamp = self.resolve_timestamp(timestamp);
                self.sink.ingest_device(DeviceFrame::new(
                    device.device_uuid,
                    timestamp,
                    device.entries,
                ));
            }
        }
        self.mark_established();
        Ok(())
    }

    async fn handle_control<W>(&mut self, control: ControlFrame, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match control {
            ControlFrame::Ping => {
                if !self.heartbeat_armed {
                    info!(
                        heartbeat_ms = self.config.heartbeat.as_millis() as u64,
                        "heartbeat negotiated"
                    );
                    self.heartbeat_armed = true;
                }
                let pong = format!("* PONG {}\n", self.config.heartbeat.as_millis());
                writer.write_all(pong.as_bytes()).await?;
                writer.flush().await?;
            }
            ControlFrame::Pong { timeout_ms } => {
                // The peer answered a ping; traffic itself reset the timer.
                debug!(timeout_ms, "pong received");
                self.heartbeat_armed = true;
            }
        }
        self.mark_established();
        Ok(())
    }

    fn mark_established(&mut self) {
        if self.state != ConnectionState::Established {
            debug!("adapter connection established");
            self.state = ConnectionState::Established;
        }
    }

    fn resolve_timestamp(&self, wire: Option<DateTime<Utc>>) -> DateTime<Utc> {
        if self.config.ignore_timestamps {
            return Utc::now();
        }
        wire.unwrap_or_else(Utc::now)
    }

    /// Map a wire key onto a device-qualified address.
    fn resolve_address(&mut self, wire_key: &str) -> Option<ItemAddress> {
        match &self.config.device_uuid {
            Some(device) => Some(ItemAddress::new(device.clone(), wire_key)),
            None => match wire_key.split_once(':') {
                Some((device, key)) if !device.is_empty() && !key.is_empty() => {
                    Some(ItemAddress::new(device, key))
                }
                _ => {
                    warn!(
                        key = wire_key,
                        "wildcard adapter requires device-qualified keys, dropped"
                    );
                    None
                }
            },
        }
    }

    fn ingest_data(&mut self, frame: DataFrame) {
        let timestamp = self.resolve_timestamp(frame.timestamp);
        for item in frame.items {
            let Some(address) = self.resolve_address(&item.key) else {
                continue;
            };
            self.seen.insert(address.clone(), item.kind.category());
            let observation = Observation::new(address, item.kind, timestamp, item.values);
            self.sink.ingest_observation(observation);
        }
    }

    /// Read the length-prefixed payload that completes an asset upsert.
    async fn complete_asset_body<R>(
        &mut self,
        command: AssetCommand,
        reader: &mut BufReader<R>,
    ) -> Result<AssetCommand>
    where
        R: AsyncRead + Unpin + Send,
    {
        let AssetCommand::Upsert {
            asset_id,
            asset_type,
            body: AssetBody::Pending(expected),
        } = command
        else {
            return Ok(command);
        };

        let mut payload = vec![0u8; expected];
        match tokio::time::timeout(self.silence_timeout(), reader.read_exact(&mut payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(AdapterError::TruncatedAssetPayload { expected });
            }
            Ok(Err(error)) => return Err(error.into()),
            Err(_) => return Err(AdapterError::TruncatedAssetPayload { expected }),
        }
        Ok(AssetCommand::Upsert {
            asset_id,
            asset_type,
            body: AssetBody::Inline(String::from_utf8_lossy(&payload).into_owned()),
        })
    }

    fn ingest_asset(&mut self, timestamp: Option<DateTime<Utc>>, command: AssetCommand) {
        let timestamp = self.resolve_timestamp(timestamp);
        match command {
            AssetCommand::Upsert {
                asset_id,
                asset_type,
                body,
            } => {
                let Some(device) = self.config.device_uuid.clone() else {
                    warn!(
                        asset_id,
                        "wildcard adapter cannot attribute an asset to a device, dropped"
                    );
                    return;
                };
                let AssetBody::Inline(body) = body else {
                    // complete_asset_body ran first; a Pending here is a bug.
                    warn!(asset_id, "asset body was never read, dropped");
                    return;
                };
                self.sink
                    .upsert_asset(Asset::new(asset_id, device, asset_type, timestamp, body));
            }
            AssetCommand::Remove { asset_id } => {
                self.sink.remove_asset(&asset_id, timestamp);
            }
            AssetCommand::RemoveAll { asset_type } => {
                self.sink.remove_all_assets(
                    asset_type.as_deref(),
                    self.config.device_uuid.as_deref(),
                    timestamp,
                );
            }
        }
    }

    /// Re-report everything this connection supplied as UNAVAILABLE so
    /// readers see the device go stale rather than frozen.
    fn mark_unavailable(&mut self) {
        if !self.config.mark_unavailable_on_disconnect || self.seen.is_empty() {
            return;
        }
        let now = Utc::now();
        let items = self.seen.len();
        for (address, category) in self.seen.drain() {
            self.sink
                .ingest_observation(Observation::unavailable(address, category, now));
        }
        info!(items, "marked adapter data items unavailable");
    }
}
