//! Parsed frame types produced by [`crate::parser::parse_line`].

use std::fmt;

use chrono::{DateTime, Utc};
use types::ObservationKind;

/// Heartbeat control frames. Not data; never sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    Ping,
    Pong { timeout_ms: u64 },
}

/// One data item update as written on the wire.
///
/// The key is the raw wire key with any shape hint stripped; resolving the
/// device qualifier for wildcard adapters is the connection layer's job,
/// since only it knows whether the adapter is bound to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct WireObservation {
    pub key: String,
    pub kind: ObservationKind,
    pub values: Vec<(String, String)>,
}

/// One or more data item updates sharing a timestamp.
///
/// `timestamp: None` means the adapter left the field empty and the agent
/// assigns ingest time.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub timestamp: Option<DateTime<Utc>>,
    pub items: Vec<WireObservation>,
}

/// Asset payload: inline on the line, or a pending byte count the
/// connection layer must read from the stream before the frame is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetBody {
    Inline(String),
    Pending(usize),
}

/// Asset mutation commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetCommand {
    Upsert {
        asset_id: String,
        asset_type: String,
        body: AssetBody,
    },
    Remove {
        asset_id: String,
    },
    RemoveAll {
        asset_type: Option<String>,
    },
}

impl AssetCommand {
    /// Replace a [`AssetBody::Pending`] marker with the bytes the
    /// connection layer read from the stream.
    pub fn with_inline_body(self, body: String) -> Self {
        match self {
            AssetCommand::Upsert {
                asset_id,
                asset_type,
                ..
            } => AssetCommand::Upsert {
                asset_id,
                asset_type,
                body: AssetBody::Inline(body),
            },
            other => other,
        }
    }
}

/// Device metadata as written on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceWire {
    pub device_uuid: String,
    pub entries: Vec<(String, String)>,
}

/// A fully parsed line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFrame {
    Data(DataFrame),
    Asset {
        timestamp: Option<DateTime<Utc>>,
        command: AssetCommand,
    },
    Device {
        timestamp: Option<DateTime<Utc>>,
        device: DeviceWire,
    },
    Control(ControlFrame),
    /// Blank line or a line whose every unit was dropped.
    Empty,
}

/// A recoverable field-level problem: the field was dropped, the rest of
/// the line survived. Callers log these; they never abort a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Zero-based field index the problem was found at.
    pub field: usize,
    pub reason: String,
}

impl ParseDiagnostic {
    pub fn new(field: usize, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}: {}", self.field, self.reason)
    }
}

/// Parse result: the frame plus whatever was dropped along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub frame: ParsedFrame,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseOutcome {
    pub fn new(frame: ParsedFrame, diagnostics: Vec<ParseDiagnostic>) -> Self {
        Self { frame, diagnostics }
    }

    pub fn clean(frame: ParsedFrame) -> Self {
        Self::new(frame, Vec::new())
    }

    pub fn empty() -> Self {
        Self::clean(ParsedFrame::Empty)
    }
}
