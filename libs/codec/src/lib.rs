//! # Spindle Line-Protocol Codec
//!
//! ## Purpose
//!
//! Parses newline-terminated adapter frames into typed records and
//! serializes them back. The codec is pure — no I/O, no shared state — so
//! it can be unit- and property-tested independently of the network layer.
//!
//! ## Frame shapes
//!
//! All frames are pipe-delimited UTF-8, one frame per line:
//!
//! - `timestamp|key|value|key|value|...` — data items sharing a timestamp
//! - `timestamp|key|LEVEL|code|severity|qualifier|message` — condition
//! - `timestamp|@ASSET@|assetId|type|<length>` + `<length>` payload bytes
//! - `timestamp|@REMOVE_ASSET@|assetId`, `timestamp|@REMOVE_ALL_ASSETS@|type?`
//! - `timestamp|@DEVICE@|uuid|key|value|...` — device catalog metadata
//! - `* PING` / `* PONG <timeoutMs>` — heartbeat control, never data
//!
//! A `|` inside a value is written `\|` on the wire (`\` as `\\`); parsing
//! reverses the escape and serialization applies it, so
//! `parse(serialize(frame)) == frame` for every representable frame.
//!
//! ## Error policy
//!
//! A malformed field drops that field only; the rest of the line is still
//! processed and a [`ParseDiagnostic`] is surfaced for the caller to log.
//! [`ProtocolError`] is returned only when a line has no salvageable
//! content. The codec never decides to close a connection.

pub mod builder;
pub mod error;
pub mod escape;
pub mod frame;
pub mod parser;

pub use builder::serialize_frame;
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{
    AssetBody, AssetCommand, ControlFrame, DataFrame, DeviceWire, ParseDiagnostic, ParseOutcome,
    ParsedFrame, WireObservation,
};
pub use parser::parse_line;

/// Field delimiter of the line protocol.
pub const DELIMITER: char = '|';
