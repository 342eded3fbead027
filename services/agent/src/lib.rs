//! # Spindle Agent Service
//!
//! ## Purpose
//!
//! The façade that wires buffers, adapter connections and queries into one
//! agent, plus the query engine behind the three request shapes:
//!
//! - **current** — latest-state snapshot, optionally as of a historical
//!   sequence (`at`)
//! - **sample** — bounded history range with a paging cursor
//! - **stream** — cancellable live tail delivering exactly the sequence
//!   delta, with heartbeat chunks during quiet spells
//!
//! Query results are in-memory document models; rendering them to a wire
//! format (XML/JSON) and the HTTP/MQTT front ends that expose them are
//! external collaborators.

pub mod broker;
pub mod document;
pub mod error;
pub mod filter;
pub mod query;
pub mod registry;

pub use broker::AgentBroker;
pub use document::{
    AssetDocument, DeviceDocument, DocumentHeader, SampleDocument, SnapshotDocument, StreamChunk,
};
pub use error::QueryError;
pub use filter::PathFilter;
pub use query::{QueryEngine, StreamOptions, StreamSession};
pub use registry::{DeviceRecord, DeviceRegistry};
