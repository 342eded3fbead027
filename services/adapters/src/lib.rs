//! # Spindle Adapter Service - Shop-Floor Ingest Layer
//!
//! ## Purpose
//!
//! Runs the agent side of every adapter connection: accept (or dial) the
//! TCP link, read newline-delimited protocol frames, answer heartbeats,
//! and feed parsed records through the [`FrameSink`] seam into the
//! broker's buffers. All socket I/O in the agent lives in this crate;
//! parsing belongs to `codec` and buffer mutation to `buffer`.
//!
//! ## Connection lifecycle
//!
//! ```text
//! Listening -> Connected -> (Established <-> heartbeat checks) -> Closed
//! ```
//!
//! A dead or closed connection marks every data item it supplied as
//! UNAVAILABLE (when configured), then either awaits the next inbound
//! connection (listen mode) or reconnects with exponential backoff
//! (connect mode).
//!
//! ## Error policy
//!
//! Parse errors are logged and dropped without touching the connection.
//! Socket and heartbeat failures are owned here: they end the session,
//! trigger the availability fallback and the retry loop, and are invisible
//! to the query side except as delayed data.

pub mod connection;
pub mod error;
pub mod manager;
pub mod session;
pub mod sink;
pub mod source;

pub use connection::{ConnectionState, ReconnectPolicy};
pub use error::{AdapterError, Result};
pub use manager::AdapterManager;
pub use session::{AdapterSession, SessionConfig, SessionEnd};
pub use sink::FrameSink;
pub use source::{source_from_entry, AdapterSource, ConnectSource, ListenSource};
