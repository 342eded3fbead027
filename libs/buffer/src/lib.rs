//! # Spindle Observation & Asset Buffers
//!
//! ## Purpose
//!
//! The single shared mutable resource of the agent: a fixed-capacity,
//! sequence-indexed ring of observation history with latest-value and
//! active-condition indices, plus a bounded insertion-ordered asset store.
//!
//! ## Concurrency model
//!
//! All mutation goes through [`ObservationBuffer::insert`] /
//! [`AssetBuffer::upsert`]; everything else reads through accessors that
//! take consistent snapshots under a short read lock. Sequence assignment
//! and ring mutation share one write lock — the only hard serialization
//! point in the agent. Parsing and rendering never happen inside it.
//!
//! Readers that need to suspend until new data arrives subscribe to the
//! last-sequence [`tokio::sync::watch`] channel via
//! [`ObservationBuffer::subscribe`]; the value is published inside the
//! write lock, so observed sequences are monotonic.

pub mod assets;
pub mod checkpoint;
pub mod error;
pub mod observations;
pub mod sequence;

pub use assets::{AssetBuffer, AssetQuery};
pub use checkpoint::Checkpoint;
pub use error::{BufferError, BufferResult};
pub use observations::{BufferBounds, ObservationBuffer, RangeSlice};
pub use sequence::SequenceAllocator;
