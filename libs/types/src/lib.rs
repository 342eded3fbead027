//! # Spindle Shared Types
//!
//! Data model shared by every Spindle crate: observations and their closed
//! kind variants, condition state, assets, and device metadata frames.
//!
//! This crate is a leaf. It carries no I/O, no buffering and no protocol
//! knowledge — the codec builds these types from wire frames, the buffer
//! sequences and stores them, and the query engine hands them to the
//! external renderer.

pub mod asset;
pub mod condition;
pub mod device;
pub mod observation;

pub use asset::Asset;
pub use condition::{Condition, ConditionLevel};
pub use device::DeviceFrame;
pub use observation::{
    Category, ItemAddress, Observation, ObservationKind, SequencedObservation, UNAVAILABLE,
    VALUE_KEY,
};
