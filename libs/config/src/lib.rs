//! # Spindle Configuration
//!
//! Loading and validation of the agent's TOML configuration, with
//! `SPINDLE_`-prefixed environment overrides (e.g.
//! `SPINDLE_BUFFER_SIZE=65536`). All values here are read-only to the
//! core: the buffer sizes are fixed at construction and reset only with
//! the process.

pub mod agent;

pub use agent::{load_config, AdapterEntry, AdapterMode, AgentConfig};
