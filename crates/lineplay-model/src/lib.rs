//! Lineplay line model: where replayed events are published.
//!
//! - [`sink`]: the [`Sink`] trait and the values observers publish
//! - [`memory`]: [`MemorySink`], a declared in-memory node table
//! - [`line`]: stations, queues, part types and the state lookup table
//! - [`topology`]: the basic and TMC observer topologies
//! - [`clock`]: wall-clock source for lot ids and production dates

pub mod basic;
pub mod clock;
pub mod line;
pub mod memory;
pub mod sink;
pub mod tmc;
pub mod topology;

pub use clock::{Clock, FixedClock, SystemClock};
pub use memory::MemorySink;
pub use sink::{NodeId, Sink, SinkError, Value, ValueKind};
pub use topology::{ModelError, Topology};
