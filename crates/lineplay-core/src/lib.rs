//! Lineplay Core -- the event-timeline replay engine for production lines.
//!
//! This crate replays a recorded timeline of discrete production-line events
//! (part arrivals, part departures, state transitions) against a live model
//! of stations and buffers, at a controllable real-time pace.
//!
//! # Replay Pipeline
//!
//! Each call to [`replay::TimelineReplayer::run`] drives the model through
//! the following steps:
//!
//! 1. **Skip** -- Records below the skip floor are consumed and discarded.
//! 2. **Group** -- Consecutive records sharing a Timestamp form one group.
//! 3. **Pace** -- The replayer sleeps for the simulated gap scaled by the
//!    configured pace (no sleep while fast-forwarding).
//! 4. **Dispatch** -- Work_In / Work_Out records are applied in source order,
//!    then the last State record per entity is applied in first-seen order.
//! 5. **Notify** -- Each entity runs its observers sequentially, awaiting
//!    every observer before the next one starts.
//!
//! # Key Types
//!
//! - [`record::Record`] -- One typed timeline event, parsed from a
//!   [`record::RawRecord`] field map.
//! - [`entity::Activity`] -- Station with a state code and processing-time
//!   accrual.
//! - [`entity::Queue`] -- Buffer holding in-flight parts by serial number.
//! - [`registry::EntityRegistry`] -- Name-indexed entity store, optionally
//!   growing through auto-registration.
//! - [`dispatch::EventDispatcher`] -- Applies one timestamp group.
//! - [`replay::TimelineReplayer`] -- Grouping, pacing, fast-forward, skip.
//! - [`observer::Observer`] -- Asynchronous subscriber capability.
//! - [`time::SimTime`] -- Q64.64 fixed-point simulated time.

pub mod dispatch;
pub mod entity;
pub mod observer;
pub mod record;
pub mod registry;
pub mod replay;
pub mod time;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
