//! Real-time replay of a recorded event timeline.
//!
//! The replayer pulls raw records from a forward-only source, drops records
//! below the skip floor, groups consecutive records sharing a Timestamp and
//! hands each group to the [`EventDispatcher`]. Between groups it sleeps for
//! the simulated gap scaled by the configured pace. While the timeline is
//! still at or below the fast-forward threshold, groups are dispatched with
//! no sleep at all; the first group past the threshold waits only for the
//! portion of its gap beyond the threshold.
//!
//! Every wait starts only after the previous group, including all of its
//! observers, has completed.

use std::time::Duration;

use tracing::{debug, info};

use crate::dispatch::EventDispatcher;
use crate::observer::{BoxError, ObserverError};
use crate::record::{RawRecord, Record, RecordError, parse_timestamp};
use crate::registry::EntityRegistry;
use crate::time::{SimTime, scaled_wait, sim_to_f64};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal replay errors. Any of these aborts the run immediately.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    #[error(transparent)]
    Observer(#[from] ObserverError),

    #[error("record source failed: {0}")]
    Source(#[source] BoxError),

    #[error("invalid pace {0}: must be finite and non-negative")]
    InvalidPace(f64),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Run parameters for a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Real seconds per simulated-time unit. Zero replays unthrottled.
    pub pace: f64,
    /// Records with a Timestamp below this floor are dropped before replay
    /// begins.
    pub skip_to: SimTime,
    /// Groups at or below this time are dispatched with no delay.
    pub fast_forward_to: SimTime,
    /// Create entities for unknown object names instead of skipping them.
    pub auto_register: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            pace: 0.0,
            skip_to: SimTime::ZERO,
            fast_forward_to: SimTime::ZERO,
            auto_register: false,
        }
    }
}

impl ReplayConfig {
    /// Reject a pace that is negative, NaN or infinite.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.pace.is_finite() && self.pace >= 0.0 {
            Ok(())
        } else {
            Err(ReplayError::InvalidPace(self.pace))
        }
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Computes the real-time wait before each group.
#[derive(Debug, Clone)]
pub struct Pacer {
    pace: f64,
    fast_forward_to: SimTime,
    fast_forwarding: bool,
    last_group_time: SimTime,
}

impl Pacer {
    pub fn new(pace: f64, fast_forward_to: SimTime) -> Self {
        Self {
            pace,
            fast_forward_to,
            fast_forwarding: true,
            last_group_time: SimTime::ZERO,
        }
    }

    pub fn is_fast_forwarding(&self) -> bool {
        self.fast_forwarding
    }

    /// Time of the last group dispatched after fast-forward ended.
    pub fn last_group_time(&self) -> SimTime {
        self.last_group_time
    }

    /// The wait to perform before dispatching a group at `group_time`.
    /// Advances the pacing state as if that group were then dispatched.
    pub fn next_wait(&mut self, group_time: SimTime) -> Option<Duration> {
        if self.fast_forwarding {
            if group_time <= self.fast_forward_to {
                return None;
            }
            self.fast_forwarding = false;
            self.last_group_time = group_time;
            info!(t = %group_time, "fast-forward complete, live playback begins");
            return scaled_wait(self.pace, group_time.saturating_sub(self.fast_forward_to));
        }
        let delta = group_time.saturating_sub(self.last_group_time);
        self.last_group_time = group_time;
        scaled_wait(self.pace, delta)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Totals for a completed replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub groups_dispatched: u64,
    pub records_dispatched: u64,
    /// Records below the skip floor.
    pub records_skipped: u64,
    /// Records with an empty Timestamp, dropped before grouping.
    pub records_untimed: u64,
    /// Dispatched records that had no effect (unknown object or event).
    pub records_ignored: u64,
    pub entities_registered: u64,
    pub last_group_time: Option<SimTime>,
}

// ---------------------------------------------------------------------------
// TimelineReplayer
// ---------------------------------------------------------------------------

/// Drives a registry through a recorded timeline.
#[derive(Debug, Clone)]
pub struct TimelineReplayer {
    config: ReplayConfig,
    dispatcher: EventDispatcher,
}

impl TimelineReplayer {
    pub fn new(config: ReplayConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        Ok(Self {
            dispatcher: EventDispatcher::new(config.auto_register),
            config,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay `source` against `registry` until the source is exhausted.
    ///
    /// Returns at the first malformed record, source failure or observer
    /// failure; nothing after the failing point is delivered.
    pub async fn run<I, E>(
        &self,
        source: I,
        registry: &mut EntityRegistry,
    ) -> Result<ReplaySummary, ReplayError>
    where
        I: IntoIterator<Item = Result<RawRecord, E>>,
        E: Into<BoxError>,
    {
        let cfg = &self.config;
        info!(
            pace = cfg.pace,
            skip_to = %cfg.skip_to,
            fast_forward_to = %cfg.fast_forward_to,
            auto_register = cfg.auto_register,
            entities = registry.len(),
            "replay starting"
        );

        let mut summary = ReplaySummary::default();
        let mut pacer = Pacer::new(cfg.pace, cfg.fast_forward_to);
        let mut group: Vec<Record> = Vec::new();
        let mut skipping = true;

        for item in source {
            let raw = item.map_err(|e| ReplayError::Source(e.into()))?;
            let Some(text) = raw.timestamp_text() else {
                summary.records_untimed += 1;
                continue;
            };
            if skipping {
                if parse_timestamp(text)? < cfg.skip_to {
                    summary.records_skipped += 1;
                    continue;
                }
                skipping = false;
            }

            let record = Record::parse(&raw)?;
            if group
                .first()
                .is_some_and(|first| first.timestamp_text != record.timestamp_text)
            {
                self.dispatch(&mut pacer, &mut group, registry, &mut summary)
                    .await?;
            }
            group.push(record);
        }

        if !group.is_empty() {
            self.dispatch(&mut pacer, &mut group, registry, &mut summary)
                .await?;
        }

        info!(
            groups = summary.groups_dispatched,
            records = summary.records_dispatched,
            skipped = summary.records_skipped,
            "replay finished"
        );
        Ok(summary)
    }

    async fn dispatch(
        &self,
        pacer: &mut Pacer,
        group: &mut Vec<Record>,
        registry: &mut EntityRegistry,
        summary: &mut ReplaySummary,
    ) -> Result<(), ReplayError> {
        let Some(time) = group.first().map(|r| r.timestamp) else {
            return Ok(());
        };

        let wait = pacer.next_wait(time);
        debug!(
            t = sim_to_f64(time),
            records = group.len(),
            wait_ms = wait.map_or(0, |d| d.as_millis() as u64),
            "dispatching group"
        );
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }

        let outcome = self.dispatcher.process_group(group, registry).await?;
        summary.groups_dispatched += 1;
        summary.records_dispatched += group.len() as u64;
        summary.records_ignored += outcome.ignored as u64;
        summary.entities_registered += outcome.registered as u64;
        summary.last_group_time = Some(time);
        group.clear();
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
