//! Observer topologies: which sink nodes a line publishes to and the observers
//! that keep them current.
//!
//! Both topologies share the live-status observer; they differ in how
//! produced material is published. See [`crate::basic`] and [`crate::tmc`].

use std::sync::Arc;

use async_trait::async_trait;
use lineplay_core::entity::Activity;
use lineplay_core::observer::{Observer, ObserverError};
use lineplay_core::record::{Record, StateCode};
use lineplay_core::registry::EntityRegistry;
use lineplay_core::time::sim_to_f64;
use tracing::info;

use crate::clock::Clock;
use crate::line::{part_type, state_mapping};
use crate::memory::MemorySink;
use crate::sink::{NodeId, Sink, SinkError, Value};
use crate::{basic, tmc};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("station '{0}' is not in the registry")]
    MissingStation(String),

    #[error("{object}: no part type for Type_ID {type_id:?}")]
    UnknownPartType {
        object: String,
        type_id: Option<u32>,
    },
}

impl From<ModelError> for ObserverError {
    fn from(err: ModelError) -> Self {
        ObserverError::new(err)
    }
}

// ===========================================================================
// Topology selection
// ===========================================================================

/// Which node layout and observer set to publish through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Flat per-station nodes, one value per node.
    Basic,
    /// TMC/MES material output points carrying structured sublots.
    Tmc,
}

impl Topology {
    pub fn name(self) -> &'static str {
        match self {
            Topology::Basic => "basic",
            Topology::Tmc => "tmc",
        }
    }

    /// Declare this topology's nodes on an in-memory sink.
    pub fn declare(self, sink: &mut MemorySink) {
        match self {
            Topology::Basic => basic::declare(sink),
            Topology::Tmc => tmc::declare(sink),
        }
    }

    /// Write initial values and subscribe observers to every station.
    pub async fn install(
        self,
        registry: &mut EntityRegistry,
        sink: Arc<dyn Sink>,
        clock: Arc<dyn Clock>,
    ) -> Result<(), ModelError> {
        match self {
            Topology::Basic => basic::install(registry, sink, clock).await,
            Topology::Tmc => tmc::install(registry, sink, clock).await,
        }
    }
}

// ===========================================================================
// Shared helpers
// ===========================================================================

/// Round to `places` decimal places, ties to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round_ties_even() / scale
}

pub(crate) fn record_part_type(record: &Record) -> Result<&'static str, ModelError> {
    record
        .type_id
        .and_then(part_type)
        .ok_or_else(|| ModelError::UnknownPartType {
            object: record.object.clone(),
            type_id: record.type_id,
        })
}

/// Simulated time since the activity's previous part out.
pub(crate) fn part_to_part_time(record: &Record, activity: &Activity) -> f64 {
    sim_to_f64(record.timestamp - activity.last_part_out())
}

pub(crate) fn serial(record: &Record) -> &str {
    record.serial_num.as_deref().unwrap_or_default()
}

pub(crate) fn oven_batch_label(record: &Record) -> String {
    record.oven_batch.map(|b| b.to_string()).unwrap_or_default()
}

pub(crate) fn station_mut<'a>(
    registry: &'a mut EntityRegistry,
    station: &str,
) -> Result<&'a mut Activity, ModelError> {
    registry
        .activity_mut(station)
        .ok_or_else(|| ModelError::MissingStation(station.to_string()))
}

// ===========================================================================
// Live status
// ===========================================================================

/// Publishes state changes: the PackML state (when the new state has one),
/// the control mode, and whether downstream is held.
pub(crate) struct LiveStatusObserver {
    pub sink: Arc<dyn Sink>,
    pub state: NodeId,
    pub control_mode: NodeId,
    pub downstream_held: NodeId,
}

#[async_trait]
impl Observer<Activity> for LiveStatusObserver {
    async fn notify(&self, record: &Record, activity: &Activity) -> Result<(), ObserverError> {
        let Some(new_state) = record.state() else {
            return Ok(());
        };
        let mapping = state_mapping(new_state);
        info!(
            station = activity.name(),
            from = %activity.state(),
            to = %new_state,
            t = %record.timestamp_text,
            "writing state change"
        );

        if let Some(packml) = mapping.packml_state {
            self.sink.write(self.state, Value::Int32(packml)).await?;
        }
        self.sink
            .write(self.control_mode, Value::Int32(mapping.control_mode))
            .await?;
        let held = new_state == StateCode::BLOCKED;
        self.sink
            .write(self.downstream_held, Value::Bool(held))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineplay_core::test_utils::*;

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.234567, 5), 1.23457);
        assert_eq!(round_to(1.234567, 4), 1.2346);
        assert_eq!(round_to(2.0, 4), 2.0);
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn part_type_lookup() {
        let mut rec = work_out("5", "Press", "S1");
        assert!(matches!(
            record_part_type(&rec),
            Err(ModelError::UnknownPartType { type_id: None, .. })
        ));
        rec.type_id = Some(3);
        assert_eq!(record_part_type(&rec).unwrap(), "SJC19CK");
        rec.type_id = Some(9);
        assert!(record_part_type(&rec).is_err());
    }
}
