//! TMC topology: each station publishes through
//! `AssemblyLine/<station>/MaterialOutputPoints/MaterialOutput`, and produced
//! material is written as one structured [`MaterialSublot`] value.
//!
//! The oven collects the sublots of a batch and writes a single
//! twenty-part sublot when the batch is complete. The first part of each
//! batch donates its lot properties to the batch.

use std::sync::Arc;

use async_trait::async_trait;
use lineplay_core::entity::{Activity, Hook};
use lineplay_core::observer::{Observer, ObserverError};
use lineplay_core::record::Record;
use lineplay_core::registry::EntityRegistry;
use lineplay_core::time::sim_to_f64;
use tokio::sync::Mutex;
use tracing::info;

use crate::clock::{Clock, day_stamp};
use crate::line::{OVEN, OVEN_BATCH_SIZE, STATIONS, nominal_rate, output_quantity};
use crate::memory::MemorySink;
use crate::sink::{
    DataValue, MaterialDefinition, MaterialLot, MaterialSublot, NodeId, Sink, SinkError, Value,
    ValueKind, read_f64,
};
use crate::topology::{
    LiveStatusObserver, ModelError, oven_batch_label, part_to_part_time, record_part_type,
    round_to, serial, station_mut,
};

/// Decimal places for published sublot properties.
const PROPERTY_PLACES: i32 = 4;

pub fn live_status_path(station: &str, leaf: &str) -> String {
    format!("AssemblyLine/{station}/LiveStatus/{leaf}")
}

pub fn output_path(station: &str, leaf: &str) -> String {
    format!("AssemblyLine/{station}/MaterialOutputPoints/MaterialOutput/{leaf}")
}

// ===========================================================================
// Node layout
// ===========================================================================

const STATUS_NODES: &[(&str, ValueKind)] = &[
    ("State", ValueKind::Int32),
    ("ControlMode", ValueKind::Int32),
];

const OUTPUT_NODES: &[(&str, ValueKind)] = &[
    ("DownstreamHeld", ValueKind::Bool),
    ("NominalProductionRate", ValueKind::Double),
    ("ProducedMaterialTotal", ValueKind::Double),
    ("ProducedMaterialMasterTotal", ValueKind::Double),
    ("ProducedMaterial", ValueKind::Sublot),
];

pub fn declare(sink: &mut MemorySink) {
    for station in STATIONS {
        for &(leaf, kind) in STATUS_NODES {
            sink.declare(live_status_path(station, leaf), kind);
        }
        for &(leaf, kind) in OUTPUT_NODES {
            sink.declare(output_path(station, leaf), kind);
        }
    }
}

// ===========================================================================
// Installation
// ===========================================================================

pub async fn install(
    registry: &mut EntityRegistry,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
) -> Result<(), ModelError> {
    for station in STATIONS {
        let rate = sink.resolve(&output_path(station, "NominalProductionRate")).await?;
        sink.write(rate, Value::Double(nominal_rate(station).unwrap_or_default()))
            .await?;
        let produced_total = sink.resolve(&output_path(station, "ProducedMaterialTotal")).await?;
        sink.write(produced_total, Value::Double(output_quantity(station)))
            .await?;

        let status = LiveStatusObserver {
            sink: sink.clone(),
            state: sink.resolve(&live_status_path(station, "State")).await?,
            control_mode: sink.resolve(&live_status_path(station, "ControlMode")).await?,
            downstream_held: sink.resolve(&output_path(station, "DownstreamHeld")).await?,
        };
        let output = OutputNodes {
            total: sink
                .resolve(&output_path(station, "ProducedMaterialMasterTotal"))
                .await?,
            produced: sink.resolve(&output_path(station, "ProducedMaterial")).await?,
        };

        let part_out: Arc<dyn Observer<Activity>> = if station == OVEN {
            Arc::new(OvenBatchObserver {
                sink: sink.clone(),
                clock: clock.clone(),
                output,
                batch: Mutex::new(OvenBatch::default()),
            })
        } else {
            Arc::new(SublotObserver {
                sink: sink.clone(),
                clock: clock.clone(),
                output,
            })
        };

        let activity = station_mut(registry, station)?;
        activity.subscribe(Hook::StateUpdate, Arc::new(status));
        activity.subscribe(Hook::WorkOut, part_out);
    }
    Ok(())
}

struct OutputNodes {
    total: NodeId,
    produced: NodeId,
}

impl OutputNodes {
    async fn publish(
        &self,
        sink: &dyn Sink,
        sublot: MaterialSublot,
        increment: f64,
    ) -> Result<(), SinkError> {
        let total = read_f64(sink, self.total).await?;
        sink.write(self.total, Value::Double(total + increment)).await?;
        sink.write(self.produced, Value::Sublot(sublot)).await
    }
}

// ===========================================================================
// Sublot construction
// ===========================================================================

/// Lot properties for a part leaving `activity`.
fn lot_properties(record: &Record, activity: &Activity) -> Vec<DataValue> {
    let process_time = round_to(sim_to_f64(activity.process_time()), PROPERTY_PLACES);
    let p2p = round_to(part_to_part_time(record, activity), PROPERTY_PLACES);
    vec![
        DataValue::new("process_time", Some(Value::Double(process_time))),
        DataValue::new("part_to_part_time", Some(Value::Double(p2p))),
        DataValue::new("reworked", Some(Value::Bool(record.reworked))),
        DataValue::new("oven_batch", record.oven_batch.map(Value::Int32)),
    ]
}

/// One-part sublot for `record`; lot properties are attached when
/// `with_properties` is set.
fn part_sublot(
    record: &Record,
    activity: &Activity,
    clock: &dyn Clock,
    with_properties: bool,
) -> Result<MaterialSublot, ModelError> {
    let part_type = record_part_type(record)?;
    let now = clock.now();
    let lot_id = format!("{}-{part_type}", day_stamp(&now));
    let properties = if with_properties {
        lot_properties(record, activity)
    } else {
        Vec::new()
    };

    Ok(MaterialSublot {
        id: format!("{lot_id}-{}", serial(record)),
        quantity: 1.0,
        material_lot: MaterialLot {
            id: lot_id,
            production_date: Some(now),
            material_definition: MaterialDefinition {
                id: part_type.to_string(),
                properties: Vec::new(),
            },
            properties,
        },
        sublots: Vec::new(),
    })
}

// ===========================================================================
// Observers
// ===========================================================================

struct SublotObserver {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    output: OutputNodes,
}

#[async_trait]
impl Observer<Activity> for SublotObserver {
    async fn notify(&self, record: &Record, activity: &Activity) -> Result<(), ObserverError> {
        let sublot = part_sublot(record, activity, self.clock.as_ref(), true)?;
        info!(
            station = activity.name(),
            sublot_id = %sublot.id,
            t = %record.timestamp_text,
            "writing part out"
        );
        self.output.publish(self.sink.as_ref(), sublot, 1.0).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct OvenBatch {
    sublots: Vec<MaterialSublot>,
    properties: Vec<DataValue>,
}

struct OvenBatchObserver {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    output: OutputNodes,
    batch: Mutex<OvenBatch>,
}

#[async_trait]
impl Observer<Activity> for OvenBatchObserver {
    async fn notify(&self, record: &Record, activity: &Activity) -> Result<(), ObserverError> {
        let mut batch = self.batch.lock().await;
        let first = batch.sublots.is_empty();
        let mut sublot = part_sublot(record, activity, self.clock.as_ref(), first)?;
        if first {
            batch.properties = std::mem::take(&mut sublot.material_lot.properties);
        }
        batch.sublots.push(sublot);
        if batch.sublots.len() < OVEN_BATCH_SIZE {
            return Ok(());
        }

        let lot_id = format!("ovenbatch-{}", oven_batch_label(record));
        let oven_lot = MaterialSublot {
            id: format!("{}-{lot_id}", day_stamp(&self.clock.now())),
            quantity: OVEN_BATCH_SIZE as f64,
            material_lot: MaterialLot {
                id: lot_id,
                properties: std::mem::take(&mut batch.properties),
                ..MaterialLot::default()
            },
            sublots: std::mem::take(&mut batch.sublots),
        };
        info!(
            station = activity.name(),
            batch_id = %oven_lot.id,
            t = %record.timestamp_text,
            "writing oven batch out"
        );
        self.output
            .publish(self.sink.as_ref(), oven_lot, OVEN_BATCH_SIZE as f64)
            .await?;
        Ok(())
    }
}
