//! Basic topology: flat per-station nodes under `AssemblyLine/<station>`.
//!
//! Each station publishes its live status, nominal rate and the last lot it
//! produced as individual values. The oven additionally carries twenty sublot
//! slots, filled in turn as parts leave, and publishes its batch lot once per
//! cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lineplay_core::entity::{Activity, Hook};
use lineplay_core::observer::{Observer, ObserverError};
use lineplay_core::record::Record;
use lineplay_core::registry::EntityRegistry;
use lineplay_core::time::sim_to_f64;
use tracing::info;

use crate::clock::{Clock, day_stamp};
use crate::line::{OVEN, OVEN_BATCH_SIZE, STATIONS, nominal_rate, output_quantity};
use crate::memory::MemorySink;
use crate::sink::{NodeId, Sink, SinkError, Value, ValueKind, read_f64};
use crate::topology::{
    LiveStatusObserver, ModelError, oven_batch_label, part_to_part_time, record_part_type,
    round_to, serial, station_mut,
};

/// Decimal places for published lot properties.
const PROPERTY_PLACES: i32 = 5;

pub fn path(station: &str, leaf: &str) -> String {
    format!("AssemblyLine/{station}/{leaf}")
}

fn slot_path(slot: usize, leaf: &str) -> String {
    path(
        OVEN,
        &format!("OutputPoint/ProducedMaterial/Sublots/Part{:02}/{leaf}", slot + 1),
    )
}

// ===========================================================================
// Node layout
// ===========================================================================

const STATION_NODES: &[(&str, ValueKind)] = &[
    ("LiveStatus/State", ValueKind::Int32),
    ("LiveStatus/ControlMode", ValueKind::Int32),
    ("OutputPoint/DownstreamHeld", ValueKind::Bool),
    ("OutputPoint/NominalProductionRate", ValueKind::Double),
    ("OutputPoint/ProducedMaterialTotal", ValueKind::Double),
    ("OutputPoint/ProducedMaterialMasterTotal", ValueKind::Double),
    ("OutputPoint/ProducedMaterial/Quantity", ValueKind::Double),
    ("OutputPoint/ProducedMaterial/LotID", ValueKind::Text),
    ("OutputPoint/ProducedMaterial/ProductionDate", ValueKind::DateTime),
    ("OutputPoint/ProducedMaterial/MaterialDefinition/MaterialID", ValueKind::Text),
    ("OutputPoint/ProducedMaterial/Properties/ProcessTime", ValueKind::Double),
    ("OutputPoint/ProducedMaterial/Properties/PartToPartTime", ValueKind::Double),
    ("OutputPoint/ProducedMaterial/Properties/Reworked", ValueKind::Bool),
    ("OutputPoint/ProducedMaterial/Properties/OvenBatch", ValueKind::Int32),
];

const SLOT_NODES: &[(&str, ValueKind)] = &[
    ("Quantity", ValueKind::Double),
    ("LotID", ValueKind::Text),
    ("ProductionDate", ValueKind::DateTime),
    ("MaterialDefinition/MaterialID", ValueKind::Text),
];

/// Declare every station's nodes, plus the oven's sublot slots.
pub fn declare(sink: &mut MemorySink) {
    for station in STATIONS {
        for &(leaf, kind) in STATION_NODES {
            sink.declare(path(station, leaf), kind);
        }
    }
    for slot in 0..OVEN_BATCH_SIZE {
        for &(leaf, kind) in SLOT_NODES {
            sink.declare(slot_path(slot, leaf), kind);
        }
    }
}

// ===========================================================================
// Installation
// ===========================================================================

/// Write nominal rates and quantities, then subscribe live-status and
/// part-out observers to every station.
pub async fn install(
    registry: &mut EntityRegistry,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
) -> Result<(), ModelError> {
    for station in STATIONS {
        write_defaults(sink.as_ref(), station).await?;

        let status = LiveStatusObserver {
            sink: sink.clone(),
            state: sink.resolve(&path(station, "LiveStatus/State")).await?,
            control_mode: sink.resolve(&path(station, "LiveStatus/ControlMode")).await?,
            downstream_held: sink
                .resolve(&path(station, "OutputPoint/DownstreamHeld"))
                .await?,
        };
        let lot = LotNodes::resolve(sink.as_ref(), station).await?;
        let total = sink
            .resolve(&path(station, "OutputPoint/ProducedMaterialMasterTotal"))
            .await?;

        let part_out: Arc<dyn Observer<Activity>> = if station == OVEN {
            let mut slots = Vec::with_capacity(OVEN_BATCH_SIZE);
            for slot in 0..OVEN_BATCH_SIZE {
                slots.push(SlotNodes::resolve(sink.as_ref(), slot).await?);
            }
            Arc::new(OvenObserver {
                sink: sink.clone(),
                clock: clock.clone(),
                total,
                lot,
                slots,
                next_slot: AtomicUsize::new(0),
            })
        } else {
            Arc::new(PartOutObserver {
                sink: sink.clone(),
                clock: clock.clone(),
                total,
                lot,
            })
        };

        let activity = station_mut(registry, station)?;
        activity.subscribe(Hook::StateUpdate, Arc::new(status));
        activity.subscribe(Hook::WorkOut, part_out);
    }
    Ok(())
}

async fn write_defaults(sink: &dyn Sink, station: &str) -> Result<(), SinkError> {
    let quantity = output_quantity(station);
    let rate = nominal_rate(station).unwrap_or_default();
    for (leaf, value) in [
        ("OutputPoint/NominalProductionRate", rate),
        ("OutputPoint/ProducedMaterial/Quantity", quantity),
        ("OutputPoint/ProducedMaterialTotal", quantity),
    ] {
        let node = sink.resolve(&path(station, leaf)).await?;
        sink.write(node, Value::Double(value)).await?;
    }
    if station == OVEN {
        for slot in 0..OVEN_BATCH_SIZE {
            let node = sink.resolve(&slot_path(slot, "Quantity")).await?;
            sink.write(node, Value::Double(1.0)).await?;
        }
    }
    Ok(())
}

// ===========================================================================
// Node groups
// ===========================================================================

struct LotNodes {
    lot_id: NodeId,
    production_date: NodeId,
    material_id: NodeId,
    process_time: NodeId,
    part_to_part_time: NodeId,
    reworked: NodeId,
    oven_batch: NodeId,
}

impl LotNodes {
    async fn resolve(sink: &dyn Sink, station: &str) -> Result<Self, SinkError> {
        let node = |leaf: &str| path(station, &format!("OutputPoint/ProducedMaterial/{leaf}"));
        Ok(Self {
            lot_id: sink.resolve(&node("LotID")).await?,
            production_date: sink.resolve(&node("ProductionDate")).await?,
            material_id: sink.resolve(&node("MaterialDefinition/MaterialID")).await?,
            process_time: sink.resolve(&node("Properties/ProcessTime")).await?,
            part_to_part_time: sink.resolve(&node("Properties/PartToPartTime")).await?,
            reworked: sink.resolve(&node("Properties/Reworked")).await?,
            oven_batch: sink.resolve(&node("Properties/OvenBatch")).await?,
        })
    }

    /// Publish process time, part-to-part time, rework flag and, when the
    /// record has one, the oven batch.
    async fn write_properties(
        &self,
        sink: &dyn Sink,
        record: &Record,
        activity: &Activity,
    ) -> Result<(), SinkError> {
        let process_time = round_to(sim_to_f64(activity.process_time()), PROPERTY_PLACES);
        let p2p = round_to(part_to_part_time(record, activity), PROPERTY_PLACES);
        tokio::try_join!(
            sink.write(self.process_time, Value::Double(process_time)),
            sink.write(self.part_to_part_time, Value::Double(p2p)),
            sink.write(self.reworked, Value::Bool(record.reworked)),
        )?;
        if let Some(batch) = record.oven_batch {
            sink.write(self.oven_batch, Value::Int32(batch)).await?;
        }
        Ok(())
    }
}

struct SlotNodes {
    lot_id: NodeId,
    production_date: NodeId,
    material_id: NodeId,
}

impl SlotNodes {
    async fn resolve(sink: &dyn Sink, slot: usize) -> Result<Self, SinkError> {
        Ok(Self {
            lot_id: sink.resolve(&slot_path(slot, "LotID")).await?,
            production_date: sink.resolve(&slot_path(slot, "ProductionDate")).await?,
            material_id: sink
                .resolve(&slot_path(slot, "MaterialDefinition/MaterialID"))
                .await?,
        })
    }
}

// ===========================================================================
// Observers
// ===========================================================================

/// Publishes each part leaving a (non-oven) station as a one-part lot.
struct PartOutObserver {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    total: NodeId,
    lot: LotNodes,
}

#[async_trait]
impl Observer<Activity> for PartOutObserver {
    async fn notify(&self, record: &Record, activity: &Activity) -> Result<(), ObserverError> {
        let sink = self.sink.as_ref();
        let part_type = record_part_type(record)?;
        let now = self.clock.now();
        let lot_id = format!("{}-{part_type}-{}", day_stamp(&now), serial(record));
        let total = read_f64(sink, self.total).await?;

        info!(
            station = activity.name(),
            lot_id = %lot_id,
            t = %record.timestamp_text,
            "writing part out"
        );

        tokio::try_join!(
            sink.write(self.total, Value::Double(total + 1.0)),
            sink.write(self.lot.lot_id, Value::Text(lot_id)),
            sink.write(self.lot.material_id, Value::Text(part_type.to_string())),
            sink.write(self.lot.production_date, Value::DateTime(now)),
        )?;
        self.lot.write_properties(sink, record, activity).await?;
        Ok(())
    }
}

/// Fills the oven's sublot slots in turn. When a part lands in the first slot
/// the batch lot is published and the master total grows by a full batch.
struct OvenObserver {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    total: NodeId,
    lot: LotNodes,
    slots: Vec<SlotNodes>,
    next_slot: AtomicUsize,
}

#[async_trait]
impl Observer<Activity> for OvenObserver {
    async fn notify(&self, record: &Record, activity: &Activity) -> Result<(), ObserverError> {
        let sink = self.sink.as_ref();
        let part_type = record_part_type(record)?;
        let now = self.clock.now();
        let day = day_stamp(&now);
        let sublot_id = format!("{day}-{part_type}-{}", serial(record));
        let total = read_f64(sink, self.total).await?;
        let index = self.next_slot.load(Ordering::Relaxed);

        info!(station = activity.name(), sublot_id = %sublot_id, slot = index, "writing part out");

        let slot = &self.slots[index];
        tokio::try_join!(
            sink.write(slot.lot_id, Value::Text(sublot_id)),
            sink.write(slot.material_id, Value::Text(part_type.to_string())),
            sink.write(slot.production_date, Value::DateTime(now)),
        )?;

        if index == 0 {
            let batch_id = format!("{day}-ovenbatch-{}", oven_batch_label(record));
            tokio::try_join!(
                sink.write(self.total, Value::Double(total + OVEN_BATCH_SIZE as f64)),
                sink.write(self.lot.lot_id, Value::Text(batch_id)),
                self.lot.write_properties(sink, record, activity),
                sink.write(self.lot.production_date, Value::DateTime(now)),
            )?;
        }

        self.next_slot
            .store((index + 1) % OVEN_BATCH_SIZE, Ordering::Relaxed);
        Ok(())
    }
}
