//! The assembly line: stations, their input queues, part types, the state
//! lookup table and nominal production rates.

use lineplay_core::entity::{Activity, Queue};
use lineplay_core::record::StateCode;
use lineplay_core::registry::{EntityRegistry, RegistryError};

/// Processing stations, in line order.
pub const STATIONS: [&str; 10] = [
    "Cleaning",
    "Insulating",
    "Winding 1",
    "Winding 2",
    "Winding 3",
    "Press",
    "Trim and Bind",
    "Oven",
    "Final Inspection",
    "Rework",
];

/// Input queues. The three winders share one queue.
pub const QUEUES: [&str; 8] = [
    "Queue for Cleaning",
    "Queue for Insulating",
    "Queue for Winding 1",
    "Queue for Press",
    "Queue for Trim and Bind",
    "Queue for Oven",
    "Queue for Final Inspection",
    "Queue for Rework",
];

/// The batch station.
pub const OVEN: &str = "Oven";

/// Parts per oven batch.
pub const OVEN_BATCH_SIZE: usize = 20;

/// Part type names indexed by Type_ID. Index 0 is unused.
pub const PART_TYPES: [&str; 6] = ["", "BSD12HJ", "DWC16JP", "SJC19CK", "FGC22WS", "WSC22PS"];

pub fn part_type(type_id: u32) -> Option<&'static str> {
    PART_TYPES.get(type_id as usize).copied()
}

/// How a simulation state is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMapping {
    pub control_mode: i32,
    /// PackML state, when the simulation state has one.
    pub packml_state: Option<i32>,
}

const fn mapping(control_mode: i32, packml_state: Option<i32>) -> StateMapping {
    StateMapping {
        control_mode,
        packml_state,
    }
}

/// Indexed by [`StateCode::code`].
pub const STATE_MAP: [StateMapping; StateCode::COUNT] = [
    mapping(1, Some(12)), // starved
    mapping(1, Some(4)),  // working
    mapping(1, Some(12)), // blocked
    mapping(4, None),     // changeover
    mapping(1, Some(8)),  // breakdown
    mapping(0, None),     // off shift
    mapping(1, Some(15)), // staff shortage
    mapping(2, None),     // scheduled maintenance
];

pub fn state_mapping(state: StateCode) -> StateMapping {
    STATE_MAP[state.code() as usize]
}

/// Nominal production rate in parts per hour.
pub fn nominal_rate(station: &str) -> Option<f64> {
    let minutes_per_part = match station {
        "Cleaning" => 4.0,
        "Insulating" | "Press" | "Final Inspection" => 2.0,
        "Winding 1" | "Winding 2" | "Winding 3" => 25.0,
        "Trim and Bind" => 3.0,
        "Oven" => return Some(60.0 * OVEN_BATCH_SIZE as f64 / 260.0),
        "Rework" => 80.0,
        _ => return None,
    };
    Some(60.0 / minutes_per_part)
}

/// Parts produced per output event.
pub fn output_quantity(station: &str) -> f64 {
    if station == OVEN {
        OVEN_BATCH_SIZE as f64
    } else {
        1.0
    }
}

/// Registry holding every station and queue of the line.
pub fn build_registry() -> Result<EntityRegistry, RegistryError> {
    let mut registry = EntityRegistry::new();
    for station in STATIONS {
        registry.insert(Activity::new(station))?;
    }
    for queue in QUEUES {
        registry.insert(Queue::new(queue))?;
    }
    Ok(registry)
}
