//! Applying one timestamp group to the registry.
//!
//! Within a group, Work_In and Work_Out records are applied immediately in
//! source order, each one awaited to completion. State records are held
//! back: only the last State record per entity survives, and the survivors
//! are applied after the whole group has been scanned, in the order their
//! entities were first seen. A part therefore always leaves (or enters) a
//! station before that station's state changes at the same instant.

use tracing::{debug, trace};

use crate::observer::ObserverError;
use crate::record::{Record, RecordEvent, StateCode};
use crate::registry::{EntityId, EntityRegistry};

/// Counts for one dispatched group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    /// Work_In / Work_Out records applied.
    pub work_applied: usize,
    /// State records applied (after collapsing per entity).
    pub states_applied: usize,
    /// State records superseded by a later State for the same entity.
    pub states_superseded: usize,
    /// Records with no effect: unknown object or unhandled event name.
    pub ignored: usize,
    /// Entities created by auto-registration.
    pub registered: usize,
}

/// Applies timestamp groups to an [`EntityRegistry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDispatcher {
    auto_register: bool,
}

impl EventDispatcher {
    /// When `auto_register` is set, unknown object names create a new entity
    /// (a queue if the name contains "Queue", otherwise an activity) instead
    /// of being skipped.
    pub fn new(auto_register: bool) -> Self {
        Self { auto_register }
    }

    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    /// Apply one group of same-timestamp records.
    pub async fn process_group(
        &self,
        records: &[Record],
        registry: &mut EntityRegistry,
    ) -> Result<GroupOutcome, ObserverError> {
        let mut outcome = GroupOutcome::default();
        let mut pending: Vec<(EntityId, &Record, StateCode)> = Vec::new();

        for record in records {
            let Some(id) = self.resolve(&record.object, registry, &mut outcome) else {
                trace!(object = %record.object, "unknown object skipped");
                outcome.ignored += 1;
                continue;
            };

            match &record.event {
                RecordEvent::WorkIn => {
                    if let Some(entity) = registry.entity_mut(id) {
                        trace!(object = %record.object, t = %record.timestamp, "work in");
                        entity.work_in(record).await?;
                        outcome.work_applied += 1;
                    }
                }
                RecordEvent::WorkOut => {
                    if let Some(entity) = registry.entity_mut(id) {
                        trace!(object = %record.object, t = %record.timestamp, "work out");
                        entity.work_out(record).await?;
                        outcome.work_applied += 1;
                    }
                }
                RecordEvent::State(code) => {
                    if let Some(slot) = pending.iter_mut().find(|(eid, _, _)| *eid == id) {
                        slot.1 = record;
                        slot.2 = *code;
                        outcome.states_superseded += 1;
                    } else {
                        pending.push((id, record, *code));
                    }
                }
                RecordEvent::Other(name) => {
                    trace!(object = %record.object, event = %name, "unhandled event ignored");
                    outcome.ignored += 1;
                }
            }
        }

        for (id, record, code) in pending {
            if let Some(entity) = registry.entity_mut(id) {
                trace!(object = %record.object, state = %code, "state update");
                entity.state_update(record, code).await?;
                outcome.states_applied += 1;
            }
        }

        Ok(outcome)
    }

    fn resolve(
        &self,
        name: &str,
        registry: &mut EntityRegistry,
        outcome: &mut GroupOutcome,
    ) -> Option<EntityId> {
        if !self.auto_register {
            return registry.id(name);
        }
        let (id, created) = registry.get_or_register(name);
        if created {
            debug!(object = %name, "auto-registered entity");
            outcome.registered += 1;
        }
        Some(id)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
