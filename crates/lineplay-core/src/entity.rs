//! Stateful model entities: activities (stations) and queues (buffers).
//!
//! An [`Activity`] carries a state code and accrues processing time while it
//! is Working. Accrual happens before observers run, so a work-out observer
//! sees the full processing time of the part leaving; the reset to zero
//! happens only after every work-out observer has completed.
//!
//! A [`Queue`] tracks the parts currently inside it by serial number.

use tracing::trace;

use crate::observer::{ObserverError, ObserverRef, notify_all};
use crate::record::{Record, StateCode};
use crate::time::SimTime;

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Which entity operation an observer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    WorkIn,
    WorkOut,
    StateUpdate,
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// A station with a discrete state and processing-time accrual.
pub struct Activity {
    name: String,
    state: StateCode,
    last_timestamp: SimTime,
    last_part_out: SimTime,
    process_time: SimTime,
    on_work_in: Vec<ObserverRef<Activity>>,
    on_work_out: Vec<ObserverRef<Activity>>,
    on_state_update: Vec<ObserverRef<Activity>>,
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activity")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("last_timestamp", &self.last_timestamp)
            .field("last_part_out", &self.last_part_out)
            .field("process_time", &self.process_time)
            .field("on_work_in", &self.on_work_in.len())
            .field("on_work_out", &self.on_work_out.len())
            .field("on_state_update", &self.on_state_update.len())
            .finish()
    }
}

impl Activity {
    /// Create an idle activity at time zero.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StateCode::default(),
            last_timestamp: SimTime::ZERO,
            last_part_out: SimTime::ZERO,
            process_time: SimTime::ZERO,
            on_work_in: Vec::new(),
            on_work_out: Vec::new(),
            on_state_update: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StateCode {
        self.state
    }

    /// Time of the last record applied to this activity.
    pub fn last_timestamp(&self) -> SimTime {
        self.last_timestamp
    }

    /// Time of the last Work_Out.
    pub fn last_part_out(&self) -> SimTime {
        self.last_part_out
    }

    /// Working time accrued for the part currently in process.
    pub fn process_time(&self) -> SimTime {
        self.process_time
    }

    /// Register an observer on one of the activity's hooks. Observers run in
    /// registration order.
    pub fn subscribe(&mut self, hook: Hook, observer: ObserverRef<Activity>) {
        match hook {
            Hook::WorkIn => self.on_work_in.push(observer),
            Hook::WorkOut => self.on_work_out.push(observer),
            Hook::StateUpdate => self.on_state_update.push(observer),
        }
    }

    /// Number of observers registered on `hook`.
    pub fn observer_count(&self, hook: Hook) -> usize {
        match hook {
            Hook::WorkIn => self.on_work_in.len(),
            Hook::WorkOut => self.on_work_out.len(),
            Hook::StateUpdate => self.on_state_update.len(),
        }
    }

    /// A part arrives.
    pub async fn work_in(&mut self, record: &Record) -> Result<(), ObserverError> {
        notify_all(&self.on_work_in, record, &*self).await?;
        self.last_timestamp = record.timestamp;
        Ok(())
    }

    /// A part leaves. Accrues processing time first, notifies, then resets
    /// the accrual.
    pub async fn work_out(&mut self, record: &Record) -> Result<(), ObserverError> {
        self.accrue(record.timestamp);
        notify_all(&self.on_work_out, record, &*self).await?;
        self.process_time = SimTime::ZERO;
        self.last_part_out = record.timestamp;
        self.last_timestamp = record.timestamp;
        Ok(())
    }

    /// The activity changes state. Processing time accrued so far is kept
    /// and carries into the next Working interval.
    pub async fn state_update(
        &mut self,
        record: &Record,
        state: StateCode,
    ) -> Result<(), ObserverError> {
        self.accrue(record.timestamp);
        notify_all(&self.on_state_update, record, &*self).await?;
        trace!(activity = %self.name, from = %self.state, to = %state, "state change");
        self.state = state;
        self.last_timestamp = record.timestamp;
        Ok(())
    }

    fn accrue(&mut self, now: SimTime) {
        if self.state.is_working() {
            self.process_time += now - self.last_timestamp;
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A buffer holding in-flight parts, keyed by serial number.
pub struct Queue {
    name: String,
    parts: Vec<Record>,
    on_work_in: Vec<ObserverRef<Queue>>,
    on_work_out: Vec<ObserverRef<Queue>>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("parts", &self.parts.len())
            .field("on_work_in", &self.on_work_in.len())
            .field("on_work_out", &self.on_work_out.len())
            .finish()
    }
}

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
            on_work_in: Vec::new(),
            on_work_out: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parts currently held, oldest first.
    pub fn parts(&self) -> &[Record] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Register an observer. Queues have no state-update hook; subscribing
    /// to it is a no-op.
    pub fn subscribe(&mut self, hook: Hook, observer: ObserverRef<Queue>) {
        match hook {
            Hook::WorkIn => self.on_work_in.push(observer),
            Hook::WorkOut => self.on_work_out.push(observer),
            Hook::StateUpdate => {}
        }
    }

    pub fn observer_count(&self, hook: Hook) -> usize {
        match hook {
            Hook::WorkIn => self.on_work_in.len(),
            Hook::WorkOut => self.on_work_out.len(),
            Hook::StateUpdate => 0,
        }
    }

    /// A part enters the buffer.
    pub async fn work_in(&mut self, record: &Record) -> Result<(), ObserverError> {
        self.parts.push(record.clone());
        notify_all(&self.on_work_in, record, &*self).await
    }

    /// A part leaves the buffer. Removes the first held part with the same
    /// serial number, if any.
    pub async fn work_out(&mut self, record: &Record) -> Result<(), ObserverError> {
        if let Some(pos) = self
            .parts
            .iter()
            .position(|p| p.serial_num == record.serial_num)
        {
            self.parts.remove(pos);
        }
        notify_all(&self.on_work_out, record, &*self).await
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Discriminant of an [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Activity,
    Queue,
}

impl EntityKind {
    /// Kind chosen for a name seen for the first time: a queue if the name
    /// contains "Queue", otherwise an activity.
    pub fn infer(name: &str) -> Self {
        if name.contains("Queue") {
            EntityKind::Queue
        } else {
            EntityKind::Activity
        }
    }
}

/// A station or buffer in the model.
#[derive(Debug)]
pub enum Entity {
    Activity(Activity),
    Queue(Queue),
}

impl Entity {
    /// Create an entity of the given kind.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        match kind {
            EntityKind::Activity => Entity::Activity(Activity::new(name)),
            EntityKind::Queue => Entity::Queue(Queue::new(name)),
        }
    }

    /// Create an entity whose kind is inferred from its name.
    pub fn for_name(name: &str) -> Self {
        Self::new(EntityKind::infer(name), name)
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Activity(a) => a.name(),
            Entity::Queue(q) => q.name(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Activity(_) => EntityKind::Activity,
            Entity::Queue(_) => EntityKind::Queue,
        }
    }

    pub fn as_activity(&self) -> Option<&Activity> {
        match self {
            Entity::Activity(a) => Some(a),
            Entity::Queue(_) => None,
        }
    }

    pub fn as_activity_mut(&mut self) -> Option<&mut Activity> {
        match self {
            Entity::Activity(a) => Some(a),
            Entity::Queue(_) => None,
        }
    }

    pub fn as_queue(&self) -> Option<&Queue> {
        match self {
            Entity::Queue(q) => Some(q),
            Entity::Activity(_) => None,
        }
    }

    pub fn as_queue_mut(&mut self) -> Option<&mut Queue> {
        match self {
            Entity::Queue(q) => Some(q),
            Entity::Activity(_) => None,
        }
    }

    pub async fn work_in(&mut self, record: &Record) -> Result<(), ObserverError> {
        match self {
            Entity::Activity(a) => a.work_in(record).await,
            Entity::Queue(q) => q.work_in(record).await,
        }
    }

    pub async fn work_out(&mut self, record: &Record) -> Result<(), ObserverError> {
        match self {
            Entity::Activity(a) => a.work_out(record).await,
            Entity::Queue(q) => q.work_out(record).await,
        }
    }

    /// Apply a state change. Queues carry no state, so this is a no-op for
    /// them.
    pub async fn state_update(
        &mut self,
        record: &Record,
        state: StateCode,
    ) -> Result<(), ObserverError> {
        match self {
            Entity::Activity(a) => a.state_update(record, state).await,
            Entity::Queue(_) => Ok(()),
        }
    }
}

impl From<Activity> for Entity {
    fn from(a: Activity) -> Self {
        Entity::Activity(a)
    }
}

impl From<Queue> for Entity {
    fn from(q: Queue) -> Self {
        Entity::Queue(q)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
