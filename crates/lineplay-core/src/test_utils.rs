//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so downstream
//! crates can enable them through the `test-utils` feature.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::entity::{Activity, Hook, Queue};
use crate::observer::{Observer, ObserverError, ObserverRef, observer_fn};
use crate::record::{RawRecord, Record, StateCode, field};
use crate::registry::EntityRegistry;
use crate::time::SimTime;

// ===========================================================================
// Record builders
// ===========================================================================

/// A raw record with the four core columns. Pass an empty `value` for
/// non-State events.
pub fn raw_record(timestamp: &str, object: &str, event: &str, value: &str) -> RawRecord {
    [
        (field::TIMESTAMP, timestamp),
        (field::OBJECT, object),
        (field::EVENT_NAME, event),
        (field::EVENT_VALUE, value),
    ]
    .into_iter()
    .collect()
}

/// A raw Work_In / Work_Out record carrying a serial number.
pub fn raw_part(timestamp: &str, object: &str, event: &str, serial: &str) -> RawRecord {
    let mut raw = raw_record(timestamp, object, event, "");
    raw.insert(field::SERIAL_NUM, serial);
    raw
}

/// A raw State record.
pub fn raw_state(timestamp: &str, object: &str, value: u8) -> RawRecord {
    raw_record(timestamp, object, "State", &value.to_string())
}

pub fn work_in(timestamp: &str, object: &str, serial: &str) -> Record {
    parsed(raw_part(timestamp, object, "Work_In", serial))
}

pub fn work_out(timestamp: &str, object: &str, serial: &str) -> Record {
    parsed(raw_part(timestamp, object, "Work_Out", serial))
}

pub fn state(timestamp: &str, object: &str, value: u8) -> Record {
    parsed(raw_state(timestamp, object, value))
}

fn parsed(raw: RawRecord) -> Record {
    Record::parse(&raw).expect("test record should parse")
}

/// Wrap raw records as an infallible source.
pub fn ok_feed(records: Vec<RawRecord>) -> Vec<Result<RawRecord, Infallible>> {
    records.into_iter().map(Ok).collect()
}

// ===========================================================================
// Recording observers
// ===========================================================================

/// One observed notification.
#[derive(Debug, Clone)]
pub struct Call {
    pub object: String,
    pub label: String,
    pub time: SimTime,
    /// Activity processing time at notification (None for queues).
    pub process_time: Option<SimTime>,
    /// Activity state at notification (None for queues).
    pub state: Option<StateCode>,
    /// Queue length at notification (None for activities).
    pub queue_len: Option<usize>,
    /// Runtime clock reading at notification.
    pub at: tokio::time::Instant,
}

/// Shared, append-only log of observer notifications.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

struct RecordingObserver {
    log: CallLog,
    label: String,
}

impl RecordingObserver {
    fn push(
        &self,
        record: &Record,
        process_time: Option<SimTime>,
        state: Option<StateCode>,
        queue_len: Option<usize>,
    ) {
        let call = Call {
            object: record.object.clone(),
            label: self.label.clone(),
            time: record.timestamp,
            process_time,
            state,
            queue_len,
            at: tokio::time::Instant::now(),
        };
        self.log.calls.lock().expect("call log poisoned").push(call);
    }
}

#[async_trait]
impl Observer<Activity> for RecordingObserver {
    async fn notify(&self, record: &Record, entity: &Activity) -> Result<(), ObserverError> {
        self.push(record, Some(entity.process_time()), Some(entity.state()), None);
        Ok(())
    }
}

#[async_trait]
impl Observer<Queue> for RecordingObserver {
    async fn notify(&self, record: &Record, entity: &Queue) -> Result<(), ObserverError> {
        self.push(record, None, None, Some(entity.len()));
        Ok(())
    }
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_observer(&self, label: &str) -> ObserverRef<Activity> {
        Arc::new(RecordingObserver {
            log: self.clone(),
            label: label.to_string(),
        })
    }

    pub fn queue_observer(&self, label: &str) -> ObserverRef<Queue> {
        Arc::new(RecordingObserver {
            log: self.clone(),
            label: label.to_string(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    /// `(object, label)` pairs in notification order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .map(|c| (c.object, c.label))
            .collect()
    }

    /// Record timestamps in notification order.
    pub fn group_times(&self) -> Vec<SimTime> {
        self.calls().into_iter().map(|c| c.time).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().expect("call log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An observer that always fails with `message`.
pub fn failing_observer<E: Sync + 'static>(message: &str) -> ObserverRef<E> {
    let message = message.to_string();
    observer_fn(move |_record: &Record, _entity: &E| Err(ObserverError::new(message.clone())))
}

/// Registry of `names` with every hook of every entity recorded into `log`.
/// Activity hooks are labelled `work_in`, `work_out` and `state`; queue hooks
/// `q_in` and `q_out`.
pub fn recorded_registry(names: &[&str], log: &CallLog) -> EntityRegistry {
    let mut reg = EntityRegistry::from_names(names.iter().copied()).expect("unique test names");
    for name in names {
        if let Some(a) = reg.activity_mut(name) {
            a.subscribe(Hook::WorkIn, log.activity_observer("work_in"));
            a.subscribe(Hook::WorkOut, log.activity_observer("work_out"));
            a.subscribe(Hook::StateUpdate, log.activity_observer("state"));
        } else if let Some(q) = reg.queue_mut(name) {
            q.subscribe(Hook::WorkIn, log.queue_observer("q_in"));
            q.subscribe(Hook::WorkOut, log.queue_observer("q_out"));
        }
    }
    reg
}
