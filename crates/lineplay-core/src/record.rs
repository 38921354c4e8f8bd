//! Timeline records.
//!
//! A record source yields [`RawRecord`] field maps keyed by the column names
//! declared in the feed header. The replayer parses each surviving raw record
//! exactly once into a typed [`Record`]; everything downstream works with the
//! typed value and never re-checks field presence.

use std::collections::HashMap;
use std::fmt;

use crate::time::{SimTime, parse_sim_time};

/// Column names recognised in a feed.
pub mod field {
    pub const TIMESTAMP: &str = "Timestamp";
    pub const OBJECT: &str = "Object";
    pub const EVENT_NAME: &str = "Event_Name";
    pub const EVENT_VALUE: &str = "Event_Value";
    pub const SERIAL_NUM: &str = "Serial_Num";
    pub const TYPE_ID: &str = "Type_ID";
    pub const REWORKED: &str = "Reworked";
    pub const OVEN_BATCH: &str = "OvenBatch";
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while turning a raw record into a typed [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("state code {value} is outside the known range 0-7")]
    UnknownState { value: String },
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// An untyped record: field name to string value, as read from the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Look up a field by column name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The Timestamp text, or `None` when it is absent or empty. Records
    /// without a timestamp are dropped before grouping.
    pub fn timestamp_text(&self) -> Option<&str> {
        self.get(field::TIMESTAMP).filter(|t| !t.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateCode
// ---------------------------------------------------------------------------

/// Activity state code, 0 through 7.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct StateCode(u8);

impl StateCode {
    pub const STARVED: StateCode = StateCode(0);
    pub const WORKING: StateCode = StateCode(1);
    pub const BLOCKED: StateCode = StateCode(2);
    pub const CHANGEOVER: StateCode = StateCode(3);
    pub const BREAKDOWN: StateCode = StateCode(4);
    pub const OFF_SHIFT: StateCode = StateCode(5);
    pub const RESOURCE_STARVED: StateCode = StateCode(6);
    pub const MAINTENANCE: StateCode = StateCode(7);

    /// Number of distinct state codes.
    pub const COUNT: usize = 8;

    /// Returns `None` for codes above 7.
    pub fn new(code: u8) -> Option<Self> {
        (usize::from(code) < Self::COUNT).then_some(Self(code))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// Whether processing time accrues in this state.
    pub fn is_working(self) -> bool {
        self == Self::WORKING
    }

    /// Short human label.
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "starved",
            1 => "working",
            2 => "blocked",
            3 => "changeover",
            4 => "breakdown",
            5 => "off-shift",
            6 => "resource-starved",
            _ => "maintenance",
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// What a record does to its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    WorkIn,
    WorkOut,
    State(StateCode),
    /// An event name the model does not act on. Carried so the entity it
    /// names can still be auto-registered.
    Other(String),
}

impl RecordEvent {
    /// The feed spelling of this event.
    pub fn name(&self) -> &str {
        match self {
            RecordEvent::WorkIn => "Work_In",
            RecordEvent::WorkOut => "Work_Out",
            RecordEvent::State(_) => "State",
            RecordEvent::Other(name) => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One typed timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Parsed simulated time.
    pub timestamp: SimTime,
    /// Timestamp exactly as written in the feed; records group on this text.
    pub timestamp_text: String,
    /// Name of the entity the event targets.
    pub object: String,
    pub event: RecordEvent,
    pub serial_num: Option<String>,
    pub type_id: Option<u32>,
    /// Set whenever the Reworked column is present and non-empty.
    pub reworked: bool,
    pub oven_batch: Option<i32>,
}

impl Record {
    /// Parse and validate a raw record.
    pub fn parse(raw: &RawRecord) -> Result<Self, RecordError> {
        let timestamp_text = raw
            .timestamp_text()
            .ok_or(RecordError::MissingField {
                field: field::TIMESTAMP,
            })?
            .to_string();
        let timestamp = parse_timestamp(&timestamp_text)?;

        let object = required(raw, field::OBJECT)?.to_string();
        let event = match required(raw, field::EVENT_NAME)? {
            "Work_In" => RecordEvent::WorkIn,
            "Work_Out" => RecordEvent::WorkOut,
            "State" => RecordEvent::State(parse_state(raw)?),
            other => RecordEvent::Other(other.to_string()),
        };

        Ok(Self {
            timestamp,
            timestamp_text,
            object,
            event,
            serial_num: optional(raw, field::SERIAL_NUM).map(str::to_string),
            type_id: optional_number(raw, field::TYPE_ID)?,
            reworked: optional(raw, field::REWORKED).is_some(),
            oven_batch: optional_number(raw, field::OVEN_BATCH)?,
        })
    }

    /// The new state carried by a State record.
    pub fn state(&self) -> Option<StateCode> {
        match self.event {
            RecordEvent::State(code) => Some(code),
            _ => None,
        }
    }
}

/// Parse a Timestamp value, mapping failures to [`RecordError`].
pub fn parse_timestamp(text: &str) -> Result<SimTime, RecordError> {
    parse_sim_time(text).map_err(|_| RecordError::InvalidNumber {
        field: field::TIMESTAMP,
        value: text.to_string(),
    })
}

fn required<'a>(raw: &'a RawRecord, name: &'static str) -> Result<&'a str, RecordError> {
    raw.get(name)
        .ok_or(RecordError::MissingField { field: name })
}

fn optional<'a>(raw: &'a RawRecord, name: &str) -> Option<&'a str> {
    raw.get(name).filter(|v| !v.trim().is_empty())
}

fn optional_number<T: std::str::FromStr>(
    raw: &RawRecord,
    name: &'static str,
) -> Result<Option<T>, RecordError> {
    optional(raw, name)
        .map(|v| {
            v.trim().parse::<T>().map_err(|_| RecordError::InvalidNumber {
                field: name,
                value: v.to_string(),
            })
        })
        .transpose()
}

fn parse_state(raw: &RawRecord) -> Result<StateCode, RecordError> {
    let text = optional(raw, field::EVENT_VALUE).ok_or(RecordError::MissingField {
        field: field::EVENT_VALUE,
    })?;
    let value: i64 = text.trim().parse().map_err(|_| RecordError::InvalidNumber {
        field: field::EVENT_VALUE,
        value: text.to_string(),
    })?;
    u8::try_from(value)
        .ok()
        .and_then(StateCode::new)
        .ok_or(RecordError::UnknownState {
            value: text.to_string(),
        })
}
