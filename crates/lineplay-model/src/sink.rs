//! The sink interface: a node table that observers write published values to.
//!
//! Nodes are addressed by slash-separated paths such as
//! `AssemblyLine/Oven/OutputPoint/ProducedMaterialMasterTotal`. A path is
//! resolved once to a [`NodeId`]; reads and writes then go through the id.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lineplay_core::observer::ObserverError;
use serde::Serialize;

// ===========================================================================
// Node ids and values
// ===========================================================================

/// Handle to a resolved node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}", self.0)
    }
}

/// Declared type of a node. Writes of any other kind are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Bool,
    Int32,
    Double,
    Text,
    DateTime,
    Sublot,
}

/// A value published to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Double(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Sublot(MaterialSublot),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int32(_) => ValueKind::Int32,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Sublot(_) => ValueKind::Sublot,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_sublot(&self) -> Option<&MaterialSublot> {
        match self {
            Value::Sublot(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Sublot(s) => write!(
                f,
                "sublot {} x{} ({} nested)",
                s.id,
                s.quantity,
                s.sublots.len()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured material values
// ---------------------------------------------------------------------------

/// A named property attached to a material lot. `value` is `None` when the
/// property is declared but has nothing to report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataValue {
    pub id: String,
    pub value: Option<Value>,
}

impl DataValue {
    pub fn new(id: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialDefinition {
    pub id: String,
    pub properties: Vec<DataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialLot {
    pub id: String,
    pub production_date: Option<DateTime<Utc>>,
    pub material_definition: MaterialDefinition,
    pub properties: Vec<DataValue>,
}

/// A quantity of material produced together, optionally made of nested
/// sublots (an oven batch).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialSublot {
    pub id: String,
    pub quantity: f64,
    pub material_lot: MaterialLot,
    pub sublots: Vec<MaterialSublot>,
}

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("type mismatch writing {path}: node holds {expected:?}, got {found:?}")]
    TypeMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("write to {path} rejected: {reason}")]
    WriteRejected { path: String, reason: String },
}

impl From<SinkError> for ObserverError {
    fn from(err: SinkError) -> Self {
        ObserverError::new(err)
    }
}

// ===========================================================================
// Sink trait
// ===========================================================================

/// Destination for published values.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Resolve a node path. Unknown paths are [`SinkError::NodeNotFound`].
    async fn resolve(&self, path: &str) -> Result<NodeId, SinkError>;

    /// Current value of a node; `None` if it was never written.
    async fn read(&self, node: NodeId) -> Result<Option<Value>, SinkError>;

    async fn write(&self, node: NodeId, value: Value) -> Result<(), SinkError>;
}

/// Read a Double node, treating a never-written node as zero.
pub async fn read_f64(sink: &dyn Sink, node: NodeId) -> Result<f64, SinkError> {
    Ok(sink
        .read(node)
        .await?
        .and_then(|v| v.as_f64())
        .unwrap_or_default())
}
