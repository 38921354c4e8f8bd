//! In-memory [`Sink`] backed by a declared node table.

use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::sink::{NodeId, Sink, SinkError, Value, ValueKind};

#[derive(Debug)]
struct Node {
    path: String,
    kind: ValueKind,
    value: Option<Value>,
}

/// Node table held in memory.
///
/// Nodes are declared up front, each with a [`ValueKind`]. Resolving an
/// undeclared path fails, as does writing a value of the wrong kind.
#[derive(Debug, Default)]
pub struct MemorySink {
    by_path: HashMap<String, NodeId>,
    nodes: RwLock<Vec<Node>>,
    fail_paths: RwLock<HashSet<String>>,
    writes: RwLock<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node. Re-declaring a path returns the existing id.
    pub fn declare(&mut self, path: impl Into<String>, kind: ValueKind) -> NodeId {
        let path = path.into();
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let nodes = self.nodes.get_mut();
        let id = NodeId(nodes.len() as u32);
        nodes.push(Node {
            path: path.clone(),
            kind,
            value: None,
        });
        self.by_path.insert(path, id);
        id
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Make every write to `path` fail with [`SinkError::WriteRejected`].
    pub async fn fail_writes_to(&self, path: impl Into<String>) {
        self.fail_paths.write().await.insert(path.into());
    }

    /// Number of successful writes so far.
    pub async fn write_count(&self) -> u64 {
        *self.writes.read().await
    }

    /// Current value at `path`, if declared and written.
    pub async fn value(&self, path: &str) -> Option<Value> {
        let id = self.by_path.get(path)?;
        self.nodes.read().await.get(id.0 as usize)?.value.clone()
    }

    /// Every written node as `(path, value)`, in declaration order.
    pub async fn snapshot(&self) -> Vec<(String, Value)> {
        self.nodes
            .read()
            .await
            .iter()
            .filter_map(|node| Some((node.path.clone(), node.value.clone()?)))
            .collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn resolve(&self, path: &str) -> Result<NodeId, SinkError> {
        self.by_path
            .get(path)
            .copied()
            .ok_or_else(|| SinkError::NodeNotFound(path.to_string()))
    }

    async fn read(&self, node: NodeId) -> Result<Option<Value>, SinkError> {
        let nodes = self.nodes.read().await;
        let slot = nodes
            .get(node.0 as usize)
            .ok_or(SinkError::UnknownNode(node))?;
        Ok(slot.value.clone())
    }

    async fn write(&self, node: NodeId, value: Value) -> Result<(), SinkError> {
        let mut nodes = self.nodes.write().await;
        let slot = nodes
            .get_mut(node.0 as usize)
            .ok_or(SinkError::UnknownNode(node))?;
        if slot.kind != value.kind() {
            return Err(SinkError::TypeMismatch {
                path: slot.path.clone(),
                expected: slot.kind,
                found: value.kind(),
            });
        }
        if self.fail_paths.read().await.contains(&slot.path) {
            return Err(SinkError::WriteRejected {
                path: slot.path.clone(),
                reason: "injected failure".to_string(),
            });
        }
        trace!(path = %slot.path, %value, "node written");
        slot.value = Some(value);
        *self.writes.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> MemorySink {
        let mut sink = MemorySink::new();
        sink.declare("Line/Total", ValueKind::Double);
        sink.declare("Line/Held", ValueKind::Bool);
        sink
    }

    #[tokio::test]
    async fn resolve_declared_and_undeclared() {
        let sink = sink();
        assert!(sink.resolve("Line/Total").await.is_ok());
        assert_eq!(
            sink.resolve("Line/Missing").await,
            Err(SinkError::NodeNotFound("Line/Missing".to_string()))
        );
    }

    #[tokio::test]
    async fn read_before_write_is_none() {
        let sink = sink();
        let id = sink.resolve("Line/Total").await.unwrap();
        assert_eq!(sink.read(id).await.unwrap(), None);

        sink.write(id, Value::Double(3.0)).await.unwrap();
        assert_eq!(sink.read(id).await.unwrap(), Some(Value::Double(3.0)));
        assert_eq!(sink.write_count().await, 1);
    }

    #[tokio::test]
    async fn wrong_kind_rejected() {
        let sink = sink();
        let id = sink.resolve("Line/Held").await.unwrap();
        let err = sink.write(id, Value::Int32(1)).await.unwrap_err();
        assert!(matches!(
            err,
            SinkError::TypeMismatch {
                expected: ValueKind::Bool,
                found: ValueKind::Int32,
                ..
            }
        ));
        assert_eq!(sink.write_count().await, 0);
    }

    #[tokio::test]
    async fn redeclare_returns_same_id() {
        let mut sink = sink();
        let first = sink.resolve("Line/Total").await.unwrap();
        assert_eq!(sink.declare("Line/Total", ValueKind::Double), first);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_in_declaration_order() {
        let sink = sink();
        let held = sink.resolve("Line/Held").await.unwrap();
        let total = sink.resolve("Line/Total").await.unwrap();
        sink.write(held, Value::Bool(true)).await.unwrap();
        sink.write(total, Value::Double(2.0)).await.unwrap();

        let snap = sink.snapshot().await;
        assert_eq!(
            snap,
            vec![
                ("Line/Total".to_string(), Value::Double(2.0)),
                ("Line/Held".to_string(), Value::Bool(true)),
            ]
        );
    }

    #[tokio::test]
    async fn injected_failure() {
        let sink = sink();
        sink.fail_writes_to("Line/Total").await;
        let id = sink.resolve("Line/Total").await.unwrap();
        let err = sink.write(id, Value::Double(1.0)).await.unwrap_err();
        assert!(matches!(err, SinkError::WriteRejected { .. }));
        assert_eq!(sink.value("Line/Total").await, None);
    }

    #[tokio::test]
    async fn unknown_id() {
        let sink = sink();
        let err = sink.read(NodeId(99)).await.unwrap_err();
        assert_eq!(err, SinkError::UnknownNode(NodeId(99)));
    }
}
