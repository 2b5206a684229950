//! Canvas State: a spatial graph of UI components shared between the
//! agent loop (as a tool extension) and the WebSocket bridge (as a
//! subscriber that mirrors it to connected clients).
//!
//! Mutations are serialized per canvas via an internal lock and each one
//! emits exactly one [`CanvasChange`] on the change stream (§5 "Shared
//! resources").

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An A2UI component descriptor (§6 "Canvas WebSocket protocol").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentKind {
    Card { title: String, body: String },
    Chart { series_json: String },
    Form { fields_json: String },
    Button { label: String, action: String },
    TextField { label: String, value: String },
    DataTable { columns: Vec<String>, rows_json: String },
    CodeBlock { language: String, code: String },
    Markdown { text: String },
    Image { url: String, alt: String },
    Progress { value: f32, label: Option<String> },
    Status { state: String, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// One node in the canvas: an A2UI component placed at a 2-D position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    pub component: ComponentKind,
    pub position: Position,
    pub size: Option<Size>,
    pub rotation: Option<f64>,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// One observable mutation of a [`CanvasState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasChange {
    AddNode { node: Node },
    UpdateNode { node: Node },
    RemoveNode { id: String },
    AddEdge { edge: Edge },
    RemoveEdge { id: String },
    Clear,
}

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    #[error("edge '{0}' not found")]
    EdgeNotFound(String),
    #[error("edge references unknown node '{0}'")]
    DanglingEdgeEndpoint(String),
    #[error("node id '{0}' already exists")]
    DuplicateNodeId(String),
    #[error("canvas is at its component cap of {0}")]
    AtCapacity(usize),
}

struct Inner {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
}

/// A set of Nodes and directed Edges, capped at `max_components`,
/// mutations observable through [`CanvasState::subscribe`].
pub struct CanvasState {
    inner: RwLock<Inner>,
    max_components: usize,
    changes: broadcast::Sender<CanvasChange>,
}

impl CanvasState {
    pub fn new(max_components: usize) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            inner: RwLock::new(Inner { nodes: HashMap::new(), edges: HashMap::new() }),
            max_components,
            changes: tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CanvasChange> {
        self.changes.subscribe()
    }

    fn emit(&self, change: CanvasChange) {
        let _ = self.changes.send(change);
    }

    pub fn add_node(&self, node: Node) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        if guard.nodes.contains_key(&node.id) {
            return Err(CanvasError::DuplicateNodeId(node.id));
        }
        if guard.nodes.len() >= self.max_components {
            return Err(CanvasError::AtCapacity(self.max_components));
        }
        guard.nodes.insert(node.id.clone(), node.clone());
        drop(guard);
        self.emit(CanvasChange::AddNode { node });
        Ok(())
    }

    pub fn update_node(&self, node: Node) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        if !guard.nodes.contains_key(&node.id) {
            return Err(CanvasError::NodeNotFound(node.id));
        }
        guard.nodes.insert(node.id.clone(), node.clone());
        drop(guard);
        self.emit(CanvasChange::UpdateNode { node });
        Ok(())
    }

    pub fn remove_node(&self, id: &str) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        if guard.nodes.remove(id).is_none() {
            return Err(CanvasError::NodeNotFound(id.to_string()));
        }
        guard.edges.retain(|_, e| e.from != id && e.to != id);
        drop(guard);
        self.emit(CanvasChange::RemoveNode { id: id.to_string() });
        Ok(())
    }

    pub fn add_edge(&self, edge: Edge) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        if !guard.nodes.contains_key(&edge.from) {
            return Err(CanvasError::DanglingEdgeEndpoint(edge.from));
        }
        if !guard.nodes.contains_key(&edge.to) {
            return Err(CanvasError::DanglingEdgeEndpoint(edge.to));
        }
        guard.edges.insert(edge.id.clone(), edge.clone());
        drop(guard);
        self.emit(CanvasChange::AddEdge { edge });
        Ok(())
    }

    /// Repositions an existing node, emitting `UpdateNode`. Used by the
    /// canvas WebSocket bridge's `c2s:drag` handler.
    pub fn move_node(&self, id: &str, position: Position) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        let node = guard.nodes.get_mut(id).ok_or_else(|| CanvasError::NodeNotFound(id.to_string()))?;
        node.position = position;
        let updated = node.clone();
        drop(guard);
        self.emit(CanvasChange::UpdateNode { node: updated });
        Ok(())
    }

    pub fn remove_edge(&self, id: &str) -> Result<(), CanvasError> {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        if guard.edges.remove(id).is_none() {
            return Err(CanvasError::EdgeNotFound(id.to_string()));
        }
        drop(guard);
        self.emit(CanvasChange::RemoveEdge { id: id.to_string() });
        Ok(())
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("canvas lock poisoned");
        guard.nodes.clear();
        guard.edges.clear();
        drop(guard);
        self.emit(CanvasChange::Clear);
    }

    /// A full point-in-time snapshot, sent to a client on WebSocket connect.
    pub fn snapshot(&self) -> (Vec<Node>, Vec<Edge>) {
        let guard = self.inner.read().expect("canvas lock poisoned");
        (guard.nodes.values().cloned().collect(), guard.edges.values().cloned().collect())
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().expect("canvas lock poisoned").nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str) -> Node {
        Node {
            id: id.to_string(),
            component: ComponentKind::Card { title: "t".into(), body: "b".into() },
            position: Position::default(),
            size: None,
            rotation: None,
        }
    }

    #[test]
    fn add_node_then_snapshot_contains_it() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        let (nodes, _edges) = canvas.snapshot();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "n1");
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        assert!(matches!(canvas.add_node(card("n1")), Err(CanvasError::DuplicateNodeId(_))));
    }

    #[test]
    fn capacity_cap_enforced() {
        let canvas = CanvasState::new(1);
        canvas.add_node(card("n1")).unwrap();
        assert!(matches!(canvas.add_node(card("n2")), Err(CanvasError::AtCapacity(1))));
    }

    #[test]
    fn edge_requires_existing_nodes() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        let result = canvas.add_edge(Edge { id: "e1".into(), from: "n1".into(), to: "missing".into() });
        assert!(matches!(result, Err(CanvasError::DanglingEdgeEndpoint(_))));
    }

    #[test]
    fn remove_node_also_drops_incident_edges() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        canvas.add_node(card("n2")).unwrap();
        canvas.add_edge(Edge { id: "e1".into(), from: "n1".into(), to: "n2".into() }).unwrap();
        canvas.remove_node("n1").unwrap();
        let (_nodes, edges) = canvas.snapshot();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn mutation_emits_one_change_event() {
        let canvas = CanvasState::new(10);
        let mut rx = canvas.subscribe();
        canvas.add_node(card("n1")).unwrap();
        let change = rx.recv().await.unwrap();
        assert!(matches!(change, CanvasChange::AddNode { .. }));
    }

    #[test]
    fn move_node_updates_position() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        canvas.move_node("n1", Position { x: 5.0, y: 7.0 }).unwrap();
        let (nodes, _edges) = canvas.snapshot();
        assert_eq!(nodes[0].position, Position { x: 5.0, y: 7.0 });
    }

    #[test]
    fn move_missing_node_errors() {
        let canvas = CanvasState::new(10);
        assert!(matches!(canvas.move_node("missing", Position::default()), Err(CanvasError::NodeNotFound(_))));
    }

    #[test]
    fn clear_removes_everything() {
        let canvas = CanvasState::new(10);
        canvas.add_node(card("n1")).unwrap();
        canvas.clear();
        assert_eq!(canvas.node_count(), 0);
    }
}
