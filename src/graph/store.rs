//! In-memory graph storage
//!
//! Arena-backed: node and edge slots are addressed by id, adjacency lists
//! hold edge ids, and two secondary indices serve the staffing access paths
//! (nodes by label, and nodes by `(label, id property)` for upserts).

use super::edge::Edge;
use super::node::Node;
use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, Label, NodeId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Property holding the business key of a node
pub const KEY_PROPERTY: &str = "id";

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),

    #[error("Duplicate key '{key}' for label {label}")]
    DuplicateKey { label: Label, key: String },

    #[error("No {label} with key '{key}'")]
    UnknownKey { label: Label, key: String },

    #[error("Allocation must be in (0, 1], got {0}")]
    InvalidAllocation(f64),

    #[error("Allocation {requested} for candidate {candidate} exceeds remaining headroom {headroom}")]
    AllocationExceeded {
        candidate: String,
        requested: f64,
        headroom: f64,
    },

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory graph storage
#[derive(Debug, Clone)]
pub struct GraphStore {
    /// Node arena (slot = NodeId)
    nodes: Vec<Option<Node>>,

    /// Edge arena (slot = EdgeId)
    edges: Vec<Option<Edge>>,

    /// Outgoing edges for each node slot
    outgoing: Vec<Vec<EdgeId>>,

    /// Incoming edges for each node slot
    incoming: Vec<Vec<EdgeId>>,

    /// Label index for fast lookups
    label_index: HashMap<Label, HashSet<NodeId>>,

    /// Edge type index
    edge_type_index: HashMap<EdgeType, HashSet<EdgeId>>,

    /// Unique business keys per label
    key_index: HashMap<(Label, String), NodeId>,

    live_nodes: usize,
    live_edges: usize,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            // Slot 0 is never used so ids start at 1.
            nodes: vec![None],
            edges: vec![None],
            outgoing: vec![Vec::new()],
            incoming: vec![Vec::new()],
            label_index: HashMap::new(),
            edge_type_index: HashMap::new(),
            key_index: HashMap::new(),
            live_nodes: 0,
            live_edges: 0,
        }
    }

    /// Create a node with a single label and no properties
    pub fn create_node(&mut self, label: impl Into<Label>) -> NodeId {
        self.insert_node(label.into(), PropertyMap::new(), None)
    }

    /// Create a node with properties, enforcing key uniqueness per label
    pub fn create_node_with_properties(
        &mut self,
        label: impl Into<Label>,
        properties: PropertyMap,
    ) -> GraphResult<NodeId> {
        let label = label.into();
        let key = properties
            .get(KEY_PROPERTY)
            .and_then(PropertyValue::as_string)
            .map(str::to_string);

        if let Some(key) = &key {
            if self.key_index.contains_key(&(label.clone(), key.clone())) {
                return Err(GraphError::DuplicateKey { label, key: key.clone() });
            }
        }

        Ok(self.insert_node(label, properties, key))
    }

    fn insert_node(&mut self, label: Label, properties: PropertyMap, key: Option<String>) -> NodeId {
        let node_id = NodeId::new(self.nodes.len() as u64);
        let node = Node::new_with_properties(node_id, vec![label.clone()], properties);

        self.label_index.entry(label.clone()).or_default().insert(node_id);
        if let Some(key) = key {
            self.key_index.insert((label, key), node_id);
        }

        self.nodes.push(Some(node));
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.live_nodes += 1;

        node_id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Look up a node by label and business key
    pub fn find_node(&self, label: &Label, key: &str) -> Option<NodeId> {
        self.key_index.get(&(label.clone(), key.to_string())).copied()
    }

    /// Set a node property, keeping the key index consistent
    pub fn set_node_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Option<PropertyValue>> {
        let key = key.into();
        let value = value.into();

        let node = self.get_node(id).ok_or(GraphError::NodeNotFound(id))?;
        let labels: Vec<Label> = node.labels.iter().cloned().collect();

        if key == KEY_PROPERTY {
            if let Some(new_key) = value.as_string() {
                for label in &labels {
                    match self.key_index.get(&(label.clone(), new_key.to_string())) {
                        Some(existing) if *existing != id => {
                            return Err(GraphError::DuplicateKey {
                                label: label.clone(),
                                key: new_key.to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }

        let node = self
            .nodes
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))?;
        let old = node.set_property(key.clone(), value.clone());

        if key == KEY_PROPERTY {
            for label in labels {
                if let Some(old_key) = old.as_ref().and_then(PropertyValue::as_string) {
                    self.key_index.remove(&(label.clone(), old_key.to_string()));
                }
                if let Some(new_key) = value.as_string() {
                    self.key_index.insert((label, new_key.to_string()), id);
                }
            }
        }

        Ok(old)
    }

    /// Delete a node and every edge attached to it
    pub fn delete_node(&mut self, id: NodeId) -> GraphResult<Node> {
        if !self.has_node(id) {
            return Err(GraphError::NodeNotFound(id));
        }

        let attached: Vec<EdgeId> = self.outgoing[id.slot()]
            .iter()
            .chain(self.incoming[id.slot()].iter())
            .copied()
            .collect();
        for edge_id in attached {
            // Self-loops appear in both lists.
            if self.has_edge(edge_id) {
                self.delete_edge(edge_id)?;
            }
        }

        let node = self.nodes[id.slot()].take().ok_or(GraphError::NodeNotFound(id))?;
        for label in &node.labels {
            if let Some(ids) = self.label_index.get_mut(label) {
                ids.remove(&id);
            }
            if let Some(key) = node.get_str(KEY_PROPERTY) {
                self.key_index.remove(&(label.clone(), key.to_string()));
            }
        }
        self.live_nodes -= 1;

        Ok(node)
    }

    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
    ) -> GraphResult<EdgeId> {
        self.create_edge_with_properties(source, target, edge_type, PropertyMap::new())
    }

    /// Create a directed edge; the insert is all-or-nothing
    pub fn create_edge_with_properties(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
        properties: PropertyMap,
    ) -> GraphResult<EdgeId> {
        if !self.has_node(source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }

        let edge_id = EdgeId::new(self.edges.len() as u64);
        let edge = Edge::new_with_properties(edge_id, source, target, edge_type, properties);

        self.edge_type_index
            .entry(edge.edge_type.clone())
            .or_default()
            .insert(edge_id);
        self.outgoing[source.slot()].push(edge_id);
        self.incoming[target.slot()].push(edge_id);
        self.edges.push(Some(edge));
        self.live_edges += 1;

        Ok(edge_id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn get_edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.slot()).and_then(Option::as_mut)
    }

    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.get_edge(id).is_some()
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> GraphResult<Edge> {
        let edge = self
            .edges
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(GraphError::EdgeNotFound(id))?;

        self.outgoing[edge.source.slot()].retain(|e| *e != id);
        self.incoming[edge.target.slot()].retain(|e| *e != id);
        if let Some(ids) = self.edge_type_index.get_mut(&edge.edge_type) {
            ids.remove(&id);
        }
        self.live_edges -= 1;

        Ok(edge)
    }

    pub fn get_outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.outgoing
            .get(node_id.slot())
            .map(|ids| ids.iter().filter_map(|id| self.get_edge(*id)).collect())
            .unwrap_or_default()
    }

    pub fn get_incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.incoming
            .get(node_id.slot())
            .map(|ids| ids.iter().filter_map(|id| self.get_edge(*id)).collect())
            .unwrap_or_default()
    }

    /// Nodes carrying `label`, in id order
    pub fn get_nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        let mut ids: Vec<NodeId> = self
            .label_index
            .get(label)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids.into_iter().filter_map(|id| self.get_node(id)).collect()
    }

    pub fn get_edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        let mut ids: Vec<EdgeId> = self
            .edge_type_index
            .get(edge_type)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids.into_iter().filter_map(|id| self.get_edge(id)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    pub fn edge_count(&self) -> usize {
        self.live_edges
    }

    pub fn clear(&mut self) {
        *self = GraphStore::new();
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(key: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(KEY_PROPERTY.to_string(), key.into());
        props
    }

    #[test]
    fn test_create_and_get_node() {
        let mut store = GraphStore::new();
        let id = store.create_node_with_properties("Candidate", keyed("c-1")).unwrap();

        assert_eq!(id, NodeId::new(1));
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.find_node(&Label::new("Candidate"), "c-1"), Some(id));
        assert_eq!(store.get_node(id).and_then(|n| n.get_str("id")), Some("c-1"));
    }

    #[test]
    fn test_duplicate_key_rejected_per_label() {
        let mut store = GraphStore::new();
        store.create_node_with_properties("Skill", keyed("python")).unwrap();

        let err = store.create_node_with_properties("Skill", keyed("python")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateKey { .. }));

        // Same key under another label is fine.
        assert!(store.create_node_with_properties("Company", keyed("python")).is_ok());
    }

    #[test]
    fn test_rekey_updates_index() {
        let mut store = GraphStore::new();
        let a = store.create_node_with_properties("Project", keyed("p-1")).unwrap();
        store.create_node_with_properties("Project", keyed("p-2")).unwrap();

        assert!(store.set_node_property(a, "id", "p-2").is_err());
        store.set_node_property(a, "id", "p-3").unwrap();
        assert_eq!(store.find_node(&Label::new("Project"), "p-3"), Some(a));
        assert_eq!(store.find_node(&Label::new("Project"), "p-1"), None);
    }

    #[test]
    fn test_edges_and_adjacency() {
        let mut store = GraphStore::new();
        let c = store.create_node("Candidate");
        let p1 = store.create_node("Project");
        let p2 = store.create_node("Project");

        store.create_edge(c, p1, "ASSIGNED_TO").unwrap();
        store.create_edge(c, p2, "ASSIGNED_TO").unwrap();

        assert_eq!(store.get_outgoing_edges(c).len(), 2);
        assert_eq!(store.get_incoming_edges(p1).len(), 1);
        assert_eq!(store.get_edges_by_type(&EdgeType::new("ASSIGNED_TO")).len(), 2);
    }

    #[test]
    fn test_edge_validation() {
        let mut store = GraphStore::new();
        let c = store.create_node("Candidate");
        let missing = NodeId::new(99);

        assert_eq!(
            store.create_edge(c, missing, "ASSIGNED_TO"),
            Err(GraphError::InvalidEdgeTarget(missing))
        );
        assert_eq!(
            store.create_edge(missing, c, "ASSIGNED_TO"),
            Err(GraphError::InvalidEdgeSource(missing))
        );
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_errors_clone_into_query_errors() {
        let err = GraphError::NodeNotFound(NodeId::new(7));
        let wrapped = crate::query::QueryError::from(err.clone());
        assert_eq!(wrapped.clone(), crate::query::QueryError::Graph(err));
    }

    #[test]
    fn test_delete_node_detaches_edges() {
        let mut store = GraphStore::new();
        let c = store.create_node_with_properties("Candidate", keyed("c-1")).unwrap();
        let p = store.create_node("Project");
        store.create_edge(c, p, "ASSIGNED_TO").unwrap();

        store.delete_node(p).unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.edge_count(), 0);
        assert!(store.get_outgoing_edges(c).is_empty());

        store.delete_node(c).unwrap();
        assert_eq!(store.find_node(&Label::new("Candidate"), "c-1"), None);
    }

    #[test]
    fn test_label_index_is_id_ordered() {
        let mut store = GraphStore::new();
        for _ in 0..5 {
            store.create_node("Candidate");
        }
        store.create_node("Skill");

        let ids: Vec<NodeId> = store
            .get_nodes_by_label(&Label::new("Candidate"))
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
