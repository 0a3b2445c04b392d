use crate::core::error::Result;
use crate::core::model::graph::{ConnectionSpec, ModelGraph, ModelObject, NodeOutput, NodeSpec};
use crate::core::types::{ConnectionId, ObjectId};
use std::collections::BTreeSet;

/// The seam through which components add and remove ephemeral probe nodes.
///
/// Only called while the runtime holds the build lock.
pub trait ModelGraphAdapter {
    /// Insert a node under the root network
    fn add_node(&mut self, label: Option<&str>, node: NodeSpec) -> Result<ObjectId>;

    /// Remove a node that no connection refers to
    fn remove_node(&mut self, id: ObjectId) -> Result<NodeSpec>;

    fn connect(&mut self, spec: ConnectionSpec) -> Result<ConnectionId>;

    fn disconnect(&mut self, id: ConnectionId) -> Result<ConnectionSpec>;

    /// Replace a node's output, returning the previous one
    fn replace_node_output(&mut self, id: ObjectId, output: NodeOutput) -> Result<NodeOutput>;

    fn object(&self, id: ObjectId) -> Option<&ModelObject>;

    /// Identity of every object and connection currently in the graph
    fn snapshot(&self) -> GraphSnapshot;
}

/// Set of object and connection ids at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub objects: BTreeSet<ObjectId>,
    pub connections: BTreeSet<ConnectionId>,
}

impl ModelGraphAdapter for ModelGraph {
    fn add_node(&mut self, label: Option<&str>, node: NodeSpec) -> Result<ObjectId> {
        let root = self.root();
        ModelGraph::add_node(self, root, label, node)
    }

    fn remove_node(&mut self, id: ObjectId) -> Result<NodeSpec> {
        ModelGraph::remove_node(self, id)
    }

    fn connect(&mut self, spec: ConnectionSpec) -> Result<ConnectionId> {
        ModelGraph::connect(self, spec)
    }

    fn disconnect(&mut self, id: ConnectionId) -> Result<ConnectionSpec> {
        ModelGraph::disconnect(self, id)
    }

    fn replace_node_output(&mut self, id: ObjectId, output: NodeOutput) -> Result<NodeOutput> {
        ModelGraph::replace_node_output(self, id, output)
    }

    fn object(&self, id: ObjectId) -> Option<&ModelObject> {
        ModelGraph::object(self, id)
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            objects: self.objects().map(|o| o.id).collect(),
            connections: self.connections().map(|(id, _)| id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_additions() {
        let mut graph = ModelGraph::new();
        let before = graph.snapshot();
        let adapter: &mut dyn ModelGraphAdapter = &mut graph;
        let id = adapter.add_node(Some("probe"), NodeSpec::passthrough(1)).unwrap();
        assert_ne!(adapter.snapshot(), before);
        adapter.remove_node(id).unwrap();
        assert_eq!(adapter.snapshot(), before);
    }
}
