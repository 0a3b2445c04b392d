use crate::core::error::{Result, VizError};
use crate::core::model::validator::ConnectionValidator;
use crate::core::spa::SharedVocab;
use crate::core::types::{ConnectionId, Endpoint, ObjectId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Function evaluated by a node every step: `(t, input) -> output`
pub type NodeFn = Arc<dyn Fn(f64, &[f64]) -> Vec<f64> + Send + Sync>;

/// How a node produces its output
#[derive(Clone)]
pub enum NodeOutput {
    /// Fixed output vector
    Constant(Vec<f64>),
    /// Output computed by a function of time and input
    Function { size_out: usize, f: NodeFn },
    /// Output equals input
    Passthrough,
}

impl NodeOutput {
    /// Wrap a closure as a node function
    pub fn function<F>(size_out: usize, f: F) -> Self
    where
        F: Fn(f64, &[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        NodeOutput::Function {
            size_out,
            f: Arc::new(f),
        }
    }

    /// Evaluate the output at time `t` for the given input
    pub fn evaluate(&self, t: f64, input: &[f64]) -> Vec<f64> {
        match self {
            NodeOutput::Constant(v) => v.clone(),
            NodeOutput::Function { f, .. } => f(t, input),
            NodeOutput::Passthrough => input.to_vec(),
        }
    }
}

impl std::fmt::Debug for NodeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeOutput::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            NodeOutput::Function { size_out, .. } => {
                f.debug_struct("Function").field("size_out", size_out).finish()
            }
            NodeOutput::Passthrough => write!(f, "Passthrough"),
        }
    }
}

/// A node: a vector-valued input/output object
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub size_in: usize,
    pub output: NodeOutput,
}

impl NodeSpec {
    pub fn new(size_in: usize, output: NodeOutput) -> Self {
        Self { size_in, output }
    }

    pub fn constant(values: Vec<f64>) -> Self {
        Self::new(0, NodeOutput::Constant(values))
    }

    pub fn passthrough(size: usize) -> Self {
        Self::new(size, NodeOutput::Passthrough)
    }

    pub fn size_out(&self) -> usize {
        match &self.output {
            NodeOutput::Constant(v) => v.len(),
            NodeOutput::Function { size_out, .. } => *size_out,
            NodeOutput::Passthrough => self.size_in,
        }
    }
}

/// A population of neurons representing a vector
#[derive(Debug, Clone)]
pub struct EnsembleSpec {
    pub n_neurons: usize,
    pub dimensions: usize,
    pub seed: Option<u64>,
}

impl EnsembleSpec {
    pub fn new(n_neurons: usize, dimensions: usize) -> Self {
        Self {
            n_neurons,
            dimensions,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A named input/output pair of a semantic-pointer module
#[derive(Clone)]
pub struct SpaTarget {
    pub output: ObjectId,
    pub output_vocab: SharedVocab,
    pub input: ObjectId,
    pub input_vocab: SharedVocab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKindName {
    Network,
    Node,
    Ensemble,
}

impl ObjectKindName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKindName::Network => "Network",
            ObjectKindName::Node => "Node",
            ObjectKindName::Ensemble => "Ensemble",
        }
    }

    /// Prefix used when generating identifiers for unnamed objects
    pub fn uid_prefix(&self) -> &'static str {
        match self {
            ObjectKindName::Network => "network",
            ObjectKindName::Node => "node",
            ObjectKindName::Ensemble => "ensemble",
        }
    }
}

#[derive(Clone)]
pub enum ObjectKind {
    Network {
        spa_targets: BTreeMap<String, SpaTarget>,
    },
    Node(NodeSpec),
    Ensemble(EnsembleSpec),
}

/// An object in the model graph
#[derive(Clone)]
pub struct ModelObject {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    pub label: Option<String>,
    pub kind: ObjectKind,
}

impl ModelObject {
    pub fn kind_name(&self) -> ObjectKindName {
        match self.kind {
            ObjectKind::Network { .. } => ObjectKindName::Network,
            ObjectKind::Node(_) => ObjectKindName::Node,
            ObjectKind::Ensemble(_) => ObjectKindName::Ensemble,
        }
    }

    pub fn as_node(&self) -> Option<&NodeSpec> {
        match &self.kind {
            ObjectKind::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_ensemble(&self) -> Option<&EnsembleSpec> {
        match &self.kind {
            ObjectKind::Ensemble(ens) => Some(ens),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self.kind, ObjectKind::Network { .. })
    }

    /// Width of the vector produced at `endpoint` of this object
    pub fn output_size(&self, endpoint: &Endpoint) -> Option<usize> {
        match (&self.kind, endpoint) {
            (ObjectKind::Node(node), Endpoint::Value(_)) => Some(node.size_out()),
            (ObjectKind::Ensemble(ens), Endpoint::Value(_)) => Some(ens.dimensions),
            (ObjectKind::Ensemble(ens), Endpoint::Neurons(_)) => Some(ens.n_neurons),
            _ => None,
        }
    }

    /// Width of the vector accepted at `endpoint` of this object
    pub fn input_size(&self, endpoint: &Endpoint) -> Option<usize> {
        match (&self.kind, endpoint) {
            (ObjectKind::Node(node), Endpoint::Value(_)) => Some(node.size_in),
            (ObjectKind::Ensemble(ens), Endpoint::Value(_)) => Some(ens.dimensions),
            (ObjectKind::Ensemble(ens), Endpoint::Neurons(_)) => Some(ens.n_neurons),
            _ => None,
        }
    }
}

/// A directed, optionally filtered and transformed, connection
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub pre: Endpoint,
    pub post: Endpoint,
    /// Lowpass time constant in seconds; `None` passes values through
    pub synapse: Option<f64>,
    /// Matrix with one row per post dimension and one column per pre dimension
    pub transform: Option<Vec<Vec<f64>>>,
}

impl ConnectionSpec {
    pub fn new(pre: Endpoint, post: Endpoint) -> Self {
        Self {
            pre,
            post,
            synapse: None,
            transform: None,
        }
    }

    pub fn with_synapse(mut self, tau: f64) -> Self {
        self.synapse = Some(tau);
        self
    }

    pub fn with_transform(mut self, transform: Vec<Vec<f64>>) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Declarative description of networks, nodes, ensembles and connections
///
/// The graph is the input to a `SimulatorBuilder`. Components only mutate it
/// through the `ModelGraphAdapter` trait while the runtime holds the build lock.
#[derive(Clone)]
pub struct ModelGraph {
    root: ObjectId,
    objects: BTreeMap<ObjectId, ModelObject>,
    connections: BTreeMap<ConnectionId, ConnectionSpec>,
    next_object: u64,
    next_connection: u64,
}

impl ModelGraph {
    /// Create a graph containing only the root network
    pub fn new() -> Self {
        let root = ObjectId(0);
        let mut objects = BTreeMap::new();
        objects.insert(
            root,
            ModelObject {
                id: root,
                parent: None,
                label: None,
                kind: ObjectKind::Network {
                    spa_targets: BTreeMap::new(),
                },
            },
        );
        Self {
            root,
            objects,
            connections: BTreeMap::new(),
            next_object: 1,
            next_connection: 0,
        }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    fn insert_object(&mut self, parent: ObjectId, label: Option<&str>, kind: ObjectKind) -> Result<ObjectId> {
        let parent_obj = self.object(parent).ok_or(VizError::ObjectNotFound(parent))?;
        if !parent_obj.is_network() {
            return Err(VizError::InvalidConnection(format!(
                "parent {} is not a network",
                parent
            )));
        }
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            id,
            ModelObject {
                id,
                parent: Some(parent),
                label: label.map(str::to_string),
                kind,
            },
        );
        Ok(id)
    }

    /// Add a sub-network under `parent`
    pub fn add_network(&mut self, parent: ObjectId, label: Option<&str>) -> Result<ObjectId> {
        self.insert_object(
            parent,
            label,
            ObjectKind::Network {
                spa_targets: BTreeMap::new(),
            },
        )
    }

    /// Add a node under `parent`
    pub fn add_node(&mut self, parent: ObjectId, label: Option<&str>, node: NodeSpec) -> Result<ObjectId> {
        self.insert_object(parent, label, ObjectKind::Node(node))
    }

    /// Add an ensemble under `parent`
    pub fn add_ensemble(&mut self, parent: ObjectId, label: Option<&str>, ensemble: EnsembleSpec) -> Result<ObjectId> {
        self.insert_object(parent, label, ObjectKind::Ensemble(ensemble))
    }

    /// Expose a named semantic-pointer target on a network
    pub fn set_spa_target(&mut self, network: ObjectId, name: &str, target: SpaTarget) -> Result<()> {
        for (id, vocab) in [(target.output, &target.output_vocab), (target.input, &target.input_vocab)] {
            let obj = self.object(id).ok_or(VizError::ObjectNotFound(id))?;
            let dims = crate::core::spa::read_vocab(vocab).dimensions();
            let size = obj
                .output_size(&id.value())
                .ok_or_else(|| VizError::InvalidConnection(format!("{} has no value", id)))?;
            if size != dims {
                return Err(VizError::SizeMismatch {
                    expected: dims,
                    found: size,
                    context: format!("spa target '{}'", name),
                });
            }
        }
        match self.objects.get_mut(&network).map(|o| &mut o.kind) {
            Some(ObjectKind::Network { spa_targets }) => {
                spa_targets.insert(name.to_string(), target);
                Ok(())
            }
            Some(_) => Err(VizError::InvalidConnection(format!("{} is not a network", network))),
            None => Err(VizError::ObjectNotFound(network)),
        }
    }

    /// Look up a semantic-pointer target on a network
    pub fn spa_target(&self, network: ObjectId, name: &str) -> Option<&SpaTarget> {
        match &self.object(network)?.kind {
            ObjectKind::Network { spa_targets } => spa_targets.get(name),
            _ => None,
        }
    }

    /// Names of the semantic-pointer targets a network exposes
    pub fn spa_target_names(&self, network: ObjectId) -> Vec<String> {
        match self.object(network).map(|o| &o.kind) {
            Some(ObjectKind::Network { spa_targets }) => spa_targets.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Connect two endpoints after validating existence and sizes
    pub fn connect(&mut self, spec: ConnectionSpec) -> Result<ConnectionId> {
        ConnectionValidator::validate(self, &spec)?;
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, spec);
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<ConnectionSpec> {
        self.connections.remove(&id).ok_or(VizError::ConnectionNotFound(id))
    }

    /// Remove a node; it must no longer take part in any connection
    pub fn remove_node(&mut self, id: ObjectId) -> Result<NodeSpec> {
        match self.objects.get(&id) {
            Some(obj) if obj.as_node().is_some() => {}
            Some(_) => {
                return Err(VizError::InvalidConnection(format!("{} is not a node", id)));
            }
            None => return Err(VizError::ObjectNotFound(id)),
        }
        if let Some(cid) = self
            .connections
            .iter()
            .find(|(_, c)| c.pre.object() == id || c.post.object() == id)
            .map(|(cid, _)| *cid)
        {
            return Err(VizError::InvalidConnection(format!(
                "node {} is still referenced by {}",
                id, cid
            )));
        }
        match self.objects.remove(&id).map(|o| o.kind) {
            Some(ObjectKind::Node(node)) => Ok(node),
            _ => Err(VizError::ObjectNotFound(id)),
        }
    }

    /// Swap a node's output, returning the previous one; the output width must not change
    pub fn replace_node_output(&mut self, id: ObjectId, output: NodeOutput) -> Result<NodeOutput> {
        match self.objects.get_mut(&id).map(|o| &mut o.kind) {
            Some(ObjectKind::Node(node)) => {
                let replacement = NodeSpec::new(node.size_in, output);
                if replacement.size_out() != node.size_out() {
                    return Err(VizError::SizeMismatch {
                        expected: node.size_out(),
                        found: replacement.size_out(),
                        context: format!("output of {}", id),
                    });
                }
                Ok(std::mem::replace(&mut node.output, replacement.output))
            }
            Some(_) => Err(VizError::InvalidConnection(format!("{} is not a node", id))),
            None => Err(VizError::ObjectNotFound(id)),
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&ModelObject> {
        self.objects.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionSpec> {
        self.connections.get(&id)
    }

    /// All objects in creation order
    pub fn objects(&self) -> impl Iterator<Item = &ModelObject> {
        self.objects.values()
    }

    /// All connections in creation order
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &ConnectionSpec)> {
        self.connections.iter().map(|(id, c)| (*id, c))
    }

    /// Direct children of a network
    pub fn children(&self, network: ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.parent == Some(network))
            .map(|o| o.id)
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Human-readable name of an object: its label, else kind and id
    pub fn describe(&self, id: ObjectId) -> String {
        match self.object(id) {
            Some(obj) => match &obj.label {
                Some(label) => label.clone(),
                None => format!("{}{}", obj.kind_name().as_str(), id),
            },
            None => format!("{}", id),
        }
    }
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new()
    }
}
