use serde::{Deserialize, Serialize};

/// Identifier of an object (network, node or ensemble) in the model graph.
///
/// Ids are handed out in creation order by the owning `ModelGraph`, so they
/// double as a stable ordering key for persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    /// Get the raw numeric id
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Address this object's decoded value
    pub fn value(&self) -> Endpoint {
        Endpoint::Value(*self)
    }

    /// Address this object's neurons (ensembles only)
    pub fn neurons(&self) -> Endpoint {
        Endpoint::Neurons(*self)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a connection in the model graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// One end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The decoded (vector) value of a node or ensemble
    Value(ObjectId),
    /// The spike vector of an ensemble's neurons
    Neurons(ObjectId),
}

impl Endpoint {
    pub fn object(&self) -> ObjectId {
        match self {
            Endpoint::Value(id) | Endpoint::Neurons(id) => *id,
        }
    }

    pub fn is_neurons(&self) -> bool {
        matches!(self, Endpoint::Neurons(_))
    }
}

/// Stable identifier of a bound name: a model object or a component declaration
pub type Uid = String;
