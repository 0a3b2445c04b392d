use crate::core::types::{ConnectionId, ObjectId};
use thiserror::Error;

/// Errors raised by the visualization runtime
#[derive(Debug, Error)]
pub enum VizError {
    /// Object id not present in the model graph
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// Connection id not present in the model graph
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// Connection endpoints are incompatible
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    /// Vector sizes disagree
    #[error("Size mismatch: expected {expected}, found {found} ({context})")]
    SizeMismatch {
        expected: usize,
        found: usize,
        context: String,
    },

    /// No component registered under this uid
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// Name is not bound in the session namespace
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Name cannot be written as an identifier in a config statement
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Identifier is already bound
    #[error("Identifier already in use: {0}")]
    DuplicateIdentifier(String),

    /// Config instance has not been registered
    #[error("Unknown config instance: {0}")]
    UnknownInstance(String),

    /// No schema has been declared for this type
    #[error("Unknown config type: {0}")]
    UnknownType(String),

    /// Field is not part of the instance's schema
    #[error("Unknown config field '{field}' for {type_name}")]
    UnknownField { type_name: String, field: String },

    /// Persisted statement could not be parsed
    #[error("Parse error at column {column}: {message}")]
    Parse { column: usize, message: String },

    /// Semantic pointer expression could not be parsed
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    /// A component failed to attach to or detach from the model graph
    #[error("Build failed in component '{uid}': {source}")]
    ComponentBuild {
        uid: String,
        #[source]
        source: Box<VizError>,
    },

    /// The simulator could not be constructed
    #[error("Build failed: {0}")]
    Build(String),

    /// A simulation step failed
    #[error("Step failed: {0}")]
    Step(String),

    /// Operation is invalid in the runtime's current state
    #[error("Runtime state error: {0}")]
    RuntimeState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VizError {
    pub(crate) fn parse(column: usize, message: impl Into<String>) -> Self {
        VizError::Parse {
            column,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VizError>;
