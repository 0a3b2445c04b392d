pub mod adapter;
pub mod graph;
pub mod validator;

// Re-export commonly used types
pub use adapter::{GraphSnapshot, ModelGraphAdapter};
pub use graph::{
    ConnectionSpec, EnsembleSpec, ModelGraph, ModelObject, NodeFn, NodeOutput, NodeSpec, ObjectKind,
    ObjectKindName, SpaTarget,
};

use std::sync::{Arc, Mutex, MutexGuard};

/// A model graph shared by a session and its runtime loops
pub type SharedModel = Arc<Mutex<ModelGraph>>;

pub fn lock_model(model: &SharedModel) -> MutexGuard<'_, ModelGraph> {
    model.lock().unwrap_or_else(|e| e.into_inner())
}
