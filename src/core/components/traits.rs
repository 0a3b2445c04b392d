use crate::core::components::types::{ComponentKind, Sample};
use crate::core::config::ConfigHandle;
use crate::core::error::Result;
use crate::core::model::{ModelGraph, ModelGraphAdapter};
use crate::core::runtime::LoopControl;
use crate::core::types::{ObjectId, Uid};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a component may look at when it is attached to a session
pub struct AttachContext<'a> {
    pub model: &'a ModelGraph,
    /// Stable identifiers of named model objects
    pub names: &'a BTreeMap<ObjectId, Uid>,
    /// The component's own entry in the config store
    pub config: ConfigHandle,
    pub control: LoopControl,
}

impl<'a> AttachContext<'a> {
    /// Display label of a model object: its label, else its uid, else kind and id
    pub fn label_of(&self, id: ObjectId) -> String {
        if let Some(label) = self.model.object(id).and_then(|o| o.label.clone()) {
            return label;
        }
        match self.names.get(&id) {
            Some(uid) => uid.clone(),
            None => self.model.describe(id),
        }
    }

    pub fn uid_of(&self, id: ObjectId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

/// Capability set shared by every component variant
///
/// `on_step` runs on the simulation thread while `drain_for_client` and
/// `on_message` run on caller threads, so implementations keep their
/// mutable state behind locks and never block in `on_step`.
pub trait VizComponent: Send + Sync {
    fn uid(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    /// Bind to persisted config and compute display state; called once
    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()>;

    /// Display label computed at attach time
    fn label(&self) -> String;

    /// Insert probe and injection objects; build lock held
    ///
    /// Takes the `Arc` so node functions can hold on to the component.
    fn add_graph_objects(self: Arc<Self>, model: &mut dyn ModelGraphAdapter) -> Result<()>;

    /// Remove exactly what `add_graph_objects` inserted; build lock held
    fn remove_graph_objects(&self, model: &mut dyn ModelGraphAdapter) -> Result<()>;

    fn has_graph_objects(&self) -> bool;

    /// Observe one step's values and return what to inject, if anything
    fn on_step(&self, _t: f64, _values: &[f64]) -> Vec<f64> {
        Vec::new()
    }

    /// Take every sample buffered since the last drain
    fn drain_for_client(&self) -> Vec<Sample>;

    /// Handle a raw client message; malformed input resets transient state
    fn on_message(&self, _raw: &str) {}

    /// JSON object a client needs to create this component's view
    fn client_spec(&self) -> serde_json::Value;
}
