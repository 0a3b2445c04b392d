use crate::core::components::base::ComponentBase;
use crate::core::components::handles::attach_sink;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::error::{Result, VizError};
use crate::core::model::ModelGraphAdapter;
use crate::core::types::ObjectId;
use std::sync::{Arc, OnceLock};

/// Synapse on the probe connection of plotting components
pub(crate) const PROBE_SYNAPSE: f64 = 0.01;

/// Line plot of an object's decoded value over time
pub struct Value {
    base: ComponentBase,
    target: ObjectId,
    n_lines: OnceLock<usize>,
}

impl Value {
    pub fn new(uid: &str, target: ObjectId) -> Self {
        Self {
            base: ComponentBase::new(uid),
            target,
            n_lines: OnceLock::new(),
        }
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }
}

impl VizComponent for Value {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Value
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let size = ctx
            .model
            .object(self.target)
            .and_then(|o| o.output_size(&self.target.value()))
            .ok_or(VizError::ObjectNotFound(self.target))?;
        let _ = self.n_lines.set(size);
        self.base.attach(ctx.label_of(self.target), ctx.config.clone())
    }

    fn label(&self) -> String {
        self.base.label()
    }

    fn add_graph_objects(self: Arc<Self>, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        let component = Arc::clone(&self);
        attach_sink(
            self.base.graph(),
            model,
            &format!("{}.probe", self.uid()),
            Some(self.target.value()),
            Some(PROBE_SYNAPSE),
            move |t, x| {
                component.on_step(t, x);
            },
        )
    }

    fn remove_graph_objects(&self, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        self.base.graph().detach(model)
    }

    fn has_graph_objects(&self) -> bool {
        self.base.graph().is_attached()
    }

    fn on_step(&self, t: f64, values: &[f64]) -> Vec<f64> {
        self.base.push(Sample::Values {
            t,
            values: values.to_vec(),
        });
        Vec::new()
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    fn client_spec(&self) -> serde_json::Value {
        let mut spec = self.base.layout_spec("Value");
        spec["n_lines"] = self.n_lines.get().copied().unwrap_or(0).into();
        spec["miny"] = self.base.config_f64("miny", -1.0).into();
        spec["maxy"] = self.base.config_f64("maxy", 1.0).into();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::Harness;
    use crate::core::model::{ModelGraph, NodeSpec};

    #[test]
    fn test_probe_streams_values() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let stim = graph
            .add_node(root, Some("stim"), NodeSpec::constant(vec![0.25, 0.5]))
            .unwrap();
        let mut harness = Harness::new(graph);
        let value = Arc::new(Value::new("value0", stim));
        harness.attach(value.as_ref(), "Value");
        assert_eq!(value.label(), "stim");
        assert_eq!(value.client_spec()["n_lines"], 2);

        let samples = harness.run(value.clone(), 3);
        assert_eq!(samples.len(), 3);
        assert!(matches!(&samples[0], Sample::Values { values, .. } if values.len() == 2));
        assert!(!value.has_graph_objects());
    }
}
