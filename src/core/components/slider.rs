use crate::core::components::base::ComponentBase;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::error::{Result, VizError};
use crate::core::model::{ModelGraphAdapter, NodeOutput};
use crate::core::types::ObjectId;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Live control over a node's output
///
/// During a build the node's output is wrapped so that any dimension the
/// client has overridden is replaced; detaching restores the original.
pub struct Slider {
    base: ComponentBase,
    target: ObjectId,
    start_value: OnceLock<Vec<f64>>,
    overrides: Mutex<BTreeMap<usize, f64>>,
}

impl Slider {
    pub fn new(uid: &str, target: ObjectId) -> Self {
        Self {
            base: ComponentBase::new(uid),
            target,
            start_value: OnceLock::new(),
            overrides: Mutex::new(BTreeMap::new()),
        }
    }

    fn overrides(&self) -> MutexGuard<'_, BTreeMap<usize, f64>> {
        self.overrides.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn parse_override(raw: &str) -> Option<(usize, f64)> {
        let (index, value) = raw.split_once(',')?;
        let index = index.trim().parse().ok()?;
        let value: f64 = value.trim().parse().ok()?;
        value.is_finite().then_some((index, value))
    }
}

impl VizComponent for Slider {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Slider
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let node = ctx
            .model
            .object(self.target)
            .ok_or(VizError::ObjectNotFound(self.target))?
            .as_node()
            .ok_or_else(|| VizError::InvalidConnection(format!("slider target {} is not a node", self.target)))?;
        let start = match &node.output {
            NodeOutput::Constant(values) => values.clone(),
            _ => vec![0.0; node.size_out()],
        };
        let _ = self.start_value.set(start);
        self.base.attach(ctx.label_of(self.target), ctx.config.clone())
    }

    fn label(&self) -> String {
        self.base.label()
    }

    fn add_graph_objects(self: Arc<Self>, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        let node = model
            .object(self.target)
            .and_then(|o| o.as_node())
            .ok_or(VizError::ObjectNotFound(self.target))?;
        let original = node.output.clone();
        let size_out = node.size_out();
        let target = self.target;
        let component = Arc::clone(&self);
        self.base.graph().attach(model, move |handles, model| {
            let wrapped = NodeOutput::function(size_out, move |t, x| {
                component.on_step(t, &original.evaluate(t, x))
            });
            handles.replace_output(model, target, wrapped)
        })
    }

    fn remove_graph_objects(&self, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        self.base.graph().detach(model)
    }

    fn has_graph_objects(&self) -> bool {
        self.base.graph().is_attached()
    }

    fn on_step(&self, _t: f64, values: &[f64]) -> Vec<f64> {
        let overrides = self.overrides();
        let mut out = values.to_vec();
        for (index, value) in overrides.iter() {
            if let Some(slot) = out.get_mut(*index) {
                *slot = *value;
            }
        }
        out
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    /// `"<index>,<value>"` overrides one dimension, `"reset"` releases all
    fn on_message(&self, raw: &str) {
        if raw.trim() == "reset" {
            self.overrides().clear();
            return;
        }
        match Self::parse_override(raw) {
            Some((index, value)) => {
                self.overrides().insert(index, value);
            }
            None => {
                debug!("Slider {} ignored malformed message {:?}", self.uid(), raw);
                self.overrides().clear();
            }
        }
    }

    fn client_spec(&self) -> serde_json::Value {
        let mut spec = self.base.layout_spec("Slider");
        let start = self.start_value.get().cloned().unwrap_or_default();
        spec["n_sliders"] = start.len().into();
        spec["start_value"] = start.into();
        spec["min_value"] = self.base.config_f64("min_value", -1.0).into();
        spec["max_value"] = self.base.config_f64("max_value", 1.0).into();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::Harness;
    use crate::core::model::{ModelGraph, NodeSpec};

    #[test]
    fn test_messages_override_and_reset() {
        let slider = Slider::new("slider0", ObjectId(1));
        slider.on_message("1,0.75");
        assert_eq!(slider.on_step(0.0, &[0.1, 0.2]), vec![0.1, 0.75]);
        slider.on_message("reset");
        assert_eq!(slider.on_step(0.0, &[0.1, 0.2]), vec![0.1, 0.2]);
        slider.on_message("0,0.5");
        slider.on_message("0;oops");
        assert_eq!(slider.on_step(0.0, &[0.1, 0.2]), vec![0.1, 0.2]);
    }

    #[test]
    fn test_build_restores_original_output() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let stim = graph.add_node(root, Some("stim"), NodeSpec::constant(vec![0.3])).unwrap();
        let mut harness = Harness::new(graph);
        let slider = Arc::new(Slider::new("slider0", stim));
        harness.attach(slider.as_ref(), "Slider");
        assert_eq!(slider.client_spec()["start_value"], serde_json::json!([0.3]));

        slider.on_message("0,-0.5");
        let mut sim = harness.build(slider.clone());
        sim.step().unwrap();
        assert_eq!(sim.probe(stim).unwrap(), vec![-0.5]);
        assert!(matches!(
            &harness.model().object(stim).unwrap().as_node().unwrap().output,
            NodeOutput::Constant(v) if v == &vec![0.3]
        ));
    }
}
