use crate::core::components::base::ComponentBase;
use crate::core::components::handles::attach_sink;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::error::{Result, VizError};
use crate::core::model::ModelGraphAdapter;
use crate::core::types::ObjectId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Spike raster of an ensemble's neurons
pub struct Raster {
    base: ComponentBase,
    target: ObjectId,
    /// Neurons shown; the first `shown` indices of the ensemble
    shown: AtomicUsize,
}

impl Raster {
    pub fn new(uid: &str, target: ObjectId) -> Self {
        Self {
            base: ComponentBase::new(uid),
            target,
            shown: AtomicUsize::new(0),
        }
    }
}

impl VizComponent for Raster {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Raster
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let ensemble = ctx
            .model
            .object(self.target)
            .ok_or(VizError::ObjectNotFound(self.target))?
            .as_ensemble()
            .ok_or_else(|| {
                VizError::InvalidConnection(format!("raster target {} is not an ensemble", self.target))
            })?;
        let shown = ctx
            .config
            .get_f64("n_neurons", ensemble.n_neurons as f64)
            .clamp(0.0, ensemble.n_neurons as f64) as usize;
        self.shown.store(shown, Ordering::Relaxed);
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
            Some(self.target.neurons()),
            None,
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
        let shown = self.shown.load(Ordering::Relaxed);
        let neurons: Vec<usize> = values
            .iter()
            .take(shown)
            .enumerate()
            .filter(|(_, rate)| **rate > 0.0)
            .map(|(i, _)| i)
            .collect();
        self.base.push(Sample::Spikes { t, neurons });
        Vec::new()
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    fn client_spec(&self) -> serde_json::Value {
        let mut spec = self.base.layout_spec("Raster");
        spec["n_neurons"] = self.shown.load(Ordering::Relaxed).into();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::Harness;
    use crate::core::config::ConfigValue;
    use crate::core::model::{EnsembleSpec, ModelGraph};

    #[test]
    fn test_reports_spiking_indices_only() {
        let raster = Raster::new("raster0", ObjectId(1));
        raster.shown.store(4, Ordering::Relaxed);
        raster.on_step(0.1, &[0.0, 1000.0, 0.0, 1000.0, 1000.0]);
        assert_eq!(
            raster.drain_for_client(),
            vec![Sample::Spikes {
                t: 0.1,
                neurons: vec![1, 3]
            }]
        );
    }

    #[test]
    fn test_n_neurons_limits_display() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let ens = graph.add_ensemble(root, Some("a"), EnsembleSpec::new(50, 1)).unwrap();
        let harness = Harness::new(graph);
        harness.register("raster0", "Raster");
        harness.set("raster0", "n_neurons", ConfigValue::Number(10.0));
        let raster = Raster::new("raster0", ens);
        harness.attach(&raster, "Raster");
        assert_eq!(raster.client_spec()["n_neurons"], 10);
    }

    #[test]
    fn test_node_target_is_rejected() {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let node = graph
            .add_node(root, None, crate::core::model::NodeSpec::constant(vec![1.0]))
            .unwrap();
        let harness = Harness::new(graph);
        let raster = Raster::new("raster0", node);
        assert!(raster.attach(&harness.context("raster0", "Raster")).is_err());
    }
}
