use crate::core::components::base::ComponentBase;
use crate::core::components::handles::attach_sink;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::error::Result;
use crate::core::model::ModelGraphAdapter;
use crate::core::runtime::LoopControl;
use log::debug;
use serde_json::json;
use std::sync::{Arc, OnceLock};

/// Simulation clock display with pause, continue and reset controls
pub struct SimControl {
    base: ComponentBase,
    control: OnceLock<LoopControl>,
}

impl SimControl {
    pub fn new(uid: &str) -> Self {
        Self {
            base: ComponentBase::new(uid),
            control: OnceLock::new(),
        }
    }
}

impl VizComponent for SimControl {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::SimControl
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let _ = self.control.set(ctx.control.clone());
        self.base.attach(self.uid().to_string(), ctx.config.clone())
    }

    fn label(&self) -> String {
        self.base.label()
    }

    fn add_graph_objects(self: Arc<Self>, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        let component = Arc::clone(&self);
        attach_sink(
            self.base.graph(),
            model,
            &format!("{}.clock", self.uid()),
            None,
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

    fn on_step(&self, t: f64, _values: &[f64]) -> Vec<f64> {
        self.base.push(Sample::Time { t });
        Vec::new()
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    fn on_message(&self, raw: &str) {
        let Some(control) = self.control.get() else {
            debug!("SimControl {} is not attached; ignoring {:?}", self.uid(), raw);
            return;
        };
        match raw.trim() {
            "pause" => control.pause(),
            "continue" => control.resume(),
            "reset" => control.request_rebuild(),
            other => debug!("SimControl {} ignored unknown message {:?}", self.uid(), other),
        }
    }

    fn client_spec(&self) -> serde_json::Value {
        json!({
            "type": "SimControl",
            "uid": self.uid(),
            "shown_time": self.base.config_f64("shown_time", 0.5),
            "kept_time": self.base.config_f64("kept_time", 4.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::Harness;
    use crate::core::model::ModelGraph;

    #[test]
    fn test_messages_steer_the_loop() {
        let harness = Harness::new(ModelGraph::new());
        let control = harness.control();
        let sim_control = SimControl::new("_viz_sim_control");
        harness.attach(&sim_control, "SimControl");

        sim_control.on_message("pause");
        assert!(control.is_paused());
        sim_control.on_message("continue");
        assert!(!control.is_paused());
        sim_control.on_message("bogus");
        assert!(!control.is_paused());
        assert_eq!(sim_control.client_spec()["kept_time"], 4.0);
    }

    #[test]
    fn test_clock_ticks_every_step() {
        let mut harness = Harness::new(ModelGraph::new());
        let sim_control = Arc::new(SimControl::new("_viz_sim_control"));
        harness.attach(sim_control.as_ref(), "SimControl");
        let samples = harness.run(sim_control, 2);
        assert_eq!(samples, vec![Sample::Time { t: 0.001 }, Sample::Time { t: 0.002 }]);
    }
}
