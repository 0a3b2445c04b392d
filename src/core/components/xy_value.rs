use crate::core::components::base::ComponentBase;
use crate::core::components::handles::attach_sink;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::components::value::PROBE_SYNAPSE;
use crate::core::error::{Result, VizError};
use crate::core::model::ModelGraphAdapter;
use crate::core::types::ObjectId;
use std::sync::{Arc, OnceLock};

/// Plot of one dimension of a value against another
pub struct XYValue {
    base: ComponentBase,
    target: ObjectId,
    n_lines: OnceLock<usize>,
}

impl XYValue {
    pub fn new(uid: &str, target: ObjectId) -> Self {
        Self {
            base: ComponentBase::new(uid),
            target,
            n_lines: OnceLock::new(),
        }
    }
}

impl VizComponent for XYValue {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::XYValue
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        let size = ctx
            .model
            .object(self.target)
            .and_then(|o| o.output_size(&self.target.value()))
            .ok_or(VizError::ObjectNotFound(self.target))?;
        if size < 2 {
            return Err(VizError::SizeMismatch {
                expected: 2,
                found: size,
                context: format!("XY plot of {}", ctx.label_of(self.target)),
            });
        }
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
        let mut spec = self.base.layout_spec("XYValue");
        spec["n_lines"] = self.n_lines.get().copied().unwrap_or(0).into();
        spec["min_value"] = self.base.config_f64("min_value", -1.0).into();
        spec["max_value"] = self.base.config_f64("max_value", 1.0).into();
        spec["index_x"] = (self.base.config_f64("index_x", 0.0) as usize).into();
        spec["index_y"] = (self.base.config_f64("index_y", 1.0) as usize).into();
        spec
    }
}
