use crate::core::components::base::ComponentBase;
use crate::core::components::traits::{AttachContext, VizComponent};
use crate::core::components::types::{ComponentKind, Sample};
use crate::core::config::ConfigValue;
use crate::core::error::Result;
use crate::core::model::{ModelGraph, ModelGraphAdapter};
use crate::core::types::{Endpoint, Uid};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Layout edits sent by the graph view
#[derive(Debug, Deserialize)]
#[serde(tag = "act", rename_all = "snake_case")]
enum GraphAction {
    Pos { uid: Uid, x: f64, y: f64 },
    Size { uid: Uid, width: f64, height: f64 },
    Expand { uid: Uid },
    Collapse { uid: Uid },
}

/// Interactive view of the model's networks, nodes and ensembles
pub struct NetGraph {
    base: ComponentBase,
}

impl NetGraph {
    pub fn new(uid: &str) -> Self {
        Self {
            base: ComponentBase::new(uid),
        }
    }

    fn describe(ctx: &AttachContext<'_>, model: &ModelGraph) -> serde_json::Value {
        let uid_of = |id| ctx.uid_of(id).map(str::to_string).unwrap_or_else(|| model.describe(id));
        let layout = |uid: &str, field: &str| {
            let value = ctx.config.for_uid(uid).get(field).unwrap_or(ConfigValue::None);
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
        };

        let objects: Vec<serde_json::Value> = model
            .objects()
            .filter(|o| o.id != model.root())
            .map(|o| {
                let uid = uid_of(o.id);
                let mut entry = json!({
                    "uid": uid,
                    "label": ctx.label_of(o.id),
                    "type": o.kind_name().as_str(),
                    "parent": o.parent.map(uid_of),
                    "pos": layout(&uid, "pos"),
                    "size": layout(&uid, "size"),
                });
                if o.is_network() {
                    entry["expanded"] = layout(&uid, "expanded");
                }
                entry
            })
            .collect();

        let endpoint = |e: &Endpoint| match e {
            Endpoint::Value(id) => uid_of(*id),
            Endpoint::Neurons(id) => format!("{}.neurons", uid_of(*id)),
        };
        let connections: Vec<serde_json::Value> = model
            .connections()
            .map(|(_, c)| json!({"pre": endpoint(&c.pre), "post": endpoint(&c.post)}))
            .collect();

        json!({ "objects": objects, "connections": connections })
    }

    fn apply(&self, action: GraphAction) -> Result<()> {
        let Some(config) = self.base.config() else {
            return Ok(());
        };
        match action {
            GraphAction::Pos { uid, x, y } => config.for_uid(&uid).set("pos", ConfigValue::pair(x, y)),
            GraphAction::Size { uid, width, height } => {
                config.for_uid(&uid).set("size", ConfigValue::pair(width, height))
            }
            GraphAction::Expand { uid } => {
                let network = config.for_uid(&uid);
                network.set("expanded", ConfigValue::Bool(true))?;
                network.set("has_layout", ConfigValue::Bool(true))
            }
            GraphAction::Collapse { uid } => config.for_uid(&uid).set("expanded", ConfigValue::Bool(false)),
        }
    }
}

impl VizComponent for NetGraph {
    fn uid(&self) -> &str {
        self.base.uid()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::NetGraph
    }

    fn attach(&self, ctx: &AttachContext<'_>) -> Result<()> {
        self.base.attach(self.uid().to_string(), ctx.config.clone())?;
        self.base.push(Sample::Graph {
            graph: Self::describe(ctx, ctx.model),
        });
        Ok(())
    }

    fn label(&self) -> String {
        self.base.label()
    }

    fn add_graph_objects(self: Arc<Self>, _model: &mut dyn ModelGraphAdapter) -> Result<()> {
        Ok(())
    }

    fn remove_graph_objects(&self, _model: &mut dyn ModelGraphAdapter) -> Result<()> {
        Ok(())
    }

    fn has_graph_objects(&self) -> bool {
        false
    }

    fn drain_for_client(&self) -> Vec<Sample> {
        self.base.drain()
    }

    fn on_message(&self, raw: &str) {
        let result = serde_json::from_str::<GraphAction>(raw)
            .map_err(|e| e.to_string())
            .and_then(|action| self.apply(action).map_err(|e| e.to_string()));
        if let Err(e) = result {
            debug!("NetGraph {} ignored message {:?}: {}", self.uid(), raw, e);
        }
    }

    fn client_spec(&self) -> serde_json::Value {
        json!({ "type": "NetGraph", "uid": self.uid() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::testing::Harness;
    use crate::core::model::NodeSpec;

    fn graph_with_network() -> (ModelGraph, crate::core::types::ObjectId) {
        let mut graph = ModelGraph::new();
        let root = graph.root();
        let net = graph.add_network(root, Some("sub")).unwrap();
        graph.add_node(net, Some("stim"), NodeSpec::constant(vec![1.0])).unwrap();
        (graph, net)
    }

    #[test]
    fn test_attach_describes_model() {
        let (graph, net) = graph_with_network();
        let mut harness = Harness::new(graph);
        harness.name(net, "net0", "Network");
        let net_graph = NetGraph::new("_viz_net_graph");
        harness.attach(&net_graph, "NetGraph");

        let samples = net_graph.drain_for_client();
        let Sample::Graph { graph } = &samples[0] else {
            panic!("expected a graph sample, got {:?}", samples);
        };
        let objects = graph["objects"].as_array().unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["uid"], "net0");
        assert_eq!(objects[0]["expanded"], false);
        assert_eq!(objects[1]["parent"], "net0");
    }

    #[test]
    fn test_messages_update_layout() {
        let (graph, net) = graph_with_network();
        let mut harness = Harness::new(graph);
        harness.name(net, "net0", "Network");
        let net_graph = NetGraph::new("_viz_net_graph");
        harness.attach(&net_graph, "NetGraph");

        net_graph.on_message(r#"{"act": "pos", "uid": "net0", "x": 0.25, "y": 0.5}"#);
        net_graph.on_message(r#"{"act": "expand", "uid": "net0"}"#);
        net_graph.on_message(r#"{"act": "teleport"}"#);
        net_graph.on_message(r#"{"act": "pos", "uid": "nobody", "x": 1, "y": 1}"#);

        assert_eq!(harness.get("net0", "pos"), ConfigValue::pair(0.25, 0.5));
        assert_eq!(harness.get("net0", "expanded"), ConfigValue::Bool(true));
    }
}
