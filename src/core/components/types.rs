use serde::{Deserialize, Serialize};

/// The closed set of component variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    SimControl,
    NetGraph,
    Slider,
    Value,
    XYValue,
    Raster,
    Pointer,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::SimControl,
        ComponentKind::NetGraph,
        ComponentKind::Slider,
        ComponentKind::Value,
        ComponentKind::XYValue,
        ComponentKind::Raster,
        ComponentKind::Pointer,
    ];

    /// Name used in constructor statements and as the config type
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::SimControl => "SimControl",
            ComponentKind::NetGraph => "NetGraph",
            ComponentKind::Slider => "Slider",
            ComponentKind::Value => "Value",
            ComponentKind::XYValue => "XYValue",
            ComponentKind::Raster => "Raster",
            ComponentKind::Pointer => "Pointer",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Privileged kinds are built before every other component
    pub fn is_privileged(&self) -> bool {
        matches!(self, ComponentKind::SimControl | ComponentKind::NetGraph)
    }

    /// Whether the kind is bound to a model object
    pub fn has_target(&self) -> bool {
        !self.is_privileged()
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One buffered unit of data awaiting delivery to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sample {
    /// Decoded vector at time `t`
    Values { t: f64, values: Vec<f64> },
    /// Indices of neurons that spiked at time `t`
    Spikes { t: f64, neurons: Vec<usize> },
    /// Preformatted text line
    Text { text: String },
    /// Simulation clock tick
    Time { t: f64 },
    /// Structured description, e.g. of the model graph
    Graph { graph: serde_json::Value },
}
