use crate::core::components::buffer::SampleBuffer;
use crate::core::components::handles::GraphSlot;
use crate::core::components::types::Sample;
use crate::core::config::ConfigHandle;
use crate::core::error::{Result, VizError};
use crate::core::types::Uid;
use serde_json::json;
use std::sync::OnceLock;

/// State set once by `attach`
#[derive(Clone)]
pub struct Attachment {
    pub label: String,
    pub config: ConfigHandle,
}

/// Identity, buffered output, ephemeral handles and attachment of one component
pub struct ComponentBase {
    uid: Uid,
    attachment: OnceLock<Attachment>,
    buffer: SampleBuffer<Sample>,
    graph: GraphSlot,
}

impl ComponentBase {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            attachment: OnceLock::new(),
            buffer: SampleBuffer::new(),
            graph: GraphSlot::default(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn attach(&self, label: String, config: ConfigHandle) -> Result<()> {
        self.attachment
            .set(Attachment { label, config })
            .map_err(|_| VizError::RuntimeState(format!("component {} is already attached", self.uid)))
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.get()
    }

    pub fn label(&self) -> String {
        self.attachment
            .get()
            .map(|a| a.label.clone())
            .unwrap_or_else(|| self.uid.clone())
    }

    pub fn config(&self) -> Option<&ConfigHandle> {
        self.attachment.get().map(|a| &a.config)
    }

    /// Numeric config field, `fallback` when unattached or unset
    pub fn config_f64(&self, field: &str, fallback: f64) -> f64 {
        self.config().map_or(fallback, |c| c.get_f64(field, fallback))
    }

    pub fn config_bool(&self, field: &str, fallback: bool) -> bool {
        self.config().map_or(fallback, |c| c.get_bool(field, fallback))
    }

    pub fn push(&self, sample: Sample) {
        self.buffer.push(sample);
    }

    pub fn drain(&self) -> Vec<Sample> {
        self.buffer.drain()
    }

    pub fn graph(&self) -> &GraphSlot {
        &self.graph
    }

    /// Client spec fields every plot-like view shares
    pub fn layout_spec(&self, kind: &str) -> serde_json::Value {
        json!({
            "type": kind,
            "uid": self.uid,
            "label": self.label(),
            "x": self.config_f64("x", 0.0),
            "y": self.config_f64("y", 0.0),
            "width": self.config_f64("width", 100.0),
            "height": self.config_f64("height", 100.0),
            "label_visible": self.config_bool("label_visible", true),
        })
    }
}
