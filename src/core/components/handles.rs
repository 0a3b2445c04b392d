use crate::core::error::{Result, VizError};
use crate::core::model::{ConnectionSpec, ModelGraphAdapter, NodeOutput, NodeSpec};
use crate::core::types::{ConnectionId, Endpoint, ObjectId};
use log::warn;
use std::sync::{Mutex, MutexGuard};

/// Record of every ephemeral change one component made to the model graph
#[derive(Debug, Default)]
pub struct GraphHandles {
    nodes: Vec<ObjectId>,
    connections: Vec<ConnectionId>,
    replaced: Vec<(ObjectId, NodeOutput)>,
}

impl GraphHandles {
    pub fn add_node(
        &mut self,
        model: &mut dyn ModelGraphAdapter,
        label: Option<&str>,
        node: NodeSpec,
    ) -> Result<ObjectId> {
        let id = model.add_node(label, node)?;
        self.nodes.push(id);
        Ok(id)
    }

    pub fn connect(&mut self, model: &mut dyn ModelGraphAdapter, spec: ConnectionSpec) -> Result<ConnectionId> {
        let id = model.connect(spec)?;
        self.connections.push(id);
        Ok(id)
    }

    /// Swap a persistent node's output; the original is restored by `undo`
    pub fn replace_output(
        &mut self,
        model: &mut dyn ModelGraphAdapter,
        node: ObjectId,
        output: NodeOutput,
    ) -> Result<()> {
        let previous = model.replace_node_output(node, output)?;
        self.replaced.push((node, previous));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty() && self.replaced.is_empty()
    }

    /// Reverse every recorded change, newest first
    ///
    /// Keeps going after a failure so as much as possible is restored; the
    /// first error is returned.
    pub fn undo(&mut self, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        let mut first_error = None;
        for id in self.connections.drain(..).rev() {
            if let Err(e) = model.disconnect(id) {
                first_error.get_or_insert(e);
            }
        }
        for id in self.nodes.drain(..).rev() {
            if let Err(e) = model.remove_node(id) {
                first_error.get_or_insert(e);
            }
        }
        for (id, output) in self.replaced.drain(..).rev() {
            if let Err(e) = model.replace_node_output(id, output) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Holds a component's handles between attach and detach
///
/// Handles are either all present or all absent: a failed attach undoes
/// whatever it managed to add before returning the error.
#[derive(Debug, Default)]
pub struct GraphSlot {
    handles: Mutex<Option<GraphHandles>>,
}

impl GraphSlot {
    fn handles(&self) -> MutexGuard<'_, Option<GraphHandles>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attach<F>(&self, model: &mut dyn ModelGraphAdapter, add: F) -> Result<()>
    where
        F: FnOnce(&mut GraphHandles, &mut dyn ModelGraphAdapter) -> Result<()>,
    {
        let mut slot = self.handles();
        if slot.is_some() {
            return Err(VizError::RuntimeState(
                "graph objects are already attached".to_string(),
            ));
        }
        let mut handles = GraphHandles::default();
        if let Err(e) = add(&mut handles, model) {
            if let Err(undo_error) = handles.undo(model) {
                warn!("Could not roll back partial attach: {}", undo_error);
            }
            return Err(e);
        }
        *slot = Some(handles);
        Ok(())
    }

    /// Remove everything attached; a no-op when nothing is
    pub fn detach(&self, model: &mut dyn ModelGraphAdapter) -> Result<()> {
        match self.handles().take() {
            Some(mut handles) => handles.undo(model),
            None => Ok(()),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.handles().is_some()
    }
}

/// Attach one sink node that hands every step's input to `sink`
///
/// The node is fed from `source` when given; without a source it takes no
/// input and only observes time.
pub fn attach_sink<F>(
    slot: &GraphSlot,
    model: &mut dyn ModelGraphAdapter,
    label: &str,
    source: Option<Endpoint>,
    synapse: Option<f64>,
    sink: F,
) -> Result<()>
where
    F: Fn(f64, &[f64]) + Send + Sync + 'static,
{
    let size_in = match source {
        Some(endpoint) => model
            .object(endpoint.object())
            .and_then(|o| o.output_size(&endpoint))
            .ok_or(VizError::ObjectNotFound(endpoint.object()))?,
        None => 0,
    };
    slot.attach(model, move |handles, model| {
        let output = NodeOutput::function(0, move |t, x| {
            sink(t, x);
            Vec::new()
        });
        let node = handles.add_node(model, Some(label), NodeSpec::new(size_in, output))?;
        if let Some(source) = source {
            let mut spec = ConnectionSpec::new(source, node.value());
            if let Some(tau) = synapse {
                spec = spec.with_synapse(tau);
            }
            handles.connect(model, spec)?;
        }
        Ok(())
    })
}
