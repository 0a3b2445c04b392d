use crate::core::error::{Result, VizError};
use crate::core::model::graph::{ConnectionSpec, ModelGraph, ModelObject};
use crate::core::types::Endpoint;

/// Connection validation utilities for the model graph
pub struct ConnectionValidator;

impl ConnectionValidator {
    /// Validate that a connection's endpoints exist and agree in size
    pub fn validate(graph: &ModelGraph, spec: &ConnectionSpec) -> Result<()> {
        let pre = Self::endpoint_object(graph, &spec.pre)?;
        let post = Self::endpoint_object(graph, &spec.post)?;

        let pre_size = pre.output_size(&spec.pre).ok_or_else(|| {
            VizError::InvalidConnection(format!(
                "{} has no output at {:?}",
                graph.describe(pre.id),
                spec.pre
            ))
        })?;
        let post_size = post.input_size(&spec.post).ok_or_else(|| {
            VizError::InvalidConnection(format!(
                "{} has no input at {:?}",
                graph.describe(post.id),
                spec.post
            ))
        })?;

        if let Some(tau) = spec.synapse {
            if !(tau >= 0.0) {
                return Err(VizError::InvalidConnection(format!("synapse must be non-negative, got {}", tau)));
            }
        }

        match &spec.transform {
            Some(matrix) => Self::validate_transform(matrix, pre_size, post_size),
            None if pre_size == post_size => Ok(()),
            None => Err(VizError::SizeMismatch {
                expected: post_size,
                found: pre_size,
                context: format!(
                    "connection {} -> {}",
                    graph.describe(pre.id),
                    graph.describe(post.id)
                ),
            }),
        }
    }

    fn endpoint_object<'a>(graph: &'a ModelGraph, endpoint: &Endpoint) -> Result<&'a ModelObject> {
        let obj = graph
            .object(endpoint.object())
            .ok_or(VizError::ObjectNotFound(endpoint.object()))?;
        if obj.is_network() {
            return Err(VizError::InvalidConnection(format!(
                "network {} cannot be a connection endpoint",
                graph.describe(obj.id)
            )));
        }
        if endpoint.is_neurons() && obj.as_ensemble().is_none() {
            return Err(VizError::InvalidConnection(format!(
                "{} has no neurons",
                graph.describe(obj.id)
            )));
        }
        Ok(obj)
    }

    fn validate_transform(matrix: &[Vec<f64>], pre_size: usize, post_size: usize) -> Result<()> {
        if matrix.len() != post_size {
            return Err(VizError::SizeMismatch {
                expected: post_size,
                found: matrix.len(),
                context: "transform rows".to_string(),
            });
        }
        if let Some(row) = matrix.iter().find(|row| row.len() != pre_size) {
            return Err(VizError::SizeMismatch {
                expected: pre_size,
                found: row.len(),
                context: "transform columns".to_string(),
            });
        }
        Ok(())
    }
}
