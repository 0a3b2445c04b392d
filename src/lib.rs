//! Live visualization runtime for spiking neural network simulations.
//!
//! A [`Session`] binds a model, its persisted layout config and the declared
//! visualization components. Each [`RuntimeLoop`] it creates rebuilds the
//! simulation on request, letting every component splice probe and injection
//! nodes into the model graph for the duration of the build, then steps the
//! simulation on its own thread while clients drain buffered samples and
//! send messages to components by uid.

pub mod core;

// Re-export commonly used types
pub use crate::core::components::{ComponentKind, Sample, VizComponent};
pub use crate::core::config::{ConfigStore, ConfigValue, LoadReport};
pub use crate::core::error::{Result, VizError};
pub use crate::core::execution::{ConcurrencyMode, ReferenceBuilder, RuntimeConfig, SimulatorBuilder, Steppable, Topology};
pub use crate::core::model::{EnsembleSpec, ModelGraph, NodeSpec, SharedModel, SpaTarget};
pub use crate::core::runtime::{LoopControl, RuntimeLoop};
pub use crate::core::session::{ComponentDeclaration, Environment, Session};
pub use crate::core::spa::Vocabulary;
pub use crate::core::types::{Endpoint, ObjectId, Uid};
