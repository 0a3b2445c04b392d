pub mod config;
pub mod simulator;

// Re-export commonly used types
pub use config::{ConcurrencyMode, RuntimeConfig};
pub use simulator::{ReferenceBuilder, Simulator, SimulatorBuilder, Steppable, Topology};
