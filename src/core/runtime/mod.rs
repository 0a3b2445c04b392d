pub mod control;
pub mod registry;
pub mod runtime_loop;

// Re-export commonly used types
pub use control::LoopControl;
pub use registry::ComponentRegistry;
pub use runtime_loop::RuntimeLoop;
