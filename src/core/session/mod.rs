pub mod declaration;
pub mod environment;
pub mod organizer;

// Re-export commonly used types
pub use declaration::{ComponentDeclaration, DEFAULT_SPA_TARGET};
pub use environment::{Environment, ROOT_NAME};
pub use organizer::{Session, COMPONENT_PREFIX, DEFAULT_NET_GRAPH, DEFAULT_SIM_CONTROL};
