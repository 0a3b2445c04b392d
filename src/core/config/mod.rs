pub mod handle;
pub mod schema;
pub mod statement;
pub mod store;
pub mod value;

// Re-export commonly used types
pub use handle::{lock_config, ConfigHandle, SharedConfig};
pub use schema::declare_viz_schemas;
pub use statement::{check_identifier, is_identifier, parse_literal, parse_statement, Constructor, Statement};
pub use store::{ConfigStore, FieldSchema, LineError, LoadReport, Namespace};
pub use value::ConfigValue;
