pub mod components;
pub mod config;
pub mod error;
pub mod execution;
pub mod model;
pub mod runtime;
pub mod session;
pub mod spa;
pub mod types;
