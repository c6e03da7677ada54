// src/functions/mod.rs

pub mod implementations;
pub mod registry;
pub mod types;

pub use registry::{default_registry, FunctionRegistry};
pub use types::{truncate_at, ChatFunction, FunctionDefinition};
