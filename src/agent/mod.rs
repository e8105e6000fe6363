//! Agents and the registry that resolves their tool sets.

pub mod definition;
pub mod registry;

pub use definition::AgentDefinition;
pub use registry::Registry;
