//! Tool system: definitions, handlers, argument access, schema validation.

pub mod arguments;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use tool::{ExecutionContext, ToolDefinition, ToolFuture, ToolHandler, ToolKind};
pub use types::{ParameterBuilder, ToolParameters};
pub use validation::validate_arguments;
