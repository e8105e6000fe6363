//! Orchestration loop: runs, events, tool dispatch, delegation.

mod delegate;
pub mod dispatch;
pub mod events;
pub mod runner;
pub mod types;

pub use dispatch::{ResolvedTool, ToolTable};
pub use events::{RunEvent, RunEventPayload};
pub use runner::{CancelHandle, Engine, RunHandle};
pub use types::{RunId, RunResult, RunStatus};
