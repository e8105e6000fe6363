//! Baton: multi-agent conversation orchestration
//!
//! Drives a chat-completion model through a graph of specialised agents.
//! Each step streams the current agent's answer, looks for a JSON tool call
//! in it, and either runs the tool, hands the session to another agent, or
//! finishes with a plain answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use baton::prelude::*;
//!
//! # async fn example() -> baton::error::Result<()> {
//! let config = BatonConfig::from_env();
//! let registry = Arc::new(Registry::new());
//! registry.register_agent(
//!     AgentDefinition::builder()
//!         .id("assistant")
//!         .name("Assistant")
//!         .system_prompt("You are a helpful assistant.")
//!         .build(),
//! );
//!
//! let client = Arc::new(StreamingClient::new(config.clone())?);
//! let engine = Engine::new(registry, Arc::new(SessionStore::new()), client, config);
//! let session = engine.create_session("assistant")?;
//!
//! let mut run = engine.run(&session, "Hello!")?;
//! while let Some(event) = run.next_event().await {
//!     if let RunEventPayload::TextDelta { text, .. } = event.payload {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod error;
pub mod parser;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;

pub use agent_loop::Engine;
