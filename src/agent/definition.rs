//! Agent definitions.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// One role in the conversation: prompt, model parameters, and the tools,
/// handoff targets, and workers it may use.
///
/// ```
/// use baton::agent::AgentDefinition;
///
/// let triage = AgentDefinition::builder()
///     .id("triage")
///     .name("Triage Agent")
///     .system_prompt("Route the user to the right specialist.")
///     .handoffs(vec!["bookkeeper".to_string()])
///     .build();
/// assert_eq!(triage.handoffs, ["bookkeeper"]);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[builder(on(String, into))]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    #[builder(default)]
    #[serde(default)]
    pub description: String,
    /// Base prompt; the tool catalog is appended at request time.
    pub system_prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Ids of registered tools this agent may call.
    #[builder(default)]
    #[serde(default)]
    pub tools: Vec<String>,
    /// Ids of agents this agent may transfer the conversation to.
    #[builder(default)]
    #[serde(default)]
    pub handoffs: Vec<String>,
    /// Ids of agents this agent may consult as isolated workers.
    #[builder(default)]
    #[serde(default)]
    pub delegates: Vec<String>,
}

impl AgentDefinition {
    /// Model name, falling back to `default` when the agent does not pin one.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default)
    }
}
