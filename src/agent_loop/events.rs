//! Run event stream types.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::types::RunId;

/// What happened during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Started,
    /// Incremental model output, tagged with the agent producing it.
    TextDelta {
        agent_id: String,
        text: String,
    },
    /// The model asked for a tool. Emitted before the call is resolved, so
    /// unknown tools show up here too.
    ToolCall {
        agent_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    ToolResult {
        agent_id: String,
        tool_name: String,
        result: serde_json::Value,
        is_error: bool,
    },
    AgentChanged {
        from: String,
        to: String,
    },
    Completed {
        agent_id: String,
        text: String,
    },
    Failed {
        error: String,
    },
    Canceled,
}

/// Envelope for streaming run events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    /// Starts at 1 and increases by one per event within a run.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(1),
            tx,
        }
    }

    /// Delivery is best effort: a host that dropped its handle stops
    /// receiving events but the run keeps going.
    pub(crate) fn emit(&self, payload: RunEventPayload) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(RunEvent {
            run_id: self.run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
