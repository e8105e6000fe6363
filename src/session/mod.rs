//! In-memory session store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

/// One conversation: its history and the agent currently holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub current_agent_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String, initial_agent_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            current_agent_id: initial_agent_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Summary of a session: message counts per role plus ownership and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub message_count: usize,
    pub system: usize,
    pub user: usize,
    pub assistant: usize,
    pub tool: usize,
    pub current_agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Keeps sessions keyed by id.
///
/// Histories are append-only through this API; the only way to shrink one
/// is [`SessionStore::clear_messages`] or deleting the session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session owned by `initial_agent_id` and return its id.
    pub fn create_session(&self, initial_agent_id: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), initial_agent_id.into());
        tracing::debug!(session_id = %id, agent_id = %session.current_agent_id, "session created");
        write(&self.sessions).insert(id.clone(), session);
        id
    }

    /// Snapshot of a session.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        read(&self.sessions).get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        read(&self.sessions).contains_key(session_id)
    }

    /// Full history, oldest first. Empty for unknown sessions.
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        read(&self.sessions)
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// The last `limit` messages, oldest first.
    pub fn recent_messages(&self, session_id: &str, limit: usize) -> Vec<Message> {
        read(&self.sessions)
            .get(session_id)
            .map(|s| {
                let start = s.messages.len().saturating_sub(limit);
                s.messages[start..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Append a message. Returns `false` (and stores nothing) for unknown sessions.
    pub fn append_message(&self, session_id: &str, message: Message) -> bool {
        match write(&self.sessions).get_mut(session_id) {
            Some(session) => {
                session.messages.push(message);
                session.touch();
                true
            }
            None => {
                tracing::warn!(session_id, "append to unknown session ignored");
                false
            }
        }
    }

    /// Hand the session to another agent. Returns `false` for unknown sessions.
    pub fn set_current_agent(&self, session_id: &str, agent_id: impl Into<String>) -> bool {
        match write(&self.sessions).get_mut(session_id) {
            Some(session) => {
                session.current_agent_id = agent_id.into();
                session.touch();
                true
            }
            None => false,
        }
    }

    pub fn current_agent(&self, session_id: &str) -> Option<String> {
        read(&self.sessions)
            .get(session_id)
            .map(|s| s.current_agent_id.clone())
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        write(&self.sessions).remove(session_id).is_some()
    }

    /// Drop the history but keep the session and its current agent.
    pub fn clear_messages(&self, session_id: &str) -> bool {
        match write(&self.sessions).get_mut(session_id) {
            Some(session) => {
                session.messages.clear();
                session.touch();
                true
            }
            None => false,
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        read(&self.sessions).keys().cloned().collect()
    }

    /// Ids of the sessions currently held by `agent_id`, sorted.
    pub fn sessions_for_agent(&self, agent_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.sessions)
            .values()
            .filter(|s| s.current_agent_id == agent_id)
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn stats(&self, session_id: &str) -> Option<SessionStats> {
        let sessions = read(&self.sessions);
        let session = sessions.get(session_id)?;
        let mut stats = SessionStats {
            message_count: session.messages.len(),
            system: 0,
            user: 0,
            assistant: 0,
            tool: 0,
            current_agent_id: session.current_agent_id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        };
        for message in &session.messages {
            match message.role {
                Role::System => stats.system += 1,
                Role::User => stats.user += 1,
                Role::Assistant => stats.assistant += 1,
                Role::Tool => stats.tool += 1,
            }
        }
        Some(stats)
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn created_sessions_start_empty_with_initial_agent() {
        let store = SessionStore::new();
        let id = store.create_session("triage");
        let other = store.create_session("triage");
        assert_ne!(id, other);
        assert_eq!(store.current_agent(&id).as_deref(), Some("triage"));
        assert!(store.messages(&id).is_empty());
    }

    #[test]
    fn append_preserves_order_and_bumps_updated_at() {
        let store = SessionStore::new();
        let id = store.create_session("a");
        let before = store.session(&id).unwrap().updated_at;
        assert!(store.append_message(&id, Message::user("one")));
        assert!(store.append_message(&id, Message::assistant("two")));

        let session = store.session(&id).unwrap();
        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert!(session.updated_at >= before);
    }

    #[test]
    fn unknown_session_is_a_noop() {
        let store = SessionStore::new();
        assert!(!store.append_message("missing", Message::user("hi")));
        assert!(!store.set_current_agent("missing", "b"));
        assert!(store.messages("missing").is_empty());
        assert_eq!(store.current_agent("missing"), None);
        assert_eq!(store.stats("missing"), None);
    }

    #[test]
    fn recent_messages_keeps_the_tail() {
        let store = SessionStore::new();
        let id = store.create_session("a");
        for i in 0..5 {
            store.append_message(&id, Message::user(format!("m{i}")));
        }
        let tail: Vec<_> = store
            .recent_messages(&id, 2)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(store.recent_messages(&id, 50).len(), 5);
    }

    #[test]
    fn clear_keeps_session_and_agent() {
        let store = SessionStore::new();
        let id = store.create_session("a");
        store.append_message(&id, Message::user("hi"));
        store.set_current_agent(&id, "b");
        assert!(store.clear_messages(&id));
        assert!(store.messages(&id).is_empty());
        assert_eq!(store.current_agent(&id).as_deref(), Some("b"));
        assert!(store.delete_session(&id));
        assert!(!store.contains(&id));
    }

    #[test]
    fn sessions_for_agent_follows_handoffs() {
        let store = SessionStore::new();
        let a = store.create_session("triage");
        let b = store.create_session("triage");
        let c = store.create_session("ledger");

        let mut expected = vec![a.clone(), b.clone()];
        expected.sort();
        assert_eq!(store.sessions_for_agent("triage"), expected);

        store.set_current_agent(&b, "ledger");
        assert_eq!(store.sessions_for_agent("triage"), vec![a]);
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(store.sessions_for_agent("ledger"), expected);
        assert!(store.sessions_for_agent("ghost").is_empty());
    }

    #[test]
    fn stats_count_roles() {
        let store = SessionStore::new();
        let id = store.create_session("a");
        store.append_message(&id, Message::user("q"));
        store.append_message(&id, Message::assistant("a"));
        store.append_message(&id, Message::system("note"));
        store.append_message(&id, Message::tool_result("lookup", &serde_json::json!({"ok": true})));
        let stats = store.stats(&id).unwrap();
        assert_eq!(
            (stats.message_count, stats.system, stats.user, stats.assistant, stats.tool),
            (4, 1, 1, 1, 1)
        );
        assert_eq!(stats.current_agent_id, "a");
        assert!(stats.updated_at >= stats.created_at);
    }
}
