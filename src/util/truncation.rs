//! Context window trimming for outgoing requests.

use crate::types::Message;

/// Rough token estimate: one token per three characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(3)
}

/// The last `max_messages` entries of `history`.
pub fn window(history: &[Message], max_messages: usize) -> &[Message] {
    let start = history.len().saturating_sub(max_messages);
    &history[start..]
}

/// Keep the newest messages that fit in 75% of `max_tokens` after the
/// system prompt is accounted for. The newest message is always kept.
pub fn truncate_to_budget<'a>(
    history: &'a [Message],
    system_prompt: &str,
    max_tokens: u32,
) -> &'a [Message] {
    let budget = (max_tokens as usize * 3 / 4).saturating_sub(estimate_tokens(system_prompt));

    let mut used = 0usize;
    let mut start = history.len();
    for (index, message) in history.iter().enumerate().rev() {
        let cost = estimate_tokens(&message.content);
        if used + cost > budget && start < history.len() {
            break;
        }
        used += cost;
        start = index;
    }

    if start < history.len() {
        tracing::debug!(
            kept = history.len() - start,
            dropped = start,
            budget,
            "history truncated to token budget"
        );
    }
    &history[start..]
}
