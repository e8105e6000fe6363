//! Lenient extraction of tool calls from free-form model text.
//!
//! Models are asked to answer with a JSON object when they want to call a
//! tool, but they wrap it in prose, code fences, or comments. Precedence:
//! fenced code block, then the span between the first `{` and the last `}`.
//! Anything that still fails to parse is treated as a plain answer.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::tools::ToolDefinition;

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)\s*```").expect("fenced block regex must compile")
});

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("block comment regex must compile"));

// `//` not preceded by `:` (URLs) or `\` (escaped), up to end of line.
static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^:\\])//[^\n]*").expect("line comment regex must compile")
});

/// A tool invocation recovered from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    /// Always a JSON object.
    pub args: Value,
}

/// Extract a tool call from `text`, or `None` when the text is a plain answer.
pub fn parse_tool_call(text: &str) -> Option<ParsedToolCall> {
    if let Some(captures) = FENCED_BLOCK_RE.captures(text) {
        let inner = captures.get(1).map_or("", |m| m.as_str());
        if let Some(call) = parse_candidate(brace_span(inner).unwrap_or(inner)) {
            return Some(call);
        }
    }
    brace_span(text).and_then(parse_candidate)
}

/// Append the tool catalog to an agent's base prompt. With no tools the
/// base prompt is returned unchanged.
pub fn build_system_prompt(base: &str, tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return base.to_string();
    }

    let catalog: Vec<Value> = tools
        .iter()
        .map(|tool| {
            serde_json::json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters.schema,
            })
        })
        .collect();
    let rendered =
        serde_json::to_string_pretty(&catalog).unwrap_or_else(|_| Value::Array(catalog).to_string());

    format!(
        "{base}\n\n### Tool Usage Instructions\n\
         You have access to the following tools. To call a tool, reply with ONLY a JSON object \
         in this exact format and nothing else:\n\
         ```json\n{{\"tool\": \"tool_name\", \"arguments\": {{\"param\": \"value\"}}}}\n```\n\
         Call at most one tool per reply. When no tool is needed, answer the user directly.\n\n\
         Available tools:\n{rendered}"
    )
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_candidate(candidate: &str) -> Option<ParsedToolCall> {
    let cleaned = clean(candidate);
    let value: Value = serde_json::from_str(cleaned.trim()).ok()?;
    interpret(value)
}

fn clean(text: &str) -> String {
    let printable: String = text
        .chars()
        .filter(|&c| !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}'))
        .collect();
    let without_blocks = BLOCK_COMMENT_RE.replace_all(&printable, "");
    LINE_COMMENT_RE
        .replace_all(&without_blocks, "$1")
        .into_owned()
}

fn interpret(value: Value) -> Option<ParsedToolCall> {
    let Value::Object(mut obj) = value else {
        return None;
    };

    if let Some(Value::String(name)) = obj.get("tool").cloned() {
        let raw_args = obj
            .remove("arguments")
            .or_else(|| obj.remove("args"))
            .unwrap_or(Value::Null);
        return Some(ParsedToolCall {
            name,
            args: normalize_args(raw_args)?,
        });
    }

    let function = obj.get_mut("function")?.as_object_mut()?;
    let name = function.get("name")?.as_str()?.to_string();
    let raw_args = function.remove("arguments").unwrap_or(Value::Null);
    Some(ParsedToolCall {
        name,
        args: normalize_args(raw_args)?,
    })
}

fn normalize_args(raw: Value) -> Option<Value> {
    match raw {
        Value::Null => Some(Value::Object(Default::default())),
        Value::Object(_) => Some(raw),
        Value::String(encoded) if encoded.trim().is_empty() => {
            Some(Value::Object(Default::default()))
        }
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded).ok()? {
            decoded @ Value::Object(_) => Some(decoded),
            _ => None,
        },
        _ => None,
    }
}
