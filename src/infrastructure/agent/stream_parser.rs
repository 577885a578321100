//! Parse Claude Code `--output-format stream-json` lines.

use serde_json::Value;

use crate::domain::models::{AgentEvent, AgentEventKind, AgentOutput, AgentResult};

/// Turn one stdout line into an [`AgentOutput`].
///
/// Lines that are not JSON objects become [`AgentOutput::Raw`].
pub fn parse_output_line(line: &str) -> AgentOutput {
    let trimmed = line.trim();
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return AgentOutput::Raw(line.to_string());
    };
    if !value.is_object() {
        return AgentOutput::Raw(line.to_string());
    }

    let session_id = value
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let event_type = value.get("type").and_then(Value::as_str).unwrap_or_default();

    let kind = match event_type {
        "system" | "init" => AgentEventKind::System,
        "assistant" => assistant_kind(&value),
        "message" => AgentEventKind::Message,
        "tool_use" => AgentEventKind::ToolUse,
        "user" => AgentEventKind::User,
        "text" => AgentEventKind::Text(string_field(&value, "text")),
        "error" => AgentEventKind::Error(error_message(&value)),
        "result" => AgentEventKind::Result(AgentResult {
            is_error: value.get("is_error").and_then(Value::as_bool).unwrap_or(false),
            result: value.get("result").and_then(Value::as_str).map(str::to_string),
            total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
        }),
        other => AgentEventKind::Other(other.to_string()),
    };

    AgentOutput::Event(AgentEvent {
        session_id,
        kind,
        raw: line.to_string(),
    })
}

fn assistant_kind(value: &Value) -> AgentEventKind {
    let content = value
        .pointer("/message/content")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut texts = Vec::new();
    let mut tool_uses = 0u32;
    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    texts.push(text.to_string());
                }
            }
            Some("tool_use") => tool_uses += 1,
            _ => {}
        }
    }
    AgentEventKind::Assistant { texts, tool_uses }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn error_message(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
        .map_or_else(|| value.to_string(), str::to_string)
}
