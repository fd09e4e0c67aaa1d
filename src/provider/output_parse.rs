use crate::provider::AgentResponse;
use serde_json::Value;

const EXECUTION_ERROR_SUBTYPE: &str = "error_during_execution";

/// Decodes a line-delimited event stream. Blank lines and lines that are not
/// JSON are skipped; the agent interleaves the occasional plain diagnostic.
pub fn parse_stream_events(raw: &str) -> Vec<Value> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .collect()
}

/// Last event tagged `"type": "result"`.
pub fn terminal_result_event(events: &[Value]) -> Option<&Value> {
    events
        .iter()
        .rev()
        .find(|event| event.get("type").and_then(Value::as_str) == Some("result"))
}

fn response_from_result_event(event: &Value) -> AgentResponse {
    let session_id = event
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    if event.get("subtype").and_then(Value::as_str) == Some(EXECUTION_ERROR_SUBTYPE) {
        return AgentResponse {
            output: "Error during execution: agent encountered an error".to_string(),
            success: false,
            session_id,
        };
    }

    let is_error = event
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    AgentResponse {
        output: event
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        success: !is_error,
        session_id,
    }
}

/// Interprets the stream of a process that exited zero. Without a terminal
/// result event the raw text is returned as a degraded success.
pub fn response_from_stream(raw: &str) -> AgentResponse {
    let events = parse_stream_events(raw);
    match terminal_result_event(&events) {
        Some(event) => response_from_result_event(event),
        None => AgentResponse {
            output: raw.to_string(),
            success: true,
            session_id: None,
        },
    }
}
