//! Human readable strings for the activity panel.

use std::path::Path;

use serde_json::{Map, Value};

use crate::record::FieldExt;

/// Render a JSON value the way it should read in a one-line summary
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keep at most `max` characters
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Replace everything past `keep` characters with `...` once `text` is longer than `limit`
pub(crate) fn ellipsize(text: &str, limit: usize, keep: usize) -> String {
    if text.chars().count() > limit {
        format!("{}...", truncate_chars(text, keep))
    } else {
        text.to_string()
    }
}

/// First eight characters of a session id
pub(crate) fn short_id(id: &str) -> String {
    truncate_chars(id, 8)
}

pub(crate) fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn is_step_tool(tool: &str) -> bool {
    matches!(tool, "step_over" | "step_into" | "step_out")
}

/// Short description of a tool request
pub(crate) fn tool_call_details(tool: &str, request: &Map<String, Value>) -> String {
    match tool {
        "set_breakpoint" => {
            let file = request.str_field("file").unwrap_or("unknown");
            let line = request
                .get("line")
                .map(display_value)
                .unwrap_or_else(|| "?".to_string());
            format!("{}:{}", basename(file), line)
        }
        "start_debugging" => {
            let script = request.str_field("scriptPath").unwrap_or("unknown");
            format!("Script: {}", basename(script))
        }
        "create_debug_session" => {
            let name = request.str_field("name").unwrap_or("Debug Session");
            let language = request.str_field("language").unwrap_or("unknown");
            format!("{name} ({language})")
        }
        "get_variables" => {
            let scope = request
                .get("scope")
                .map(display_value)
                .unwrap_or_else(|| "all".to_string());
            format!("Scope: {scope}")
        }
        "continue_execution" => "Continuing...".to_string(),
        tool if is_step_tool(tool) => "Stepping...".to_string(),
        _ if request.is_empty() => "Processing...".to_string(),
        _ => request
            .iter()
            .take(3)
            .map(|(key, value)| format!("{}={}", key, truncate_chars(&display_value(value), 20)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Short description of a tool response
pub(crate) fn tool_response_details(tool: &str, response: &Map<String, Value>) -> String {
    match tool {
        "create_debug_session" => {
            let id = response.str_field("sessionId").unwrap_or("unknown");
            format!("Session: {}...", short_id(id))
        }
        "set_breakpoint" => {
            let line = response
                .get("line")
                .map(display_value)
                .unwrap_or_else(|| "?".to_string());
            let status = if response.bool_field("verified").unwrap_or(false) {
                "verified"
            } else {
                "pending"
            };
            format!("Line {line} ({status})")
        }
        "get_stack_trace" => {
            let frames = response.array_field("stackFrames").map_or(0, Vec::len);
            format!("{frames} frames")
        }
        "get_variables" => "Variables retrieved".to_string(),
        tool if is_step_tool(tool) => "Step complete".to_string(),
        _ => "Success".to_string(),
    }
}

/// Format a duration in milliseconds, e.g. `850ms`, `12.5s`, `5m 10s`, `2h 3m`
pub fn format_duration(milliseconds: u64) -> String {
    if milliseconds < 1000 {
        return format!("{milliseconds}ms");
    }

    let seconds = milliseconds as f64 / 1000.0;
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }

    let minutes = (seconds / 60.0) as u64;
    let remaining_seconds = (seconds % 60.0) as u64;
    if minutes < 60 {
        return format!("{minutes}m {remaining_seconds}s");
    }

    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(12_500), "12.5s");
        assert_eq!(format_duration(310_000), "5m 10s");
        assert_eq!(format_duration(7_380_000), "2h 3m");
    }

    #[test]
    fn tool_specific_call_descriptions() {
        assert_eq!(
            tool_call_details(
                "set_breakpoint",
                &object(json!({"file": "/src/app/main.py", "line": 7}))
            ),
            "main.py:7"
        );
        assert_eq!(
            tool_call_details("start_debugging", &object(json!({"scriptPath": "demo/run.py"}))),
            "Script: run.py"
        );
        assert_eq!(
            tool_call_details("create_debug_session", &object(json!({"language": "python"}))),
            "Debug Session (python)"
        );
        assert_eq!(tool_call_details("step_into", &Map::new()), "Stepping...");
        assert_eq!(tool_call_details("get_variables", &Map::new()), "Scope: all");
        assert_eq!(tool_call_details("continue_execution", &Map::new()), "Continuing...");
        assert_eq!(tool_call_details("list_threads", &Map::new()), "Processing...");
    }

    #[test]
    fn generic_call_description_uses_first_three_params() {
        let request = object(json!({
            "sessionId": "0123456789abcdefghijklmnop",
            "expression": "x + 1",
            "frameId": 3,
            "context": "repl",
        }));
        assert_eq!(
            tool_call_details("evaluate_expression", &request),
            "sessionId=0123456789abcdefghij, expression=x + 1, frameId=3"
        );
    }

    #[test]
    fn response_descriptions() {
        assert_eq!(
            tool_response_details(
                "create_debug_session",
                &object(json!({"sessionId": "abcdef123456"}))
            ),
            "Session: abcdef12..."
        );
        assert_eq!(
            tool_response_details("set_breakpoint", &object(json!({"line": 10, "verified": true}))),
            "Line 10 (verified)"
        );
        assert_eq!(
            tool_response_details("set_breakpoint", &Map::new()),
            "Line ? (pending)"
        );
        assert_eq!(
            tool_response_details("get_stack_trace", &object(json!({"stackFrames": [{}, {}]}))),
            "2 frames"
        );
        assert_eq!(tool_response_details("step_out", &Map::new()), "Step complete");
        assert_eq!(tool_response_details("close_debug_session", &Map::new()), "Success");
    }

    #[test]
    fn ellipsize_counts_characters() {
        assert_eq!(ellipsize("short", 10, 7), "short");
        assert_eq!(ellipsize("ääääääääääää", 10, 7), "äääääää...");
    }
}
