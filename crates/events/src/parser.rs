use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use chrono::Local;
use serde::Deserialize;
use serde_json::{Map, Value};
use state::{ActivityEntry, ActivityStatus, SharedState};

use crate::{
    format::{
        display_value, ellipsize, format_duration, short_id, tool_call_details,
        tool_response_details,
    },
    paths::normalise_path,
    pending_requests::PendingRequests,
    record::{EventKind, FieldExt, LogRecord},
};

const MAX_VARIABLES: usize = 20;

/// One entry of a `debug:variables` payload
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VariableEntry {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    value: Value,
}

impl VariableEntry {
    fn display(&self) -> String {
        let value = display_value(&self.value);
        let text = if self.type_name.is_empty() || self.type_name == "object" {
            value
        } else {
            format!("{} ({})", value, self.type_name)
        };
        ellipsize(&text, 60, 57)
    }
}

/// Folds log records into the shared [`state::DebugState`].
///
/// Every handler tolerates missing or mistyped fields: a missing value either takes a
/// default or skips the state update that needs it.
#[derive(Clone)]
pub struct EventParser {
    state: SharedState,
    pending: Arc<Mutex<PendingRequests>>,
}

impl EventParser {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            pending: Arc::new(Mutex::new(PendingRequests::default())),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Dispatch a record to the handler for its discriminator
    pub fn handle(&self, record: &LogRecord) -> eyre::Result<()> {
        match record.kind {
            EventKind::ToolCall => self.parse_tool_call(record),
            EventKind::ToolResponse => self.parse_tool_response(record),
            EventKind::ToolError => self.parse_tool_error(record),
            EventKind::SessionCreated => self.parse_session_created(record),
            EventKind::SessionClosed => self.parse_session_closed(record),
            EventKind::DebugState => self.parse_debug_state(record),
            EventKind::DebugBreakpoint => self.parse_debug_breakpoint(record),
            EventKind::DebugVariables => self.parse_debug_variables(record),
            EventKind::DebugOutput => self.parse_debug_output(record),
            EventKind::DebugStackTrace => self.parse_debug_stack_trace(record),
            EventKind::DebugScopes => self.parse_debug_scopes(record),
        }
    }

    fn with_pending<F, T>(&self, f: F) -> eyre::Result<T>
    where
        F: FnOnce(&mut PendingRequests) -> T,
    {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| eyre::eyre!("pending requests mutex poisoned: {}", e))?;
        Ok(f(&mut pending))
    }

    fn activity(
        record: &LogRecord,
        tool: &str,
        status: ActivityStatus,
        details: impl Into<String>,
    ) -> ActivityEntry {
        let timestamp = record.local_time().unwrap_or_else(Local::now);
        ActivityEntry::new(tool, status, details).at(timestamp)
    }

    fn push_activity(&self, entry: ActivityEntry) -> eyre::Result<()> {
        self.state.with_state(|state| state.add_activity(entry))
    }

    pub fn parse_tool_call(&self, record: &LogRecord) -> eyre::Result<()> {
        let tool = record.str_field("tool").unwrap_or("unknown");
        let request = record.object_field("request").cloned().unwrap_or_default();
        let details = tool_call_details(tool, &request);
        tracing::debug!(%tool, "tool call");

        self.with_pending(|pending| pending.add(tool, request))?;
        self.push_activity(Self::activity(
            record,
            tool,
            ActivityStatus::Calling,
            details,
        ))
    }

    pub fn parse_tool_response(&self, record: &LogRecord) -> eyre::Result<()> {
        let tool = record.str_field("tool").unwrap_or("unknown");
        let empty = Map::new();
        let response = record.object_field("response").unwrap_or(&empty);
        let success = record.bool_field("success").unwrap_or(true);
        let remembered = self.with_pending(|pending| pending.take(tool))?;

        let status = if success {
            ActivityStatus::Success
        } else {
            ActivityStatus::Error
        };
        let entry = Self::activity(
            record,
            tool,
            status,
            tool_response_details(tool, response),
        );

        let breakpoint = if tool == "set_breakpoint" && success {
            let request = record.object_field("request").or(remembered.as_ref());
            let file = response
                .non_empty_str("file")
                .or_else(|| request.and_then(|r| r.non_empty_str("file")));
            let line = response
                .line_field("line")
                .or_else(|| request.and_then(|r| r.line_field("line")));
            match (file, line) {
                (Some(file), Some(line)) => Some((normalise_path(file), line)),
                _ => {
                    tracing::debug!("set_breakpoint response without file or line");
                    None
                }
            }
        } else {
            None
        };

        self.state.with_state(|state| {
            state.add_activity(entry);
            if let Some((file_path, line)) = breakpoint {
                state.set_breakpoint(file_path.clone(), line);
                state.update_location(file_path, line);
            }
        })
    }

    pub fn parse_tool_error(&self, record: &LogRecord) -> eyre::Result<()> {
        let tool = record.str_field("tool").unwrap_or("unknown");
        let error = record
            .fields()
            .get("error")
            .map(display_value)
            .unwrap_or_else(|| "Unknown error".to_string());
        self.with_pending(|pending| pending.take(tool))?;

        self.push_activity(Self::activity(
            record,
            tool,
            ActivityStatus::Error,
            format!("Error: {error}"),
        ))
    }

    pub fn parse_session_created(&self, record: &LogRecord) -> eyre::Result<()> {
        let session_id = record.non_empty_str("sessionId").map(str::to_string);
        let session_name = record
            .str_field("sessionName")
            .unwrap_or("Debug Session")
            .to_string();

        let mut details = match &session_id {
            Some(id) => format!("Created: {}", short_id(id)),
            None => "Created: unknown".to_string(),
        };
        if let Some(language) = record.fields().get("language") {
            details.push_str(&format!(" ({})", display_value(language)));
        }
        tracing::info!(session_id = ?session_id, "session created");

        let entry = Self::activity(record, "session", ActivityStatus::Success, details);
        self.state.with_state(|state| {
            state.set_session(session_id, Some(session_name));
            state.add_activity(entry);
        })
    }

    pub fn parse_session_closed(&self, record: &LogRecord) -> eyre::Result<()> {
        let closed_id = record.str_field("sessionId");
        let duration = record.count_field("duration").unwrap_or(0);
        let entry = Self::activity(
            record,
            "session",
            ActivityStatus::Info,
            format!("Closed after {}", format_duration(duration)),
        );
        tracing::info!(session_id = ?closed_id, duration, "session closed");

        self.state.with_state(|state| {
            state.add_activity(entry);
            let is_current = match closed_id {
                None => true,
                Some(id) => state.session_id.as_deref() == Some(id),
            };
            if is_current {
                state.reset_session();
            }
        })
    }

    pub fn parse_debug_state(&self, record: &LogRecord) -> eyre::Result<()> {
        match record.str_field("event").unwrap_or_default() {
            "paused" => {
                let empty = Map::new();
                let location = record.object_field("location").unwrap_or(&empty);
                let file = location.non_empty_str("file");
                let line = location.line_field("line");
                let function = location.non_empty_str("function");
                let reason = record
                    .fields()
                    .get("reason")
                    .map(display_value)
                    .unwrap_or_else(|| "unknown".to_string());

                let mut message = format!("Paused: {reason}");
                if let Some(line) = line {
                    message.push_str(&format!(" at line {line}"));
                }
                if let Some(function) = function {
                    message.push_str(&format!(" in {function}()"));
                }

                let target = file.zip(line).map(|(file, line)| (normalise_path(file), line));
                let entry = Self::activity(record, "debug", ActivityStatus::Info, message);
                self.state.with_state(|state| {
                    state.is_paused = true;
                    if let Some((file_path, line)) = target {
                        state.update_location(file_path, line);
                    }
                    state.add_activity(entry);
                })
            }
            event @ ("running" | "stopped") => {
                let message = if event == "running" {
                    "Running"
                } else {
                    "Stopped"
                };
                let entry = Self::activity(record, "debug", ActivityStatus::Info, message);
                self.state.with_state(|state| {
                    state.is_paused = false;
                    state.add_activity(entry);
                })
            }
            other => {
                tracing::trace!(event = %other, "ignoring debug state event");
                Ok(())
            }
        }
    }

    pub fn parse_debug_breakpoint(&self, record: &LogRecord) -> eyre::Result<()> {
        let event = record.str_field("event").unwrap_or_default();
        let (Some(file), Some(line)) = (record.non_empty_str("file"), record.line_field("line"))
        else {
            tracing::debug!(%event, "breakpoint event without file or line");
            return Ok(());
        };
        let file_path = normalise_path(file);
        let verified = record.bool_field("verified").unwrap_or(false);

        let (status, message) = match event {
            "set" => (ActivityStatus::Info, format!("Breakpoint set at line {line}")),
            "verified" if verified => (
                ActivityStatus::Success,
                format!("Breakpoint verified at line {line}"),
            ),
            "verified" => (
                ActivityStatus::Warning,
                format!("Breakpoint unverified at line {line}"),
            ),
            "hit" => (ActivityStatus::Info, format!("Hit breakpoint at line {line}")),
            "removed" => (
                ActivityStatus::Info,
                format!("Breakpoint removed at line {line}"),
            ),
            other => (
                ActivityStatus::Info,
                format!("Breakpoint {other} at line {line}"),
            ),
        };

        let entry = Self::activity(record, "breakpoint", status, message);
        self.state.with_state(|state| {
            match event {
                "set" => state.set_breakpoint(file_path, line),
                "hit" => {
                    state.is_paused = true;
                    state.update_location(file_path, line);
                }
                "removed" => state.remove_breakpoint(&file_path, line),
                _ => {}
            }
            state.add_activity(entry);
        })
    }

    pub fn parse_debug_variables(&self, record: &LogRecord) -> eyre::Result<()> {
        let entries = record.array_field("variables").map(Vec::as_slice).unwrap_or_default();
        let count = record
            .count_field("variableCount")
            .unwrap_or(entries.len() as u64);

        let variables: BTreeMap<String, String> = entries
            .iter()
            .take(MAX_VARIABLES)
            .map(|value| VariableEntry::deserialize(value).unwrap_or_default())
            .filter(|entry| !entry.name.is_empty())
            .map(|entry| {
                let display = entry.display();
                (entry.name, display)
            })
            .collect();

        let shown = variables.len() as u64;
        let message = if count > shown {
            format!("Retrieved {shown} of {count} variables")
        } else {
            format!("Retrieved {count} variables")
        };

        let entry = Self::activity(record, "variables", ActivityStatus::Success, message);
        self.state.with_state(|state| {
            state.update_variables(variables);
            state.add_activity(entry);
        })
    }

    pub fn parse_debug_output(&self, record: &LogRecord) -> eyre::Result<()> {
        let category = record.str_field("category").unwrap_or("output");
        let Some(output) = record.non_empty_str("output") else {
            return Ok(());
        };
        let output = ellipsize(output, 100, 97);
        let output = output.trim_end_matches('\n');

        self.push_activity(Self::activity(
            record,
            "output",
            ActivityStatus::Info,
            format!("{category}: {output}"),
        ))
    }

    pub fn parse_debug_stack_trace(&self, record: &LogRecord) -> eyre::Result<()> {
        let frames = record.count_field("frameCount").unwrap_or(0);
        self.push_activity(Self::activity(
            record,
            "stack_trace",
            ActivityStatus::Success,
            format!("Got {frames} frames"),
        ))
    }

    pub fn parse_debug_scopes(&self, record: &LogRecord) -> eyre::Result<()> {
        let scopes = record.array_field("scopes").map_or(0, Vec::len);
        self.push_activity(Self::activity(
            record,
            "scopes",
            ActivityStatus::Success,
            format!("Got {scopes} scopes"),
        ))
    }
}
