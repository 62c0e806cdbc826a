use std::{fmt, str::FromStr};

use chrono::{DateTime, Local, TimeZone};
use serde_json::{Map, Value};

/// The `message` discriminator of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ToolCall,
    ToolResponse,
    ToolError,
    SessionCreated,
    SessionClosed,
    DebugState,
    DebugBreakpoint,
    DebugVariables,
    DebugOutput,
    DebugStackTrace,
    DebugScopes,
}

impl EventKind {
    /// Every discriminator the visualizer understands
    pub const ALL: [EventKind; 11] = [
        EventKind::ToolCall,
        EventKind::ToolResponse,
        EventKind::ToolError,
        EventKind::SessionCreated,
        EventKind::SessionClosed,
        EventKind::DebugState,
        EventKind::DebugBreakpoint,
        EventKind::DebugVariables,
        EventKind::DebugOutput,
        EventKind::DebugStackTrace,
        EventKind::DebugScopes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ToolCall => "tool:call",
            EventKind::ToolResponse => "tool:response",
            EventKind::ToolError => "tool:error",
            EventKind::SessionCreated => "session:created",
            EventKind::SessionClosed => "session:closed",
            EventKind::DebugState => "debug:state",
            EventKind::DebugBreakpoint => "debug:breakpoint",
            EventKind::DebugVariables => "debug:variables",
            EventKind::DebugOutput => "debug:output",
            EventKind::DebugStackTrace => "debug:stack_trace",
            EventKind::DebugScopes => "debug:scopes",
        }
    }
}

impl FromStr for EventKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecordError::UnknownDiscriminator(s.to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a log line does not yield a record. None of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The line was empty or whitespace
    #[error("empty line")]
    Empty,

    /// The line was not a JSON object
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The object carried no string `message` field
    #[error("missing message discriminator")]
    MissingDiscriminator,

    /// The `message` field named an event this visualizer does not handle
    #[error("unknown message discriminator {0:?}")]
    UnknownDiscriminator(String),
}

/// One parsed log line
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub kind: EventKind,
    /// Milliseconds since the unix epoch, if the producer stamped the record
    pub timestamp: Option<f64>,
    fields: Map<String, Value>,
}

impl LogRecord {
    /// Decode a single log line
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(RecordError::Empty);
        }
        let value: Value = serde_json::from_str(line).map_err(RecordError::Json)?;
        Self::from_value(value)
    }

    /// Build a record from an already decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let Value::Object(fields) = value else {
            return Err(RecordError::MissingDiscriminator);
        };
        let kind: EventKind = fields
            .get("message")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingDiscriminator)?
            .parse()?;
        let timestamp = fields.get("timestamp").and_then(Value::as_f64);
        Ok(Self {
            kind,
            timestamp,
            fields,
        })
    }

    /// All fields of the record, including `message`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The record timestamp in local time
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        let millis = self.timestamp?;
        Local.timestamp_millis_opt(millis as i64).single()
    }

    /// The record timestamp formatted as `HH:MM:SS.mmm`
    pub fn readable_time(&self) -> Option<String> {
        self.local_time()
            .map(|t| t.format("%H:%M:%S%.3f").to_string())
    }
}

/// Lenient accessors over JSON objects. A field of the wrong type reads as absent.
pub trait FieldExt {
    fn str_field(&self, key: &str) -> Option<&str>;

    /// String field that is present and not empty
    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.str_field(key).filter(|s| !s.is_empty())
    }

    /// Positive line number (0 reads as absent)
    fn line_field(&self, key: &str) -> Option<usize>;

    fn count_field(&self, key: &str) -> Option<u64>;

    fn bool_field(&self, key: &str) -> Option<bool>;

    fn object_field(&self, key: &str) -> Option<&Map<String, Value>>;

    fn array_field(&self, key: &str) -> Option<&Vec<Value>>;
}

impl FieldExt for Map<String, Value> {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn line_field(&self, key: &str) -> Option<usize> {
        let line = match self.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        usize::try_from(line).ok().filter(|l| *l > 0)
    }

    fn count_field(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            _ => None,
        }
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    fn array_field(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }
}

impl FieldExt for LogRecord {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.str_field(key)
    }

    fn line_field(&self, key: &str) -> Option<usize> {
        self.fields.line_field(key)
    }

    fn count_field(&self, key: &str) -> Option<u64> {
        self.fields.count_field(key)
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.bool_field(key)
    }

    fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.object_field(key)
    }

    fn array_field(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.array_field(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_known_record() {
        let record =
            LogRecord::parse(r#"{"message":"tool:call","tool":"step_over","timestamp":1700000000000}"#)
                .unwrap();
        assert_eq!(record.kind, EventKind::ToolCall);
        assert_eq!(record.str_field("tool"), Some("step_over"));
        assert_eq!(record.timestamp, Some(1700000000000.0));
        assert!(record.readable_time().is_some());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(LogRecord::parse("   "), Err(RecordError::Empty)));
        assert!(matches!(
            LogRecord::parse("{\"message\": \"tool:ca"),
            Err(RecordError::Json(_))
        ));
        assert!(matches!(
            LogRecord::parse("[1, 2, 3]"),
            Err(RecordError::MissingDiscriminator)
        ));
        assert!(matches!(
            LogRecord::parse(r#"{"tool":"x"}"#),
            Err(RecordError::MissingDiscriminator)
        ));
        assert!(matches!(
            LogRecord::parse(r#"{"message":"server started"}"#),
            Err(RecordError::UnknownDiscriminator(m)) if m == "server started"
        ));
    }

    #[test]
    fn discriminators_round_trip_through_from_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn lenient_field_access() {
        let record = LogRecord::from_value(json!({
            "message": "debug:breakpoint",
            "line": "12",
            "zero": 0,
            "file": "",
            "verified": "yes",
        }))
        .unwrap();

        assert_eq!(record.line_field("line"), Some(12));
        assert_eq!(record.line_field("zero"), None);
        assert_eq!(record.line_field("missing"), None);
        assert_eq!(record.str_field("file"), Some(""));
        assert_eq!(record.non_empty_str("file"), None);
        assert_eq!(record.bool_field("verified"), None);
        assert!(record.local_time().is_none());
    }
}
