//! The state module holds the canonical model of the observed debugging session.
//!
//! [`DebugState`] is mutated by the event parser on the tailer thread and read by the
//! render loop through [`SharedState::snapshot`], so a frame never observes half an event.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Local};

/// Default number of activity entries retained
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 20;

/// Outcome attached to a single activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityStatus {
    Calling,
    Success,
    Error,
    Info,
    Warning,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Calling => "calling",
            ActivityStatus::Success => "success",
            ActivityStatus::Error => "error",
            ActivityStatus::Info => "info",
            ActivityStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool invocation, response or debugger notification
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub tool: String,
    pub status: ActivityStatus,
    pub details: String,
    pub timestamp: DateTime<Local>,
}

impl ActivityEntry {
    /// Create an entry stamped with the current local time
    pub fn new(tool: impl Into<String>, status: ActivityStatus, details: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            status,
            details: details.into(),
            timestamp: Local::now(),
        }
    }

    /// Override the timestamp, e.g. with the one carried by the log record
    pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A location in code (file + 1-indexed line number)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeLocation {
    pub file_path: PathBuf,
    pub line: usize,
}

impl CodeLocation {
    pub fn new(file_path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line,
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| self.file_path.to_string_lossy());
        write!(f, "{}:{}", name, self.line)
    }
}

/// Central model of the debugging session as reconstructed from the log
#[derive(Debug, Clone)]
pub struct DebugState {
    pub session_id: Option<String>,
    pub session_name: Option<String>,
    pub current_location: Option<CodeLocation>,
    pub is_paused: bool,

    // invariant: no file maps to an empty set
    breakpoints: HashMap<PathBuf, BTreeSet<usize>>,
    variables: BTreeMap<String, String>,
    activity: VecDeque<ActivityEntry>,
    activity_capacity: usize,
}

impl Default for DebugState {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl DebugState {
    /// Create an empty state retaining at most `activity_capacity` activity entries
    pub fn with_capacity(activity_capacity: usize) -> Self {
        let activity_capacity = activity_capacity.max(1);
        Self {
            session_id: None,
            session_name: None,
            current_location: None,
            is_paused: false,
            breakpoints: HashMap::new(),
            variables: BTreeMap::new(),
            activity: VecDeque::with_capacity(activity_capacity + 1),
            activity_capacity,
        }
    }

    /// Append an activity entry, evicting the oldest once over capacity
    pub fn add_activity(&mut self, entry: ActivityEntry) {
        tracing::trace!(tool = %entry.tool, status = %entry.status, "adding activity");
        self.activity.push_back(entry);
        while self.activity.len() > self.activity_capacity {
            self.activity.pop_front();
        }
    }

    pub fn set_breakpoint(&mut self, file_path: impl Into<PathBuf>, line: usize) {
        self.breakpoints
            .entry(file_path.into())
            .or_default()
            .insert(line);
    }

    pub fn remove_breakpoint(&mut self, file_path: impl AsRef<Path>, line: usize) {
        let file_path = file_path.as_ref();
        if let Some(lines) = self.breakpoints.get_mut(file_path) {
            lines.remove(&line);
            if lines.is_empty() {
                self.breakpoints.remove(file_path);
            }
        }
    }

    /// Replace the current execution location wholesale
    pub fn update_location(&mut self, file_path: impl Into<PathBuf>, line: usize) {
        self.current_location = Some(CodeLocation::new(file_path, line));
    }

    /// Replace the variables map; values are never merged with the previous scope
    pub fn update_variables(&mut self, variables: BTreeMap<String, String>) {
        self.variables = variables;
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    /// Set the session identity; both fields change together
    pub fn set_session(&mut self, id: Option<String>, name: Option<String>) {
        self.session_id = id;
        self.session_name = name;
    }

    /// Reset all session-scoped state, keeping the activity history
    pub fn reset_session(&mut self) {
        self.session_id = None;
        self.session_name = None;
        self.current_location = None;
        self.is_paused = false;
        self.breakpoints.clear();
        self.variables.clear();
    }

    pub fn breakpoints(&self) -> &HashMap<PathBuf, BTreeSet<usize>> {
        &self.breakpoints
    }

    /// Breakpoint lines for a file (empty if there are none)
    pub fn breakpoints_for_file(&self, file_path: impl AsRef<Path>) -> BTreeSet<usize> {
        self.breakpoints
            .get(file_path.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_breakpoint(&self, file_path: impl AsRef<Path>, line: usize) -> bool {
        self.breakpoints
            .get(file_path.as_ref())
            .is_some_and(|lines| lines.contains(&line))
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Activity history, oldest first
    pub fn activity(&self) -> impl DoubleEndedIterator<Item = &ActivityEntry> + ExactSizeIterator {
        self.activity.iter()
    }

    pub fn activity_len(&self) -> usize {
        self.activity.len()
    }

    pub fn activity_capacity(&self) -> usize {
        self.activity_capacity
    }
}

/// Handle to the [`DebugState`] shared between the tailer and the render loop
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<DebugState>>,
}

impl SharedState {
    pub fn new(state: DebugState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Apply a mutation while holding the lock, so readers see all of it or none of it
    pub fn with_state<F, T>(&self, f: F) -> eyre::Result<T>
    where
        F: FnOnce(&mut DebugState) -> T,
    {
        let mut state = self
            .inner
            .lock()
            .map_err(|e| eyre::eyre!("debug state mutex poisoned: {}", e))?;
        Ok(f(&mut state))
    }

    /// Point-in-time copy of the state for rendering
    pub fn snapshot(&self) -> eyre::Result<DebugState> {
        self.with_state(|state| state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_history_is_bounded_fifo() {
        let mut state = DebugState::default();
        for i in 0..25 {
            state.add_activity(ActivityEntry::new(
                format!("tool{i}"),
                ActivityStatus::Success,
                "",
            ));
        }

        assert_eq!(state.activity_len(), DEFAULT_ACTIVITY_CAPACITY);
        let tools: Vec<_> = state.activity().map(|a| a.tool.as_str()).collect();
        assert_eq!(tools.first(), Some(&"tool5"));
        assert_eq!(tools.last(), Some(&"tool24"));
    }

    #[test]
    fn custom_capacity() {
        let mut state = DebugState::with_capacity(3);
        for i in 0..5 {
            state.add_activity(ActivityEntry::new(i.to_string(), ActivityStatus::Info, ""));
        }
        let tools: Vec<_> = state.activity().map(|a| a.tool.clone()).collect();
        assert_eq!(tools, vec!["2", "3", "4"]);
    }

    #[test]
    fn removing_last_breakpoint_drops_file_entry() {
        let mut state = DebugState::default();
        state.set_breakpoint("/src/a.py", 10);
        state.set_breakpoint("/src/a.py", 12);
        state.remove_breakpoint("/src/a.py", 10);
        assert_eq!(
            state.breakpoints_for_file("/src/a.py"),
            BTreeSet::from([12])
        );

        state.remove_breakpoint("/src/a.py", 12);
        assert!(state.breakpoints().is_empty());
        assert!(!state.has_breakpoint("/src/a.py", 12));
    }

    #[test]
    fn removing_unknown_breakpoint_is_noop() {
        let mut state = DebugState::default();
        state.remove_breakpoint("/src/missing.py", 1);
        assert!(state.breakpoints().is_empty());
    }

    #[test]
    fn variables_are_replaced_not_merged() {
        let mut state = DebugState::default();
        state.update_variables(BTreeMap::from([
            ("x".to_string(), "1".to_string()),
            ("y".to_string(), "2".to_string()),
        ]));
        state.update_variables(BTreeMap::from([("z".to_string(), "3".to_string())]));

        assert_eq!(state.variables().len(), 1);
        assert_eq!(state.variables().get("z").map(String::as_str), Some("3"));
    }

    #[test]
    fn reset_session_keeps_activity() {
        let mut state = DebugState::default();
        state.set_session(Some("s1".to_string()), Some("Session".to_string()));
        state.update_location("/src/a.py", 3);
        state.is_paused = true;
        state.set_breakpoint("/src/a.py", 3);
        state.add_activity(ActivityEntry::new("session", ActivityStatus::Success, "Created"));

        state.reset_session();

        assert!(state.session_id.is_none());
        assert!(state.session_name.is_none());
        assert!(state.current_location.is_none());
        assert!(!state.is_paused);
        assert!(state.breakpoints().is_empty());
        assert_eq!(state.activity_len(), 1);
    }

    #[test]
    fn location_display_uses_file_name() {
        let location = CodeLocation::new("/home/user/project/main.py", 42);
        assert_eq!(location.to_string(), "main.py:42");
    }

    #[test]
    fn snapshot_is_detached_from_shared_state() {
        let shared = SharedState::default();
        shared
            .with_state(|state| state.update_location("/src/a.py", 1))
            .unwrap();
        let snapshot = shared.snapshot().unwrap();

        shared
            .with_state(|state| state.update_location("/src/b.py", 2))
            .unwrap();

        assert_eq!(
            snapshot.current_location,
            Some(CodeLocation::new("/src/a.py", 1))
        );
    }
}
