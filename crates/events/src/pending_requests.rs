//! Remember tool requests until their responses arrive
//!
//! Responses do not always repeat the arguments of the call that caused them (a
//! `set_breakpoint` response may carry the line but not the file), so the most recent
//! request per tool is kept and consumed by the matching response.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    pending: HashMap<String, Map<String, Value>>,
}

impl PendingRequests {
    /// Record the request of a tool call, replacing any older one for the same tool
    pub(crate) fn add(&mut self, tool: &str, request: Map<String, Value>) {
        self.pending.insert(tool.to_string(), request);
    }

    /// Consume the pending request for a tool, if any
    pub(crate) fn take(&mut self, tool: &str) -> Option<Map<String, Value>> {
        self.pending.remove(tool)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
