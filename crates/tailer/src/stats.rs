use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what the tailer did with the lines it read
#[derive(Debug, Default)]
pub struct TailerStats {
    lines_dispatched: AtomicU64,
    lines_malformed: AtomicU64,
    lines_unhandled: AtomicU64,
    rotations: AtomicU64,
    io_errors: AtomicU64,
    position: AtomicU64,
}

/// Point-in-time copy of [`TailerStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Lines handed to a registered handler
    pub lines_dispatched: u64,
    /// Complete lines that were not a JSON record with a discriminator
    pub lines_malformed: u64,
    /// Records nobody registered a handler for
    pub lines_unhandled: u64,
    /// File replacements and truncations
    pub rotations: u64,
    pub io_errors: u64,
    /// Byte offset after the last processed line
    pub position: u64,
}

impl StatsSnapshot {
    /// Lines that were dropped because they could not be decoded
    pub fn dropped(&self) -> u64 {
        self.lines_malformed
    }
}

impl TailerStats {
    pub(crate) fn dispatched(&self) {
        self.lines_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.lines_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unhandled(&self) {
        self.lines_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rotated(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_position(&self, offset: u64) {
        self.position.store(offset, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_dispatched: self.lines_dispatched.load(Ordering::Relaxed),
            lines_malformed: self.lines_malformed.load(Ordering::Relaxed),
            lines_unhandled: self.lines_unhandled.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            position: self.position.load(Ordering::Relaxed),
        }
    }
}
