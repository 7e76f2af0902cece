//! Runtime statistics snapshot
//!
//! Pull-model diagnostics: the host asks for a snapshot when it wants one
//! (the REPL's `,stats` directive, tests, shutdown logging). Nothing here
//! runs on the dispatch path.

use vau_core::HeapStats;

/// One observation of the runtime's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub heap: HeapStats,
    pub symbols_interned: usize,
    pub events_dispatched: u64,
    pub effects_rejected: u64,
    pub queue_depth: usize,
    pub peak_queue_depth: usize,
    pub gc_cycles: u64,
    pub watchdog_fires: u64,
}

impl std::fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "events: {} dispatched, {} effects rejected, queue depth {} (peak {})",
            self.events_dispatched, self.effects_rejected, self.queue_depth, self.peak_queue_depth
        )?;
        writeln!(f, "{}", self.heap)?;
        write!(
            f,
            "gc: {} cycles; symbols: {} interned; watchdog: {} fired",
            self.gc_cycles, self.symbols_interned, self.watchdog_fires
        )
    }
}
