//! The garbage collector
//!
//! Precise mark-sweep over the cell heap. The roots are the event queue
//! (which lives in heap cells itself), the ground environment, the
//! host-pinned values, the collector actor, and the watchdog handler.
//! The static singletons hold no heap references and are never swept, so
//! they need no tracing.
//!
//! Three modes, fixed at boot:
//!
//! - **Stop-the-world**: `run` collects in one pass whenever the queue
//!   drains. Nothing is interleaved, so `gc_running` never matters.
//! - **Concurrent multiphase**: the collector is an actor alternating
//!   two behaviors. A tick dispatch in `GcMark` marks everything, raises
//!   `gc_running`, becomes `GcSweep`, and sends itself the sweep tick;
//!   user events dispatched in between allocate born-marked and frees
//!   only clear marks. The sweep dispatch reclaims, lowers `gc_running`,
//!   and becomes `GcMark` again.
//! - **Concurrent single-pass**: the same actor performs a whole cycle
//!   per tick and keeps its behavior.
//!
//! Marking at a phase boundary is sound under the serial dispatcher: no
//! behavior is mid-flight when the collector actor runs, so every live
//! value is reachable from the queue or a root at that instant, and
//! cells allocated before the sweep finishes are born marked.

use crate::config::GcMode;
use crate::effect::{Effect, Event};
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::{debug, trace};
use vau_core::{Value, value::STATIC_TOP};

impl Runtime {
    /// Stop-the-world collection: mark from the roots, sweep the rest.
    pub fn collect(&mut self) {
        self.gc_mark_phase();
        self.gc_sweep_phase();
    }

    pub(crate) fn gc_mark_phase(&mut self) {
        let mut work: Vec<Value> = Vec::with_capacity(64);
        work.push(self.q_head);
        work.push(self.q_tail);
        work.push(self.ground);
        work.push(self.gc_actor);
        work.extend(self.protected.iter().copied());
        if let Some(wd) = &self.watchdog {
            work.push(wd.handler);
        }
        let high_water = self.heap.high_water();
        while let Some(v) = work.pop() {
            let Some(idx) = v.cell_index() else {
                continue;
            };
            if idx <= STATIC_TOP || idx > high_water || self.heap.is_marked(idx) {
                continue;
            }
            self.heap.mark(idx);
            if let Some(cell) = self.heap.get(v) {
                work.push(cell.head);
                work.push(cell.tail);
            }
        }
    }

    pub(crate) fn gc_sweep_phase(&mut self) {
        let freed = self.heap.sweep();
        self.gc_cycles += 1;
        debug!(freed, cycle = self.gc_cycles, "gc sweep");
    }

    /// Schedule a collector tick every `gc_skip` dispatches in the
    /// concurrent modes. Ticks only piggyback on pending work: with an
    /// empty queue the dispatcher is about to return, and a tick here
    /// would chase its own tail forever. Never tick mid-cycle either.
    pub(crate) fn gc_tick(&mut self) -> Result<(), Fault> {
        if !self.config.gc_mode.is_concurrent() {
            return Ok(());
        }
        if self.queue_depth == 0 {
            return Ok(());
        }
        if self.dispatch_count % self.config.gc_skip.max(1) as u64 != 0 {
            return Ok(());
        }
        if self.heap.gc_running() {
            return Ok(());
        }
        if self.heap.code(self.gc_actor) != Proc::GcMark.code() {
            return Ok(());
        }
        trace!("gc tick");
        self.enqueue_event(Event {
            target: self.gc_actor,
            message: Value::INERT,
        })
    }
}

/// Collector actor, ready phase. One tick either runs a whole cycle
/// (single-pass mode) or marks and hands off to the sweep behavior.
pub(crate) fn gc_mark_beh(
    rt: &mut Runtime,
    self_: Value,
    _msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    match rt.config.gc_mode {
        GcMode::ConcurrentSinglePass => {
            rt.collect();
            Ok(())
        }
        GcMode::ConcurrentMultiphase => {
            // The sweep tick below needs two cells; if even that cannot
            // be committed, skip the cycle rather than strand the heap
            // in the unsafe window.
            if rt.heap.available() < 2 {
                return Ok(());
            }
            rt.gc_mark_phase();
            // Unsafe window opens: frees must not touch the free list
            // until the sweep below has run.
            rt.heap.set_gc_running(true);
            fx.become_actor(Proc::GcSweep, Value::UNDEF)?;
            fx.send(self_, Value::INERT);
            Ok(())
        }
        GcMode::StopTheWorld => Ok(()),
    }
}

/// Collector actor, sweep phase of the multiphase mode.
pub(crate) fn gc_sweep_beh(
    rt: &mut Runtime,
    _self: Value,
    _msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    rt.gc_sweep_phase();
    rt.heap.set_gc_running(false);
    fx.become_actor(Proc::GcMark, Value::UNDEF)
}
