//! Dispatch-budget watchdog
//!
//! Long-running language computations decompose into many dispatches, so
//! the dispatcher itself is the natural clock: the watchdog counts
//! dispatches, and on crossing its budget enqueues one `abort` message to
//! the registered handler and disarms. Aborting is advisory; the handler
//! decides what stops replying. Nothing is torn down.

use crate::effect::Event;
use crate::error::Fault;
use crate::runtime::Runtime;
use tracing::warn;
use vau_core::Value;

/// An armed watchdog: how many dispatches remain, and who to tell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Watchdog {
    pub remaining: u64,
    pub handler: Value,
}

impl Runtime {
    /// Arm (or re-arm) the watchdog with a dispatch budget. The handler
    /// receives `(SINK abort)` when the budget runs out.
    pub fn arm_watchdog(&mut self, budget: u64, handler: Value) {
        if budget == 0 {
            self.watchdog = None;
            return;
        }
        self.watchdog = Some(Watchdog {
            remaining: budget,
            handler,
        });
    }

    /// Disarm without firing.
    pub fn disarm_watchdog(&mut self) {
        self.watchdog = None;
    }

    /// Called by the dispatcher after every dispatch.
    pub(crate) fn watchdog_tick(&mut self) -> Result<(), Fault> {
        let Some(wd) = self.watchdog.as_mut() else {
            return Ok(());
        };
        wd.remaining -= 1;
        if wd.remaining > 0 {
            return Ok(());
        }
        let handler = wd.handler;
        self.watchdog = None;
        self.watchdog_fires += 1;
        warn!(?handler, "watchdog budget exhausted, sending abort");
        let message = self.list(&[Value::SINK, self.wk.abort])?;
        self.enqueue_event(Event {
            target: handler,
            message,
        })
    }
}
