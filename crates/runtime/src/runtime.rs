//! The runtime: one owner for heap, symbols, and the event queue
//!
//! A `Runtime` is the single mutable home of everything the language
//! touches. Behaviors receive it for exactly one dispatch; nothing holds
//! any part of it across dispatches, so the whole machine is
//! single-threaded cooperative: one event popped, one behavior run to
//! completion, one effect committed, repeat.
//!
//! The event queue is itself built from heap cells: a chain of link pairs
//! whose heads are `(target . message)` event pairs. That makes the queue
//! the collector's primary root for free. Consumed link and event cells
//! are returned to the allocator eagerly; everything else waits for the
//! collector.

use crate::config::{GcMode, RuntimeConfig};
use crate::diagnostics::RuntimeStats;
use crate::effect::{Effect, Event};
use crate::error::Fault;
use crate::ground;
use crate::proc::{Proc, behavior_of};
use crate::watchdog::Watchdog;
use tracing::{debug, info, trace, warn};
use vau_core::{Decoded, Heap, SymbolTable, Value, value};

/// Interned selector and error-kind symbols, fixed at boot.
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    // Selectors.
    pub eval: Value,
    pub apply: Value,
    pub lookup: Value,
    pub bind: Value,
    pub typeq: Value,
    pub map: Value,
    pub unwrap: Value,
    pub abort: Value,
    // Error kinds.
    pub undefined: Value,
    pub wrong_type: Value,
    pub arity: Value,
    pub unknown_selector: Value,
    pub unexpected_tag: Value,
    pub immutable_env: Value,
}

impl WellKnown {
    fn intern(symbols: &mut SymbolTable) -> Result<WellKnown, Fault> {
        let mut sym = |name: &str| -> Result<Value, Fault> {
            Ok(Value::symbol(symbols.intern(name)?))
        };
        Ok(WellKnown {
            eval: sym("eval")?,
            apply: sym("apply")?,
            lookup: sym("lookup")?,
            bind: sym("bind")?,
            typeq: sym("typeq")?,
            map: sym("map")?,
            unwrap: sym("unwrap")?,
            abort: sym("abort")?,
            undefined: sym("undefined")?,
            wrong_type: sym("wrong-type")?,
            arity: sym("arity")?,
            unknown_selector: sym("unknown-selector")?,
            unexpected_tag: sym("unexpected-tag")?,
            immutable_env: sym("immutable-env")?,
        })
    }
}

/// The actor runtime.
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) symbols: SymbolTable,
    pub(crate) config: RuntimeConfig,
    pub(crate) wk: WellKnown,
    // Event queue: chain of link pairs, head popped, tail appended.
    pub(crate) q_head: Value,
    pub(crate) q_tail: Value,
    pub(crate) queue_depth: usize,
    pub(crate) peak_queue_depth: usize,
    pub(crate) ground: Value,
    /// The collector actor in the concurrent modes; `UNDEF` otherwise.
    pub(crate) gc_actor: Value,
    /// Host-pinned values, traced as collector roots.
    pub(crate) protected: Vec<Value>,
    pub(crate) watchdog: Option<Watchdog>,
    pub(crate) dispatch_count: u64,
    pub(crate) effects_rejected: u64,
    pub(crate) gc_cycles: u64,
    pub(crate) watchdog_fires: u64,
}

impl Runtime {
    /// Initialize the heap and symbol table, install the static
    /// singletons, and construct the ground environment.
    pub fn boot(config: RuntimeConfig) -> Result<Runtime, Fault> {
        let mut heap = Heap::new(config.heap_limit);
        for (idx, proc) in [
            (value::IDX_UNDEF, Proc::Undef),
            (value::IDX_UNIT, Proc::Unit),
            (value::IDX_TRUE, Proc::Boolean),
            (value::IDX_FALSE, Proc::Boolean),
            (value::IDX_NIL, Proc::Null),
            (value::IDX_FAIL, Proc::Fail),
            (value::IDX_SINK, Proc::Sink),
            (value::IDX_INERT, Proc::Inert),
            (value::IDX_IGNORE, Proc::Ignore),
            (value::IDX_EMPTY_ENV, Proc::EmptyEnv),
        ] {
            heap.set_behavior(Value::actor(idx), proc.code(), Value::UNDEF);
        }

        let mut symbols = SymbolTable::new(config.symbol_buffer_size);
        let wk = WellKnown::intern(&mut symbols)?;

        let mut rt = Runtime {
            heap,
            symbols,
            wk,
            q_head: Value::NIL,
            q_tail: Value::NIL,
            queue_depth: 0,
            peak_queue_depth: 0,
            ground: Value::UNDEF,
            gc_actor: Value::UNDEF,
            protected: Vec::new(),
            watchdog: None,
            dispatch_count: 0,
            effects_rejected: 0,
            gc_cycles: 0,
            watchdog_fires: 0,
            config,
        };

        if rt.config.gc_mode.is_concurrent() {
            rt.gc_actor = rt
                .heap
                .actor_create(Proc::GcMark.code(), Value::UNDEF)
                .ok_or(Fault::OutOfMemory)?;
        }
        rt.ground = ground::make_ground_env(&mut rt)?;
        if rt.config.watchdog_budget > 0 {
            rt.arm_watchdog(rt.config.watchdog_budget, Value::SINK);
        }
        info!(
            heap_limit = rt.config.heap_limit,
            gc_mode = %rt.config.gc_mode,
            "runtime booted"
        );
        Ok(rt)
    }

    // -- host surface --

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The environment holding the language's initial bindings.
    pub fn ground_env(&self) -> Value {
        self.ground
    }

    pub fn well_known(&self) -> &WellKnown {
        &self.wk
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Intern a name and return the symbol value.
    pub fn intern(&mut self, name: &str) -> Result<Value, Fault> {
        Ok(Value::symbol(self.symbols.intern(name)?))
    }

    /// The name behind a symbol value.
    pub fn sym_name(&self, v: Value) -> Option<&str> {
        self.symbols.name(v.as_symbol()?)
    }

    /// Host-side pair allocation (untracked by any effect; pin with
    /// [`Runtime::protect`] if a collection may run before it is rooted).
    pub fn cons(&mut self, h: Value, t: Value) -> Result<Value, Fault> {
        self.heap.cons(h, t).ok_or(Fault::OutOfMemory)
    }

    /// Host-side proper-list allocation.
    pub fn list(&mut self, items: &[Value]) -> Result<Value, Fault> {
        let mut out = Value::NIL;
        for &item in items.iter().rev() {
            out = self.cons(item, out)?;
        }
        Ok(out)
    }

    pub fn car(&self, v: Value) -> Value {
        self.heap.car(v)
    }

    pub fn cdr(&self, v: Value) -> Value {
        self.heap.cdr(v)
    }

    /// Pin a value as a collector root.
    pub fn protect(&mut self, v: Value) {
        self.protected.push(v);
    }

    /// Drop one pin of a value.
    pub fn unprotect(&mut self, v: Value) {
        if let Some(pos) = self.protected.iter().position(|&p| p == v) {
            self.protected.swap_remove(pos);
        }
    }

    /// A one-shot reply cell for host-driven evaluation. Read its answer
    /// with [`Runtime::host_cell_value`] after [`Runtime::run`] returns.
    pub fn host_cell(&mut self) -> Result<Value, Fault> {
        self.heap
            .actor_create(Proc::HostCell.code(), Value::UNDEF)
            .ok_or(Fault::OutOfMemory)
    }

    /// Create an actor directly. `code` is either a procedure id from the
    /// registry or another actor to delegate to.
    pub fn create_actor(&mut self, code: Value, data: Value) -> Result<Value, Fault> {
        match code.decode() {
            Decoded::Int(id) => {
                if Proc::from_id(id).is_none_or(|p| p == Proc::Free) {
                    return Err(Fault::BadProcId(id));
                }
            }
            Decoded::Actor(_) => {}
            _ => return Err(Fault::HeapCorrupt("code must be a procedure id or an actor")),
        }
        self.heap.actor_create(code, data).ok_or(Fault::OutOfMemory)
    }

    /// The most recent value replied to a host cell (`UNDEF` if none).
    pub fn host_cell_value(&self, cell: Value) -> Value {
        self.heap.data(cell)
    }

    /// True for an error-sentinel reply: a list headed by `FAIL`.
    pub fn is_error(&self, v: Value) -> bool {
        v.is_pair() && self.heap.car(v) == Value::FAIL
    }

    /// The kind symbol of an error reply, if `v` is one.
    pub fn error_kind(&self, v: Value) -> Option<Value> {
        if self.is_error(v) {
            Some(self.heap.car(self.heap.cdr(v)))
        } else {
            None
        }
    }

    /// Create an empty scope over `parent` (the host's way to open a
    /// session environment).
    pub fn new_scope(&mut self, parent: Value) -> Result<Value, Fault> {
        let mut fx = Effect::new();
        let scope = crate::env::make_scope(self, &mut fx, parent)?;
        // Boot-style allocation: dropping the log commits it.
        drop(fx);
        Ok(scope)
    }

    /// Queue an arbitrary event.
    pub fn enqueue(&mut self, target: Value, message: Value) -> Result<(), Fault> {
        self.enqueue_event(Event { target, message })
    }

    /// Queue an event that evaluates `expr` in `env`, replying to `cust`.
    pub fn enqueue_eval(&mut self, cust: Value, expr: Value, env: Value) -> Result<(), Fault> {
        let message = self.list(&[cust, self.wk.eval, env])?;
        self.enqueue_event(Event {
            target: expr,
            message,
        })
    }

    /// Evaluate to completion: enqueue with a fresh host cell as the
    /// customer, drain the queue, and return the reply.
    pub fn eval_sync(&mut self, expr: Value, env: Value) -> Result<Value, Fault> {
        let cell = self.host_cell()?;
        self.protect(cell);
        let r = self
            .enqueue_eval(cell, expr, env)
            .and_then(|()| self.run());
        self.unprotect(cell);
        r?;
        Ok(self.host_cell_value(cell))
    }

    /// Occupancy and lifetime counters.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            heap: self.heap.stats(),
            symbols_interned: self.symbols.len(),
            events_dispatched: self.dispatch_count,
            effects_rejected: self.effects_rejected,
            queue_depth: self.queue_depth,
            peak_queue_depth: self.peak_queue_depth,
            gc_cycles: self.gc_cycles,
            watchdog_fires: self.watchdog_fires,
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    // -- event queue --

    pub(crate) fn enqueue_event(&mut self, ev: Event) -> Result<(), Fault> {
        let pair = self
            .heap
            .cons(ev.target, ev.message)
            .ok_or(Fault::OutOfMemory)?;
        let link = self.heap.cons(pair, Value::NIL).ok_or(Fault::OutOfMemory)?;
        if self.q_tail.is_nil() {
            self.q_head = link;
        } else {
            self.heap.set_cdr(self.q_tail, link);
        }
        self.q_tail = link;
        self.queue_depth += 1;
        self.peak_queue_depth = self.peak_queue_depth.max(self.queue_depth);
        Ok(())
    }

    /// Pop the head event, eagerly returning its link and event cells to
    /// the allocator.
    pub(crate) fn take_event(&mut self) -> Result<Option<Event>, Fault> {
        if self.q_head.is_nil() {
            return Ok(None);
        }
        let link = self.q_head;
        let pair = self.heap.car(link);
        let ev = Event {
            target: self.heap.car(pair),
            message: self.heap.cdr(pair),
        };
        self.q_head = self.heap.cdr(link);
        if self.q_head.is_nil() {
            self.q_tail = Value::NIL;
        }
        self.heap
            .cell_free(link)
            .map_err(|_| Fault::HeapCorrupt("queue link freed twice"))?;
        self.heap
            .cell_free(pair)
            .map_err(|_| Fault::HeapCorrupt("event pair freed twice"))?;
        self.queue_depth -= 1;
        Ok(Some(ev))
    }

    // -- dispatch --

    /// Resolve a target to the actor that will handle the message and its
    /// behavior procedure, chasing delegation chains.
    pub(crate) fn resolve(&self, target: Value) -> Result<(Value, Proc), Fault> {
        let mut t = target;
        let mut hops = 0usize;
        loop {
            match t.decode() {
                Decoded::Int(_) => return Ok((t, Proc::Fixnum)),
                Decoded::Pair(_) => return Ok((t, Proc::Pair)),
                Decoded::Symbol(_) => return Ok((t, Proc::Symbol)),
                Decoded::Actor(idx) => {
                    let code = self.heap.code(t);
                    if code == Value::FREE_CODE {
                        return Err(Fault::FreedCellDispatch(idx));
                    }
                    match code.decode() {
                        Decoded::Int(id) => {
                            let proc = Proc::from_id(id).ok_or(Fault::BadProcId(id))?;
                            if proc == Proc::Free {
                                return Err(Fault::FreedCellDispatch(idx));
                            }
                            return Ok((t, proc));
                        }
                        Decoded::Actor(_) => {
                            t = code;
                            hops += 1;
                            if hops > self.heap.limit() {
                                return Err(Fault::HeapCorrupt("delegation cycle"));
                            }
                        }
                        _ => return Err(Fault::HeapCorrupt("pair or symbol in code field")),
                    }
                }
            }
        }
    }

    /// The proc a value would dispatch to, if it resolves cleanly.
    pub fn proc_of(&self, v: Value) -> Option<Proc> {
        self.resolve(v).ok().map(|(_, p)| p)
    }

    pub(crate) fn dispatch_one(&mut self, ev: Event) -> Result<(), Fault> {
        let (self_, proc) = self.resolve(ev.target)?;
        trace!(?proc, target = ?ev.target, "dispatch");
        let mut fx = Effect::new();
        let result = behavior_of(proc)(self, self_, ev.message, &mut fx);
        self.finish(self_, fx, result)
    }

    /// Commit or reject one effect, all-or-nothing.
    fn finish(&mut self, self_: Value, fx: Effect, result: Result<(), Fault>) -> Result<(), Fault> {
        match result {
            Ok(()) => {
                let (created, sent, become_) = fx.parts();
                // Appending an event takes two cells; reserve them all up
                // front so the append below cannot fail partway.
                if self.heap.available() < 2 * sent.len() {
                    self.free_created(created);
                    return self.reject(Fault::OutOfMemory);
                }
                for ev in sent {
                    self.enqueue_event(ev)?;
                }
                if let Some((code, data)) = become_
                    && !self.heap.set_behavior(self_, code, data)
                {
                    return Err(Fault::HeapCorrupt("become on a non-actor"));
                }
                drop(created);
                Ok(())
            }
            Err(fault) => {
                self.free_created(fx.into_created());
                self.reject(fault)
            }
        }
    }

    fn reject(&mut self, fault: Fault) -> Result<(), Fault> {
        if fault.is_fatal() {
            Err(fault)
        } else {
            warn!(%fault, "effect rejected");
            self.effects_rejected += 1;
            Ok(())
        }
    }

    fn free_created(&mut self, created: Vec<Value>) {
        for v in created.into_iter().rev() {
            if let Err(e) = self.heap.cell_free(v) {
                debug!(%e, "rollback free");
            }
        }
    }

    /// Drain the event queue. Returns when it is empty (after a
    /// stop-the-world collection, in that mode) or on a fatal fault.
    pub fn run(&mut self) -> Result<(), Fault> {
        loop {
            let Some(ev) = self.take_event()? else {
                if self.config.gc_mode == GcMode::StopTheWorld {
                    self.collect();
                }
                return Ok(());
            };
            self.dispatch_count += 1;
            self.dispatch_one(ev)?;
            self.watchdog_tick()?;
            self.gc_tick()?;
        }
    }
}
