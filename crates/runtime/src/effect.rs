//! Effect transactions
//!
//! A behavior never touches the event queue or another actor's cell
//! directly. It accumulates everything it wants to happen into an
//! `Effect`: the cells it allocated, the events it wants sent, and at most
//! one `become`. The dispatcher applies the whole record atomically after
//! the behavior returns, or rolls the allocations back if the behavior
//! (or the commit itself) failed. Until commit, nothing a behavior does is
//! observable from the queue.
//!
//! Allocation goes through the effect so the rollback path knows exactly
//! which cells to return to the heap. On commit the bookkeeping list is
//! simply dropped; the cells are already where they need to be.

use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use vau_core::Value;

/// A queued (target, message) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub target: Value,
    pub message: Value,
}

/// The transactional record of one behavior invocation.
#[derive(Debug, Default)]
pub struct Effect {
    /// Every cell allocated during the invocation, for rollback.
    created: Vec<Value>,
    /// Events to append to the queue, in send order.
    sent: Vec<Event>,
    /// Replacement (code, data) for the dispatched actor, at most one.
    become_: Option<(Value, Value)>,
}

impl Effect {
    pub fn new() -> Effect {
        Effect::default()
    }

    /// Allocate a pair inside the transaction.
    pub fn cons(&mut self, rt: &mut Runtime, h: Value, t: Value) -> Result<Value, Fault> {
        let v = rt.heap.cons(h, t).ok_or(Fault::OutOfMemory)?;
        self.created.push(v);
        Ok(v)
    }

    /// Allocate an actor with a procedure behavior inside the transaction.
    pub fn actor(&mut self, rt: &mut Runtime, proc: Proc, data: Value) -> Result<Value, Fault> {
        let v = rt
            .heap
            .actor_create(proc.code(), data)
            .ok_or(Fault::OutOfMemory)?;
        self.created.push(v);
        Ok(v)
    }

    /// Allocate a proper list inside the transaction.
    pub fn list(&mut self, rt: &mut Runtime, items: &[Value]) -> Result<Value, Fault> {
        let mut out = Value::NIL;
        for &item in items.iter().rev() {
            out = self.cons(rt, item, out)?;
        }
        Ok(out)
    }

    /// Queue an event.
    pub fn send(&mut self, target: Value, message: Value) {
        self.sent.push(Event { target, message });
    }

    /// Queue a request message `(cust selector args...)` to `target`.
    pub fn send_req(
        &mut self,
        rt: &mut Runtime,
        target: Value,
        parts: &[Value],
    ) -> Result<(), Fault> {
        let message = self.list(rt, parts)?;
        self.send(target, message);
        Ok(())
    }

    /// Reply to a customer. A reply message is the bare value.
    pub fn reply(&mut self, cust: Value, value: Value) {
        self.send(cust, value);
    }

    /// Reply with an error sentinel: the list `(FAIL kind irritant)`.
    pub fn reply_error(
        &mut self,
        rt: &mut Runtime,
        cust: Value,
        kind: Value,
        irritant: Value,
    ) -> Result<(), Fault> {
        let err = self.list(rt, &[Value::FAIL, kind, irritant])?;
        self.reply(cust, err);
        Ok(())
    }

    /// Replace the dispatched actor's behavior at commit. A second call in
    /// the same invocation is an error and rejects the whole effect.
    pub fn become_actor(&mut self, proc: Proc, data: Value) -> Result<(), Fault> {
        if self.become_.is_some() {
            return Err(Fault::DoubleBecome);
        }
        self.become_ = Some((proc.code(), data));
        Ok(())
    }

    /// Number of events this effect wants to send.
    pub fn sent_len(&self) -> usize {
        self.sent.len()
    }

    pub(crate) fn parts(self) -> (Vec<Value>, Vec<Event>, Option<(Value, Value)>) {
        (self.created, self.sent, self.become_)
    }

    /// The allocation log, for rollback without commit.
    pub(crate) fn into_created(self) -> Vec<Value> {
        self.created
    }
}
