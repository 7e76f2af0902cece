//! Fork/join rendezvous
//!
//! Two sub-requests run "concurrently" (interleaved in the queue) and
//! their replies pair up deterministically. A fork, on receiving the
//! request pair `(head-req . tail-req)`, creates one tag actor per
//! branch, prefixes each request with its tag as the customer, and
//! becomes a join. Replies come back through the tags, so the join pairs
//! them by tag identity, not arrival order.
//!
//! This is how `map` evaluates operand lists: the head element evaluates
//! while the tail maps itself, and the join conses the results. A branch
//! that answers with an error sentinel does not cancel the other branch;
//! the join waits for both and propagates whichever error arrived first.
//!
//! Fork data: `(cust head tail)`.
//! Join data: `(cust head-tag tail-tag)`.
//! JoinOne data: `(cust expected-tag first-was-head first-value)`.
//! Tag data: the join it relays to.

use crate::behaviors::actor_field;
use crate::effect::Effect;
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::trace;
use vau_core::Value;

pub(crate) fn fork_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let cust = actor_field(&rt.heap, self_, 0);
    let head = actor_field(&rt.heap, self_, 1);
    let tail = actor_field(&rt.heap, self_, 2);
    if !msg.is_pair() {
        trace!("dropped malformed request to fork");
        return Ok(());
    }
    let head_req = rt.heap.car(msg);
    let tail_req = rt.heap.cdr(msg);
    // Tags relay to self; identity survives the become below.
    let head_tag = fx.actor(rt, Proc::Tag, self_)?;
    let tail_tag = fx.actor(rt, Proc::Tag, self_)?;
    let head_msg = fx.cons(rt, head_tag, head_req)?;
    let tail_msg = fx.cons(rt, tail_tag, tail_req)?;
    fx.send(head, head_msg);
    fx.send(tail, tail_msg);
    let data = fx.list(rt, &[cust, head_tag, tail_tag])?;
    fx.become_actor(Proc::Join, data)
}

/// Waiting for both branches.
pub(crate) fn join_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let head_tag = actor_field(&rt.heap, self_, 1);
    let tail_tag = actor_field(&rt.heap, self_, 2);
    if !msg.is_pair() {
        trace!("dropped malformed reply to join");
        return Ok(());
    }
    let tag = rt.heap.car(msg);
    let value = rt.heap.cdr(msg);
    if tag == head_tag {
        let data = fx.list(rt, &[cust, tail_tag, Value::TRUE, value])?;
        fx.become_actor(Proc::JoinOne, data)
    } else if tag == tail_tag {
        let data = fx.list(rt, &[cust, head_tag, Value::FALSE, value])?;
        fx.become_actor(Proc::JoinOne, data)
    } else {
        fx.reply_error(rt, cust, wk.unexpected_tag, tag)
    }
}

/// One branch has answered; waiting for the other.
pub(crate) fn join_one_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let expected = actor_field(&rt.heap, self_, 1);
    let first_was_head = actor_field(&rt.heap, self_, 2);
    let first = actor_field(&rt.heap, self_, 3);
    if !msg.is_pair() {
        trace!("dropped malformed reply to join");
        return Ok(());
    }
    let tag = rt.heap.car(msg);
    let value = rt.heap.cdr(msg);
    if tag != expected {
        return fx.reply_error(rt, cust, wk.unexpected_tag, tag);
    }
    // No cancellation: both branches ran. The error that arrived first
    // wins; otherwise pair up head and tail.
    if rt.is_error(first) {
        fx.reply(cust, first);
        return Ok(());
    }
    if rt.is_error(value) {
        fx.reply(cust, value);
        return Ok(());
    }
    let (h, t) = if first_was_head == Value::TRUE {
        (first, value)
    } else {
        (value, first)
    };
    let pair = fx.cons(rt, h, t)?;
    fx.reply(cust, pair);
    Ok(())
}

/// Relay a reply to the join, keyed by own identity.
pub(crate) fn tag_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let join = rt.heap.data(self_);
    let keyed = fx.cons(rt, self_, msg)?;
    fx.send(join, keyed);
    Ok(())
}
