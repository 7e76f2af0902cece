//! Core value behaviors
//!
//! Non-actor targets (integers, pairs, symbols) and the static singletons
//! dispatch here. Request messages are lists `(cust selector args...)`;
//! replies are bare values sent to the customer. Anything malformed is
//! dropped with a trace, and an unrecognized selector is an error reply,
//! never a fault: actors stay isolated even from nonsense.

use crate::effect::Effect;
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::trace;
use vau_core::Value;

/// A parsed request: customer, selector, remaining arguments.
pub(crate) struct Request {
    pub cust: Value,
    pub selector: Value,
    pub rest: Value,
}

/// Split `(cust selector args...)`. `None` for anything else; replies and
/// other bare values parse as `None` and are the receiver's to interpret.
pub(crate) fn parse_request(rt: &Runtime, msg: Value) -> Option<Request> {
    if !msg.is_pair() {
        return None;
    }
    let cust = rt.heap.car(msg);
    let tail = rt.heap.cdr(msg);
    if !tail.is_pair() {
        return None;
    }
    Some(Request {
        cust,
        selector: rt.heap.car(tail),
        rest: rt.heap.cdr(tail),
    })
}

/// First argument after the selector.
pub(crate) fn first(rt: &Runtime, rest: Value) -> Option<Value> {
    if rest.is_pair() {
        Some(rt.heap.car(rest))
    } else {
        None
    }
}

/// Second argument after the selector.
pub(crate) fn second(rt: &Runtime, rest: Value) -> Option<Value> {
    first(rt, rt.heap.cdr(rest))
}

pub(crate) fn bool_value(b: bool) -> Value {
    if b { Value::TRUE } else { Value::FALSE }
}

/// Read field `i` of an actor whose data is a proper list.
pub(crate) fn actor_field(heap: &vau_core::Heap, actor: Value, i: usize) -> Value {
    let mut d = heap.data(actor);
    for _ in 0..i {
        d = heap.cdr(d);
    }
    heap.car(d)
}

/// Write field `i` of an actor whose data is a proper list.
pub(crate) fn set_actor_field(heap: &mut vau_core::Heap, actor: Value, i: usize, v: Value) -> bool {
    let mut d = heap.data(actor);
    for _ in 0..i {
        d = heap.cdr(d);
    }
    heap.set_car(d, v)
}

/// Error reply for a selector the target does not understand.
pub(crate) fn reply_unknown(
    rt: &mut Runtime,
    fx: &mut Effect,
    req: &Request,
) -> Result<(), Fault> {
    let kind = rt.wk.unknown_selector;
    fx.reply_error(rt, req.cust, kind, req.selector)
}

/// The self-evaluating protocol shared by the singletons and integers:
/// `eval` replies with self, `typeq` compares behavior identity.
pub(crate) fn se_type(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
    type_id: Proc,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!(?self_, "dropped malformed message");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == type_id.code()));
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// Trap behavior for proc id 0. [`Runtime::resolve`] rejects freed cells
/// before dispatch, so reaching this is itself corruption.
pub(crate) fn freed_beh(
    _rt: &mut Runtime,
    _self: Value,
    _msg: Value,
    _fx: &mut Effect,
) -> Result<(), Fault> {
    Err(Fault::HeapCorrupt("behavior of a freed cell invoked"))
}

pub(crate) fn fixnum_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Fixnum)
}

pub(crate) fn undef_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Undef)
}

pub(crate) fn unit_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Unit)
}

pub(crate) fn boolean_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Boolean)
}

pub(crate) fn fail_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Fail)
}

pub(crate) fn inert_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Inert)
}

pub(crate) fn ignore_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    se_type(rt, self_, msg, fx, Proc::Ignore)
}

/// The empty list: self-evaluating, and the identity of `map`.
pub(crate) fn null_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to ()");
        return Ok(());
    };
    if req.selector == wk.map {
        fx.reply(req.cust, Value::NIL);
        Ok(())
    } else {
        se_type(rt, self_, msg, fx, Proc::Null)
    }
}

/// Absorbs everything.
pub(crate) fn sink_beh(
    _rt: &mut Runtime,
    _self: Value,
    _msg: Value,
    _fx: &mut Effect,
) -> Result<(), Fault> {
    Ok(())
}

/// One-shot reply cell for the host: stores the latest reply in its data
/// field, where [`Runtime::host_cell_value`] reads it.
pub(crate) fn host_cell_beh(
    _rt: &mut Runtime,
    _self: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    fx.become_actor(Proc::HostCell, msg)
}

/// A pair is a combination: evaluate the head to a combiner, then hand it
/// the unevaluated tail. `map` is the element-wise evaluation used by
/// applicatives, delegated to a fork over head and tail.
pub(crate) fn pair_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to pair");
        return Ok(());
    };
    if req.selector == wk.eval {
        let Some(env) = first(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let head = rt.heap.car(self_);
        let tail = rt.heap.cdr(self_);
        let data = fx.list(rt, &[req.cust, tail, env])?;
        let k = fx.actor(rt, Proc::KCall, data)?;
        fx.send_req(rt, head, &[k, wk.eval, env])?;
        Ok(())
    } else if req.selector == wk.map {
        // req.rest is the per-element request, e.g. (eval env). The head
        // receives it as-is; the tail recurses through map.
        let head = rt.heap.car(self_);
        let tail = rt.heap.cdr(self_);
        let data = fx.list(rt, &[req.cust, head, tail])?;
        let fork = fx.actor(rt, Proc::Fork, data)?;
        let tail_req = fx.cons(rt, wk.map, req.rest)?;
        let fork_msg = fx.cons(rt, req.rest, tail_req)?;
        fx.send(fork, fork_msg);
        Ok(())
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Pair.code()));
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// A symbol evaluates by asking the environment.
pub(crate) fn symbol_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to symbol");
        return Ok(());
    };
    if req.selector == wk.eval {
        let Some(env) = first(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        fx.send_req(rt, env, &[req.cust, wk.lookup, self_])
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Symbol.code()));
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}
