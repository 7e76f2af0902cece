//! Combiners
//!
//! The head of a combination evaluates to a combiner, which receives
//! `(cust apply opnds env)` with its operands unevaluated:
//!
//! - An *operative* consumes the operands as given, together with the
//!   dynamic environment. Compound operatives are built by `$vau`.
//! - An *applicative* wraps an underlying combiner: it first maps `eval`
//!   over the operand list (fork/join does the legwork), then forwards
//!   `apply` with the evaluated arguments to what it wraps.
//!
//! Combiners are first-class and self-evaluating: a combiner value
//! embedded directly in head position passes through `eval` unchanged,
//! which is what lets library code build combinations out of combiner
//! values and hand them back to `eval`.
//!
//! Evaluation never recurses inside a behavior. Every step that needs a
//! not-yet-computed value creates a continuation actor and sends; the
//! continuations here (`KCall`, `KArgs`, `KSeq`, `KIf`, `KDefine`)
//! receive plain reply values and carry the rest of the step in their
//! data. Error-sentinel replies short-circuit through them to the
//! original customer.
//!
//! Parameter-tree matching and body sequencing live here too: matching is
//! a pure function run inside the call dispatch, sequencing is a
//! continuation chain that re-becomes itself down the body.

use crate::behaviors::{actor_field, bool_value, first, parse_request, reply_unknown, second};
use crate::effect::Effect;
use crate::env::scope_with_bindings;
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::trace;
use vau_core::Value;

// Compound operative data fields: (formals eformal body static-env).
const OP_FORMALS: usize = 0;
const OP_EFORMAL: usize = 1;
const OP_BODY: usize = 2;
const OP_SENV: usize = 3;

/// Element `i` of a proper list, if present.
fn nth(rt: &Runtime, v: Value, i: usize) -> Option<Value> {
    let mut v = v;
    for _ in 0..i {
        if !v.is_pair() {
            return None;
        }
        v = rt.heap.cdr(v);
    }
    first(rt, v)
}

/// The elements of `v` if it is a proper list of exactly `n`.
fn list_exactly(rt: &Runtime, v: Value, n: usize) -> Option<Vec<Value>> {
    let mut out = Vec::with_capacity(n);
    let mut v = v;
    for _ in 0..n {
        if !v.is_pair() {
            return None;
        }
        out.push(rt.heap.car(v));
        v = rt.heap.cdr(v);
    }
    if v.is_nil() { Some(out) } else { None }
}

/// The `(opnds env)` tail of an `apply` request.
fn parse_apply(rt: &Runtime, rest: Value) -> Option<(Value, Value)> {
    Some((first(rt, rest)?, second(rt, rest)?))
}

/// Destructure an argument tree against a parameter tree, collecting
/// `(symbol, value)` extensions. Structure mismatch fails the whole
/// match; nothing is bound partially.
pub(crate) fn match_param_tree(
    rt: &Runtime,
    def: Value,
    arg: Value,
    out: &mut Vec<(Value, Value)>,
) -> Result<(), ()> {
    if def == Value::IGNORE {
        Ok(())
    } else if def == Value::NIL {
        if arg == Value::NIL { Ok(()) } else { Err(()) }
    } else if def.is_symbol() {
        out.push((def, arg));
        Ok(())
    } else if def.is_pair() {
        if !arg.is_pair() {
            return Err(());
        }
        match_param_tree(rt, rt.heap.car(def), rt.heap.car(arg), out)?;
        match_param_tree(rt, rt.heap.cdr(def), rt.heap.cdr(arg), out)
    } else {
        Err(())
    }
}

/// Start evaluating `body` as a sequence in `env`, replying the value of
/// the last expression to `cust`. An empty body replies `inert`.
pub(crate) fn begin_sequence(
    rt: &mut Runtime,
    fx: &mut Effect,
    cust: Value,
    body: Value,
    env: Value,
) -> Result<(), Fault> {
    let wk = rt.wk;
    if body.is_nil() {
        fx.reply(cust, Value::INERT);
        return Ok(());
    }
    if !body.is_pair() {
        return fx.reply_error(rt, cust, wk.wrong_type, body);
    }
    let expr = rt.heap.car(body);
    let rest = rt.heap.cdr(body);
    if rest.is_nil() {
        fx.send_req(rt, expr, &[cust, wk.eval, env])
    } else {
        let data = fx.list(rt, &[cust, rest, env])?;
        let k = fx.actor(rt, Proc::KSeq, data)?;
        fx.send_req(rt, expr, &[k, wk.eval, env])
    }
}

/// Applicative: wrap around an underlying combiner held in data.
pub(crate) fn applicative_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to applicative");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, env)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let oper = rt.heap.data(self_);
        let data = fx.list(rt, &[req.cust, oper, env])?;
        let k = fx.actor(rt, Proc::KArgs, data)?;
        fx.send_req(rt, opnds, &[k, wk.map, wk.eval, env])
    } else if req.selector == wk.unwrap {
        let oper = rt.heap.data(self_);
        fx.reply(req.cust, oper);
        Ok(())
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Applicative.code()));
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// Continuation of an applicative call: the evaluated argument list
/// arrives here, then `apply` goes to the wrapped combiner.
pub(crate) fn k_args_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let oper = actor_field(&rt.heap, self_, 1);
    let env = actor_field(&rt.heap, self_, 2);
    if rt.is_error(msg) {
        fx.reply(cust, msg);
        return Ok(());
    }
    fx.send_req(rt, oper, &[cust, wk.apply, msg, env])
}

/// Continuation of a combination: the evaluated head arrives here, then
/// `apply` goes to it with the unevaluated tail.
pub(crate) fn k_call_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let opnds = actor_field(&rt.heap, self_, 1);
    let env = actor_field(&rt.heap, self_, 2);
    if rt.is_error(msg) {
        fx.reply(cust, msg);
        return Ok(());
    }
    fx.send_req(rt, msg, &[cust, wk.apply, opnds, env])
}

/// Compound operative built by `$vau`.
pub(crate) fn operative_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to operative");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let formals = actor_field(&rt.heap, self_, OP_FORMALS);
        let eformal = actor_field(&rt.heap, self_, OP_EFORMAL);
        let body = actor_field(&rt.heap, self_, OP_BODY);
        let senv = actor_field(&rt.heap, self_, OP_SENV);
        // The environment formal, when present, matches the dynamic env
        // exactly like one more leading parameter.
        let (ptree, args) = if eformal.is_symbol() {
            (fx.cons(rt, eformal, formals)?, fx.cons(rt, denv, opnds)?)
        } else {
            (formals, opnds)
        };
        let mut binds = Vec::new();
        if match_param_tree(rt, ptree, args, &mut binds).is_err() {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        }
        let scope = scope_with_bindings(rt, fx, senv, &binds)?;
        begin_sequence(rt, fx, req.cust, body, scope)
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Operative.code()));
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// Sequencing continuation: one body expression has produced a value;
/// either answer with it or step to the next expression.
pub(crate) fn k_seq_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let rest = actor_field(&rt.heap, self_, 1);
    let env = actor_field(&rt.heap, self_, 2);
    if rt.is_error(msg) {
        fx.reply(cust, msg);
        return Ok(());
    }
    if !rest.is_pair() {
        fx.reply(cust, msg);
        return Ok(());
    }
    let expr = rt.heap.car(rest);
    let tail = rt.heap.cdr(rest);
    if tail.is_nil() {
        fx.send_req(rt, expr, &[cust, wk.eval, env])
    } else {
        let data = fx.list(rt, &[cust, tail, env])?;
        fx.become_actor(Proc::KSeq, data)?;
        fx.send_req(rt, expr, &[self_, wk.eval, env])
    }
}

/// `$if`: evaluate the predicate, then exactly one branch.
pub(crate) fn op_if_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to $if");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let Some(forms) = list_exactly(rt, opnds, 3) else {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        };
        let data = fx.list(rt, &[req.cust, forms[1], forms[2], denv])?;
        let k = fx.actor(rt, Proc::KIf, data)?;
        fx.send_req(rt, forms[0], &[k, wk.eval, denv])
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpIf.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// Branch continuation of `$if`. Anything but `#t`/`#f` is a type error.
pub(crate) fn k_if_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let cnsq = actor_field(&rt.heap, self_, 1);
    let altn = actor_field(&rt.heap, self_, 2);
    let denv = actor_field(&rt.heap, self_, 3);
    if rt.is_error(msg) {
        fx.reply(cust, msg);
        return Ok(());
    }
    if msg == Value::TRUE {
        fx.send_req(rt, cnsq, &[cust, wk.eval, denv])
    } else if msg == Value::FALSE {
        fx.send_req(rt, altn, &[cust, wk.eval, denv])
    } else {
        fx.reply_error(rt, cust, wk.wrong_type, msg)
    }
}

/// `$define!`: evaluate the expression, then match it against the formal
/// tree and bind the extensions into the dynamic environment.
pub(crate) fn op_define_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to $define!");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let Some(forms) = list_exactly(rt, opnds, 2) else {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        };
        let data = fx.list(rt, &[req.cust, forms[0], denv])?;
        let k = fx.actor(rt, Proc::KDefine, data)?;
        fx.send_req(rt, forms[1], &[k, wk.eval, denv])
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpDefine.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// Definition continuation: the defined value has arrived; bind the
/// matched extensions through the environment's own `bind` protocol. The
/// last bind carries the customer, so `inert` comes back only after the
/// whole batch is in place (same-invocation sends keep their order).
pub(crate) fn k_define_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let cust = actor_field(&rt.heap, self_, 0);
    let formal = actor_field(&rt.heap, self_, 1);
    let denv = actor_field(&rt.heap, self_, 2);
    if rt.is_error(msg) {
        fx.reply(cust, msg);
        return Ok(());
    }
    let mut binds = Vec::new();
    if match_param_tree(rt, formal, msg, &mut binds).is_err() {
        return fx.reply_error(rt, cust, wk.arity, msg);
    }
    if binds.is_empty() {
        fx.reply(cust, Value::INERT);
        return Ok(());
    }
    let last = binds.len() - 1;
    for (i, (sym, val)) in binds.into_iter().enumerate() {
        let c = if i == last { cust } else { Value::SINK };
        fx.send_req(rt, denv, &[c, wk.bind, sym, val])?;
    }
    Ok(())
}

/// `$vau`: capture formals, the environment formal, the body, and the
/// environment of construction into a compound operative.
pub(crate) fn op_vau_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to $vau");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let (Some(formals), Some(eformal)) = (nth(rt, opnds, 0), nth(rt, opnds, 1)) else {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        };
        if !eformal.is_symbol() && eformal != Value::IGNORE {
            return fx.reply_error(rt, req.cust, wk.wrong_type, eformal);
        }
        let body = rt.heap.cdr(rt.heap.cdr(opnds));
        let data = fx.list(rt, &[formals, eformal, body, denv])?;
        let op = fx.actor(rt, Proc::Operative, data)?;
        fx.reply(req.cust, op);
        Ok(())
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpVau.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// `$lambda`: `$vau` with the environment formal ignored, wrapped.
pub(crate) fn op_lambda_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to $lambda");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        if !opnds.is_pair() {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        }
        let formals = rt.heap.car(opnds);
        let body = rt.heap.cdr(opnds);
        let data = fx.list(rt, &[formals, Value::IGNORE, body, denv])?;
        let op = fx.actor(rt, Proc::Operative, data)?;
        let app = fx.actor(rt, Proc::Applicative, op)?;
        fx.reply(req.cust, app);
        Ok(())
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpLambda.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// `$sequence`: evaluate body expressions left to right, reply the last.
pub(crate) fn op_sequence_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to $sequence");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        begin_sequence(rt, fx, req.cust, opnds, denv)
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpSequence.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

/// `quote`: reply the single operand with no evaluation.
pub(crate) fn op_quote_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to quote");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some((opnds, _denv)) = parse_apply(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        let Some(forms) = list_exactly(rt, opnds, 1) else {
            return fx.reply_error(rt, req.cust, wk.arity, opnds);
        };
        fx.reply(req.cust, forms[0]);
        Ok(())
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(Proc::OpQuote.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn rt() -> Runtime {
        Runtime::boot(RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn test_match_symbol_binds_whole_argument() {
        let mut rt = rt();
        let x = rt.intern("x").unwrap();
        let arg = rt.list(&[Value::from_int(1), Value::from_int(2)]).unwrap();
        let mut out = Vec::new();
        match_param_tree(&rt, x, arg, &mut out).unwrap();
        assert_eq!(out, vec![(x, arg)]);
    }

    #[test]
    fn test_match_ignore_binds_nothing() {
        let rt = rt();
        let mut out = Vec::new();
        match_param_tree(&rt, Value::IGNORE, Value::from_int(5), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_match_nil_requires_nil() {
        let rt = rt();
        let mut out = Vec::new();
        match_param_tree(&rt, Value::NIL, Value::NIL, &mut out).unwrap();
        assert!(match_param_tree(&rt, Value::NIL, Value::from_int(0), &mut out).is_err());
    }

    #[test]
    fn test_match_tree_is_structural() {
        let mut rt = rt();
        let a = rt.intern("a").unwrap();
        let b = rt.intern("b").unwrap();
        let c = rt.intern("c").unwrap();
        // ((a b) . c) against ((1 2) 3 4)
        let inner = rt.list(&[a, b]).unwrap();
        let def = rt.cons(inner, c).unwrap();
        let arg_inner = rt.list(&[Value::from_int(1), Value::from_int(2)]).unwrap();
        let arg_rest = rt.list(&[Value::from_int(3), Value::from_int(4)]).unwrap();
        let arg = rt.cons(arg_inner, arg_rest).unwrap();
        let mut out = Vec::new();
        match_param_tree(&rt, def, arg, &mut out).unwrap();
        assert_eq!(out[0], (a, Value::from_int(1)));
        assert_eq!(out[1], (b, Value::from_int(2)));
        assert_eq!(out[2], (c, arg_rest));
    }

    #[test]
    fn test_match_shape_mismatch_fails() {
        let mut rt = rt();
        let a = rt.intern("a").unwrap();
        let b = rt.intern("b").unwrap();
        let def = rt.list(&[a, b]).unwrap();
        let arg = rt.list(&[Value::from_int(1)]).unwrap();
        let mut out = Vec::new();
        assert!(match_param_tree(&rt, def, arg, &mut out).is_err());
    }

    #[test]
    fn test_match_rejects_literals_in_parameter_tree() {
        let mut rt = rt();
        let def = rt.list(&[Value::from_int(1)]).unwrap();
        let arg = rt.list(&[Value::from_int(1)]).unwrap();
        let mut out = Vec::new();
        assert!(match_param_tree(&rt, def, arg, &mut out).is_err());
    }
}
