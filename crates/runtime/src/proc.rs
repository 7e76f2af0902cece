//! The procedure registry
//!
//! An actor's code field is either another actor (delegation) or an
//! integer-tagged word whose payload is a `Proc` id: an index into this
//! fixed table of behavior functions. Ids are stable and exhaustive, so
//! dispatch is a total match with no address-range tests. Id 0 is the
//! free-cell trap: the heap stamps freed cells so that a message routed to
//! one is caught here instead of running stale code.

use crate::behaviors;
use crate::combiner;
use crate::effect::Effect;
use crate::env;
use crate::error::Fault;
use crate::forkjoin;
use crate::gc;
use crate::ground;
use crate::runtime::Runtime;
use vau_core::Value;

/// A behavior: one message in, one effect out. `self_` is the dispatched
/// target after delegation is resolved.
pub type BehaviorFn = fn(&mut Runtime, Value, Value, &mut Effect) -> Result<(), Fault>;

/// Every procedure the runtime can attach to an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum Proc {
    /// Trap for dispatch to a freed cell. Never a live behavior.
    Free = 0,

    // Per-variant behaviors for non-actor targets.
    Fixnum = 1,
    Pair = 2,
    Symbol = 3,

    // Static singletons.
    Undef = 4,
    Unit = 5,
    Boolean = 6,
    Null = 7,
    Fail = 8,
    Sink = 9,
    Inert = 10,
    Ignore = 11,

    // Environments.
    EmptyEnv = 12,
    Scope = 13,
    Binding = 14,

    // Combiners.
    Applicative = 15,
    Operative = 16,

    // Continuations created by the evaluator.
    KCall = 17,
    KArgs = 18,
    KSeq = 19,
    KIf = 20,
    KDefine = 21,

    // Fork/join rendezvous.
    Fork = 22,
    Join = 23,
    JoinOne = 24,
    Tag = 25,

    // The collector-as-actor phases.
    GcMark = 26,
    GcSweep = 27,

    // One-shot reply cell owned by the host.
    HostCell = 28,

    // Ground operatives.
    OpIf = 29,
    OpDefine = 30,
    OpVau = 31,
    OpLambda = 32,
    OpSequence = 33,
    OpQuote = 34,

    // Ground primitive operatives (wrapped into applicatives at boot).
    PrimWrap = 35,
    PrimUnwrap = 36,
    PrimCons = 37,
    PrimCar = 38,
    PrimCdr = 39,
    PrimList = 40,
    PrimEval = 41,
    PrimMakeEnv = 42,
    PrimPred = 43,
    PrimArith = 44,
    PrimBits = 45,
}

impl Proc {
    /// The id stored in a code field.
    #[inline]
    pub fn id(self) -> i64 {
        self as i64
    }

    /// The integer-tagged word for a code field.
    #[inline]
    pub fn code(self) -> Value {
        Value::from_int(self as i64)
    }

    /// Decode an id read from a code field.
    pub fn from_id(id: i64) -> Option<Proc> {
        use Proc::*;
        Some(match id {
            0 => Free,
            1 => Fixnum,
            2 => Pair,
            3 => Symbol,
            4 => Undef,
            5 => Unit,
            6 => Boolean,
            7 => Null,
            8 => Fail,
            9 => Sink,
            10 => Inert,
            11 => Ignore,
            12 => EmptyEnv,
            13 => Scope,
            14 => Binding,
            15 => Applicative,
            16 => Operative,
            17 => KCall,
            18 => KArgs,
            19 => KSeq,
            20 => KIf,
            21 => KDefine,
            22 => Fork,
            23 => Join,
            24 => JoinOne,
            25 => Tag,
            26 => GcMark,
            27 => GcSweep,
            28 => HostCell,
            29 => OpIf,
            30 => OpDefine,
            31 => OpVau,
            32 => OpLambda,
            33 => OpSequence,
            34 => OpQuote,
            35 => PrimWrap,
            36 => PrimUnwrap,
            37 => PrimCons,
            38 => PrimCar,
            39 => PrimCdr,
            40 => PrimList,
            41 => PrimEval,
            42 => PrimMakeEnv,
            43 => PrimPred,
            44 => PrimArith,
            45 => PrimBits,
            _ => return None,
        })
    }

    /// True for procedures a combination may invoke without evaluating
    /// its operands first.
    pub fn is_operative(self) -> bool {
        use Proc::*;
        matches!(
            self,
            Operative
                | OpIf
                | OpDefine
                | OpVau
                | OpLambda
                | OpSequence
                | OpQuote
                | PrimWrap
                | PrimUnwrap
                | PrimCons
                | PrimCar
                | PrimCdr
                | PrimList
                | PrimEval
                | PrimMakeEnv
                | PrimPred
                | PrimArith
                | PrimBits
        )
    }

    /// True for any combiner.
    pub fn is_combiner(self) -> bool {
        self == Proc::Applicative || self.is_operative()
    }

    /// True for environment behaviors.
    pub fn is_environment(self) -> bool {
        matches!(self, Proc::EmptyEnv | Proc::Scope | Proc::Binding)
    }
}

/// The fixed dispatch table.
pub fn behavior_of(proc: Proc) -> BehaviorFn {
    use Proc::*;
    match proc {
        Free => behaviors::freed_beh,
        Fixnum => behaviors::fixnum_beh,
        Pair => behaviors::pair_beh,
        Symbol => behaviors::symbol_beh,
        Undef => behaviors::undef_beh,
        Unit => behaviors::unit_beh,
        Boolean => behaviors::boolean_beh,
        Null => behaviors::null_beh,
        Fail => behaviors::fail_beh,
        Sink => behaviors::sink_beh,
        Inert => behaviors::inert_beh,
        Ignore => behaviors::ignore_beh,
        EmptyEnv => env::empty_env_beh,
        Scope => env::scope_beh,
        Binding => env::binding_beh,
        Applicative => combiner::applicative_beh,
        Operative => combiner::operative_beh,
        KCall => combiner::k_call_beh,
        KArgs => combiner::k_args_beh,
        KSeq => combiner::k_seq_beh,
        KIf => combiner::k_if_beh,
        KDefine => combiner::k_define_beh,
        Fork => forkjoin::fork_beh,
        Join => forkjoin::join_beh,
        JoinOne => forkjoin::join_one_beh,
        Tag => forkjoin::tag_beh,
        GcMark => gc::gc_mark_beh,
        GcSweep => gc::gc_sweep_beh,
        HostCell => behaviors::host_cell_beh,
        OpIf => combiner::op_if_beh,
        OpDefine => combiner::op_define_beh,
        OpVau => combiner::op_vau_beh,
        OpLambda => combiner::op_lambda_beh,
        OpSequence => combiner::op_sequence_beh,
        OpQuote => combiner::op_quote_beh,
        PrimWrap => ground::prim_wrap_beh,
        PrimUnwrap => ground::prim_unwrap_beh,
        PrimCons => ground::prim_cons_beh,
        PrimCar => ground::prim_car_beh,
        PrimCdr => ground::prim_cdr_beh,
        PrimList => ground::prim_list_beh,
        PrimEval => ground::prim_eval_beh,
        PrimMakeEnv => ground::prim_make_env_beh,
        PrimPred => ground::prim_pred_beh,
        PrimArith => ground::prim_arith_beh,
        PrimBits => ground::prim_bits_beh,
    }
}
