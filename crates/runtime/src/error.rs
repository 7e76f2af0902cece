//! Dispatch-level faults
//!
//! Two error channels exist in this runtime and they never mix:
//!
//! - Language-level errors (type errors, undefined variables, arity
//!   mismatches) are ordinary reply values: a list headed by the `FAIL`
//!   sentinel, sent to the customer in scope. They never surface as Rust
//!   errors.
//! - `Fault` is the Rust-level channel for conditions a behavior cannot
//!   turn into a reply: heap exhaustion, a second `become` in one
//!   invocation, or evidence of memory corruption. A non-fatal fault
//!   rejects the current effect (its creations and sends are discarded)
//!   and the dispatcher moves on; a fatal fault stops the dispatcher.

use vau_core::SymbolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The cell heap is exhausted; the current effect is rejected.
    OutOfMemory,
    /// A behavior requested `become` twice in one invocation.
    DoubleBecome,
    /// A message was dispatched to a cell carrying the free sentinel.
    FreedCellDispatch(usize),
    /// A structural invariant does not hold; the heap cannot be trusted.
    HeapCorrupt(&'static str),
    /// An actor's code field holds an integer outside the procedure table.
    BadProcId(i64),
    /// The intern table rejected a symbol.
    Symbol(SymbolError),
}

impl Fault {
    /// Fatal faults indicate memory corruption and stop the dispatcher;
    /// the rest reject one effect and let it continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Fault::FreedCellDispatch(_) | Fault::HeapCorrupt(_) | Fault::BadProcId(_)
        )
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::OutOfMemory => write!(f, "cell heap exhausted"),
            Fault::DoubleBecome => write!(f, "behavior requested become twice"),
            Fault::FreedCellDispatch(idx) => {
                write!(f, "message dispatched to freed cell {idx}")
            }
            Fault::HeapCorrupt(what) => write!(f, "heap corrupt: {what}"),
            Fault::BadProcId(id) => write!(f, "unknown procedure id {id} in code field"),
            Fault::Symbol(e) => write!(f, "symbol table: {e}"),
        }
    }
}

impl std::error::Error for Fault {}

impl From<SymbolError> for Fault {
    fn from(e: SymbolError) -> Fault {
        Fault::Symbol(e)
    }
}
