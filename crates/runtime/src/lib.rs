//! Vau Runtime: an actor-model evaluator for a Kernel-family Lisp
//!
//! Every evaluation step is a message between small fixed-size actors in
//! a managed cell heap. The dispatcher pops one event at a time from a
//! FIFO queue, runs the target's behavior to completion, and commits the
//! resulting effect (creations, sends, at most one become) atomically.
//! The collector runs between dispatches, or as an actor of its own
//! interleaved with them.
//!
//! Key pieces:
//! - `runtime`: the [`Runtime`] owner, dispatcher loop, and host API
//! - `effect`: the per-dispatch transaction record
//! - `proc`: the procedure registry behind every actor's code field
//! - `behaviors`, `env`, `combiner`, `forkjoin`, `ground`: the language
//! - `gc`: mark-sweep in stop-the-world and concurrent-actor modes
//! - `config`, `diagnostics`, `watchdog`: the operational surface

pub mod behaviors;
pub mod combiner;
pub mod config;
pub mod diagnostics;
pub mod effect;
pub mod env;
pub mod error;
pub mod forkjoin;
pub mod gc;
pub mod ground;
pub mod proc;
pub mod runtime;
pub mod watchdog;

// Re-export key types
pub use config::{ConfigError, GcMode, RuntimeConfig};
pub use diagnostics::RuntimeStats;
pub use effect::{Effect, Event};
pub use error::Fault;
pub use proc::Proc;
pub use runtime::{Runtime, WellKnown};

// The value layer comes through from the core crate.
pub use vau_core::{Decoded, Heap, HeapStats, SymbolTable, Tag, Value};
