//! Vau Core: cell-memory primitives for an actor-model Lisp runtime
//!
//! This crate knows nothing about actors, messages, or evaluation. It owns
//! the three representations everything above it is built from:
//!
//! - `Value`: a single machine word with a 2-bit tag (integer, pair,
//!   symbol, actor)
//! - `Heap`: a fixed-limit pool of two-word cells with a free list and a
//!   mark bitmap for the collector
//! - `SymbolTable`: append-only interning of symbol names with stable
//!   integer handles

pub mod heap;
pub mod symbol;
pub mod value;

// Re-export key types
pub use heap::{Cell, Heap, HeapError, HeapStats};
pub use symbol::{SymbolError, SymbolTable};
pub use value::{Decoded, Tag, Value};
