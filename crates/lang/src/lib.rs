//! Vau Lang: the textual surface of the Vau runtime
//!
//! The runtime core consumes and produces tagged values; this crate is
//! the external collaborator that turns characters into values (`reader`)
//! and values back into characters (`printer`). Both work through the
//! runtime's public accessors; neither reaches into the heap directly.

pub mod prelude;
pub mod printer;
pub mod reader;

pub use prelude::{PRELUDE, install as install_prelude};
pub use printer::{print, write_value};
pub use reader::{ReadError, read, read_all};
