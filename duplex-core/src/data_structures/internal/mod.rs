//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

mod anchor;
mod arena;
mod handle;

pub(crate) use anchor::{Anchor, AtomicAnchor, End, Status};
pub(crate) use arena::NodeArena;
pub(crate) use handle::{Handle, Link};
