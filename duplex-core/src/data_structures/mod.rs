//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`list`] - Lock-free doubly linked list ([`AtomicList`])
//! - `internal` - Node arena, handles and the anchor word (pub(crate))
//!
//! Node handles never leave the crate:
//!
//! ```compile_fail
//! use duplex_core::Handle;
//! ```

pub(crate) mod internal;
pub mod list;

pub use list::{AtomicList, ListConfig};
