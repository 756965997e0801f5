//! Lock-free doubly linked list with push and pop at both ends.

mod atomic_list;
mod list_config;

pub use atomic_list::AtomicList;
pub use list_config::ListConfig;
