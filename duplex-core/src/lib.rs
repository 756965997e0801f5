pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;

// Re-export the list and its guard types for convenience
pub use data_structures::{AtomicList, ListConfig};
pub use error::{ListError, PushError};
pub use guard::{DeferredGuard, Guard};

/*

cargo llvm-cov --html

sudo CARGO_PROFILE_RELEASE_DEBUG=true cargo flamegraph --bench atomic_list_benchmark --root --

cargo valgrind test

*/
