//! Test suites shared by every guard implementation.
//!
//! Each suite is a generic function over the guard type, so the same checks
//! run against `DeferredGuard` here and `EpochGuard` in duplex-crossbeam.

pub mod list_core_tests;
pub mod list_probe;
