//! Crossbeam-based reclamation for duplex lists.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation, and the `EpochList` alias
//! for the production configuration of the list.
//!
//! # Usage
//!
//! ```
//! use duplex_crossbeam::EpochList;
//!
//! let list: EpochList<i32> = EpochList::from_values([1, 2, 3]);
//! list.push_front(0);
//! assert_eq!(list.snapshot(), vec![0, 1, 2, 3]);
//! ```

pub mod epoch_guard;

// Export the Guard implementation
pub use epoch_guard::EpochGuard;

/// `AtomicList` reclaiming popped nodes through the global epoch collector.
pub type EpochList<T> = duplex_core::AtomicList<T, EpochGuard>;
