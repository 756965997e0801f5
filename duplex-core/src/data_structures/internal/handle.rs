use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// Handles are 31 bits wide so that two of them plus a 2-bit status fit in a
// single 64-bit anchor word. The all-ones pattern is reserved for NIL.
//
pub(crate) const HANDLE_BITS: u32 = 31;
pub(crate) const HANDLE_MASK: u32 = (1 << HANDLE_BITS) - 1;

/// Stable index of a node slot in a [`NodeArena`](super::arena::NodeArena).
///
/// A handle stays valid for the whole life of the arena: slots never move,
/// they are only recycled once the reclamation guard allows it.
///
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Handle(u32);

impl Handle {
    /// The absent handle (null link).
    pub(crate) const NIL: Handle = Handle(HANDLE_MASK);

    /// Number of distinct non-NIL handles.
    pub(crate) const CAPACITY: u32 = HANDLE_MASK;

    #[inline]
    pub(crate) fn new(index: u32) -> Self {
        debug_assert!(index < Self::CAPACITY, "handle index {index} out of range");
        Handle(index)
    }

    /// Rebuild a handle from its raw bits, masking anything above the handle width.
    #[inline]
    pub(crate) fn from_bits(bits: u32) -> Self {
        Handle(bits & HANDLE_MASK)
    }

    #[inline]
    pub(crate) fn bits(self) -> u32 {
        self.0
    }

    /// Index of the slot in the arena.
    #[inline]
    pub(crate) fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn is_nil(self) -> bool {
        self.0 == HANDLE_MASK
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "Handle(NIL)")
        } else {
            write!(f, "Handle({})", self.0)
        }
    }
}

/// Which of the two cross-links of a node.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Link {
    /// Toward the head.
    Prev,
    /// Toward the tail.
    Next,
}

/// An atomically updated link to another node.
///
/// All accesses are sequentially consistent: the push/stabilize protocol
/// compares a link read against a later anchor read and relies on a single
/// total order between the two.
///
pub(crate) struct AtomicHandle(AtomicU32);

impl AtomicHandle {
    pub(crate) fn nil() -> Self {
        AtomicHandle(AtomicU32::new(Handle::NIL.bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> Handle {
        Handle::from_bits(self.0.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn store(&self, handle: Handle) {
        self.0.store(handle.bits(), Ordering::SeqCst)
    }

    /// CAS the link, returning the observed value on failure.
    #[inline]
    pub(crate) fn compare_exchange(&self, expected: Handle, new: Handle) -> Result<(), Handle> {
        self.0
            .compare_exchange(
                expected.bits(),
                new.bits(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(Handle::from_bits)
    }
}
