// Anchor word: head handle, tail handle and push status packed into one u64,
// so both ends of the list move together under a single CAS.
//
// Bit layout:
//   Bits  0..31: head handle
//   Bits 31..62: tail handle
//   Bits 62..64: status
//
// Status values:
//   0b00: Stable    - every link between head and tail is consistent
//   0b01: PushFront - head was just replaced, new_head.next.prev not fixed yet
//   0b10: PushBack  - tail was just replaced, new_tail.prev.next not fixed yet
//   0b11: Invalid
//
use std::sync::atomic::{AtomicU64, Ordering};

use super::handle::{HANDLE_BITS, HANDLE_MASK, Handle, Link};

const HEAD_SHIFT: u32 = 0;
const TAIL_SHIFT: u32 = HANDLE_BITS;
const STATUS_SHIFT: u32 = 2 * HANDLE_BITS;

/// One end of the list.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum End {
    Front,
    Back,
}

impl End {
    /// Link that points from the end node toward the rest of the chain.
    #[inline]
    pub(crate) fn inward(self) -> Link {
        match self {
            End::Front => Link::Next,
            End::Back => Link::Prev,
        }
    }

    /// Link that points from the end node out of the chain (absent when stable).
    #[inline]
    pub(crate) fn outward(self) -> Link {
        match self {
            End::Front => Link::Prev,
            End::Back => Link::Next,
        }
    }

    #[inline]
    pub(crate) fn push_status(self) -> Status {
        match self {
            End::Front => Status::PushFront,
            End::Back => Status::PushBack,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Status {
    Stable = 0,
    PushFront = 1,
    PushBack = 2,
}

impl Status {
    #[inline]
    fn from_bits(bits: u64) -> Self {
        match bits {
            0 => Status::Stable,
            1 => Status::PushFront,
            2 => Status::PushBack,
            _ => panic!("INVARIANT VIOLATION: invalid anchor status bits {bits:#b}"),
        }
    }

    /// The end whose push is still waiting to be stabilized, if any.
    #[inline]
    pub(crate) fn pending_end(self) -> Option<End> {
        match self {
            Status::Stable => None,
            Status::PushFront => Some(End::Front),
            Status::PushBack => Some(End::Back),
        }
    }
}

/// Decoded value of the anchor word.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct Anchor {
    head: Handle,
    tail: Handle,
    status: Status,
}

impl Anchor {
    pub(crate) const EMPTY: Anchor = Anchor {
        head: Handle::NIL,
        tail: Handle::NIL,
        status: Status::Stable,
    };

    // =========================================================================
    // Construction
    // =========================================================================

    #[inline]
    pub(crate) fn new(head: Handle, tail: Handle, status: Status) -> Self {
        Anchor { head, tail, status }
    }

    /// Anchor of a list holding exactly one node.
    #[inline]
    pub(crate) fn single(handle: Handle) -> Self {
        Anchor::new(handle, handle, Status::Stable)
    }

    #[inline]
    fn pack(self) -> u64 {
        ((self.head.bits() as u64) << HEAD_SHIFT)
            | ((self.tail.bits() as u64) << TAIL_SHIFT)
            | ((self.status as u64) << STATUS_SHIFT)
    }

    #[inline]
    fn unpack(word: u64) -> Self {
        let mask = HANDLE_MASK as u64;
        Anchor {
            head: Handle::from_bits(((word >> HEAD_SHIFT) & mask) as u32),
            tail: Handle::from_bits(((word >> TAIL_SHIFT) & mask) as u32),
            status: Status::from_bits(word >> STATUS_SHIFT),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub(crate) fn head(&self) -> Handle {
        self.head
    }

    #[inline]
    pub(crate) fn tail(&self) -> Handle {
        self.tail
    }

    #[inline]
    pub(crate) fn end(&self, end: End) -> Handle {
        match end {
            End::Front => self.head,
            End::Back => self.tail,
        }
    }

    #[inline]
    pub(crate) fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_nil()
    }

    #[inline]
    pub(crate) fn is_stable(&self) -> bool {
        self.status == Status::Stable
    }

    #[inline]
    pub(crate) fn is_single(&self) -> bool {
        !self.head.is_nil() && self.head == self.tail
    }

    // =========================================================================
    // Transformers
    // =========================================================================

    #[inline]
    pub(crate) fn with_end(&self, end: End, handle: Handle) -> Self {
        match end {
            End::Front => Anchor::new(handle, self.tail, self.status),
            End::Back => Anchor::new(self.head, handle, self.status),
        }
    }

    #[inline]
    pub(crate) fn with_status(&self, status: Status) -> Self {
        Anchor::new(self.head, self.tail, status)
    }
}

/// The list anchor, updated only by whole-word CAS.
pub(crate) struct AtomicAnchor(AtomicU64);

impl AtomicAnchor {
    pub(crate) fn new(anchor: Anchor) -> Self {
        AtomicAnchor(AtomicU64::new(anchor.pack()))
    }

    #[inline]
    pub(crate) fn load(&self) -> Anchor {
        Anchor::unpack(self.0.load(Ordering::SeqCst))
    }

    /// Plain store, only valid while the list is not shared.
    #[inline]
    pub(crate) fn store(&self, anchor: Anchor) {
        self.0.store(anchor.pack(), Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn compare_exchange(&self, current: Anchor, new: Anchor) -> Result<(), Anchor> {
        self.0
            .compare_exchange(current.pack(), new.pack(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(Anchor::unpack)
    }
}
