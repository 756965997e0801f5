use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

use log::trace;

use super::handle::{AtomicHandle, Handle, Link};

// Segment k holds `first_capacity << k` slots, so 32 segments cover every
// 31-bit handle for any first capacity.
//
const SEGMENT_COUNT: usize = 32;
const MAX_FIRST_SHIFT: u32 = 20;

/// A node of the list, living in an arena slot.
///
/// `value` is `None` while the slot is free. It is written only while the slot
/// is private to one thread (just allocated, being reclaimed, or during
/// teardown) and read only by threads holding a pinned guard.
///
pub(crate) struct Slot<T> {
    value: UnsafeCell<Option<T>>,
    prev: AtomicHandle,
    next: AtomicHandle,
    free_next: AtomicU32,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Slot {
            value: UnsafeCell::new(None),
            prev: AtomicHandle::nil(),
            next: AtomicHandle::nil(),
            free_next: AtomicU32::new(Handle::NIL.bits()),
        }
    }

    #[inline]
    fn atomic_link(&self, link: Link) -> &AtomicHandle {
        match link {
            Link::Prev => &self.prev,
            Link::Next => &self.next,
        }
    }

    #[inline]
    pub(crate) fn link(&self, link: Link) -> Handle {
        self.atomic_link(link).load()
    }

    #[inline]
    pub(crate) fn set_link(&self, link: Link, handle: Handle) {
        self.atomic_link(link).store(handle)
    }

    #[inline]
    pub(crate) fn cas_link(&self, link: Link, expected: Handle, new: Handle) -> Result<(), Handle> {
        self.atomic_link(link).compare_exchange(expected, new)
    }
}

/// Segmented slot allocator addressed by [`Handle`]s.
///
/// # Design
///
/// ```text
/// segments[0]: [ 0 .. F )           F = first capacity
/// segments[1]: [ F .. 3F )
/// segments[2]: [ 3F .. 7F )
/// ...
/// ```
///
/// Segments are allocated lazily with a CAS and never move or shrink, so a
/// slot reference obtained from a handle stays valid until the arena drops.
/// Freed handles go on a Treiber stack whose top word carries a 32-bit tag
/// next to the handle to rule out ABA on the stack itself.
///
/// The arena never decides when a slot may be reused: callers hand handles
/// back through [`NodeArena::reclaim`] only once their guard allows it.
///
pub(crate) struct NodeArena<T> {
    segments: [AtomicPtr<Slot<T>>; SEGMENT_COUNT],
    first_shift: u32,
    high_water: AtomicU32,
    free_top: AtomicU64,
    _marker: PhantomData<*const T>,
}

// Safety: values are moved in and out of slots by whichever thread owns the
// slot at the time, and shared readers only ever take `&T`.
unsafe impl<T: Send> Send for NodeArena<T> {}
unsafe impl<T: Send + Sync> Sync for NodeArena<T> {}

impl<T> NodeArena<T> {
    /// Create an arena whose first segment holds `first_capacity` slots
    /// (rounded up to a power of two).
    pub(crate) fn new(first_capacity: u32) -> Self {
        // Clamp before rounding: next_power_of_two overflows above 2^31.
        let first_shift = first_capacity
            .clamp(1, 1 << MAX_FIRST_SHIFT)
            .next_power_of_two()
            .trailing_zeros();

        NodeArena {
            segments: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            first_shift,
            high_water: AtomicU32::new(0),
            free_top: AtomicU64::new(Handle::NIL.bits() as u64),
            _marker: PhantomData,
        }
    }

    /// Number of handles ever handed out fresh (free-list reuse not included).
    pub(crate) fn high_water(&self) -> u32 {
        self.high_water.load(Ordering::Acquire)
    }

    /// Capacity of the first segment.
    pub(crate) fn first_capacity(&self) -> u32 {
        1 << self.first_shift
    }

    // Maps a handle index to (segment, offset).
    //
    #[inline]
    fn locate(&self, index: u32) -> (usize, usize) {
        let position = index as u64 + (1u64 << self.first_shift);
        let bucket = 63 - position.leading_zeros();
        let segment = bucket - self.first_shift;
        let offset = position - (1u64 << bucket);
        (segment as usize, offset as usize)
    }

    #[inline]
    fn segment_len(&self, segment: usize) -> usize {
        1usize << (self.first_shift as usize + segment)
    }

    /// Slot of a handle that has been handed out by this arena.
    #[inline]
    pub(crate) fn slot(&self, handle: Handle) -> &Slot<T> {
        debug_assert!(!handle.is_nil(), "dereferencing NIL handle");

        let (segment, offset) = self.locate(handle.index());
        let base = self.segments[segment].load(Ordering::Acquire);
        assert!(
            !base.is_null(),
            "INVARIANT VIOLATION: {handle:?} points into an unallocated segment"
        );

        // Safety: offset < segment_len(segment) by construction of locate(),
        // and segments live as long as the arena.
        unsafe { &*base.add(offset) }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Store `value` in a fresh slot with both links absent.
    ///
    /// Returns the value back if every handle is in use.
    pub(crate) fn allocate(&self, value: T) -> Result<Handle, T> {
        let handle = match self.pop_free() {
            Some(handle) => handle,
            None => match self.bump() {
                Some(handle) => handle,
                None => return Err(value),
            },
        };

        let slot = self.slot(handle);
        // Safety: the handle came off the free list or the bump counter, so no
        // other thread can reach this slot until it is published.
        unsafe {
            *slot.value.get() = Some(value);
        }
        slot.set_link(Link::Prev, Handle::NIL);
        slot.set_link(Link::Next, Handle::NIL);

        Ok(handle)
    }

    fn bump(&self) -> Option<Handle> {
        let index = self
            .high_water
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < Handle::CAPACITY).then_some(count + 1)
            })
            .ok()?;

        self.ensure_segment(index);
        Some(Handle::new(index))
    }

    fn ensure_segment(&self, index: u32) {
        let (segment, _) = self.locate(index);
        if !self.segments[segment].load(Ordering::Acquire).is_null() {
            return;
        }

        let len = self.segment_len(segment);
        let slots: Box<[Slot<T>]> = (0..len).map(|_| Slot::vacant()).collect();
        let fresh = Box::into_raw(slots) as *mut Slot<T>;

        match self.segments[segment].compare_exchange(
            ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => trace!("arena segment {segment} allocated with {len} slots"),
            Err(_) => {
                // Another thread installed the segment first.
                //
                // Safety: `fresh` was never shared.
                unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(fresh, len))) };
            }
        }
    }

    // =========================================================================
    // Free list
    // =========================================================================

    #[inline]
    fn split_top(word: u64) -> (u32, Handle) {
        ((word >> 32) as u32, Handle::from_bits(word as u32))
    }

    #[inline]
    fn join_top(tag: u32, handle: Handle) -> u64 {
        ((tag as u64) << 32) | handle.bits() as u64
    }

    fn pop_free(&self) -> Option<Handle> {
        let mut top = self.free_top.load(Ordering::Acquire);
        loop {
            let (tag, handle) = Self::split_top(top);
            if handle.is_nil() {
                return None;
            }

            let next = Handle::from_bits(self.slot(handle).free_next.load(Ordering::Acquire));
            match self.free_top.compare_exchange_weak(
                top,
                Self::join_top(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(handle),
                Err(actual) => top = actual,
            }
        }
    }

    fn push_free(&self, handle: Handle) {
        let slot = self.slot(handle);
        let mut top = self.free_top.load(Ordering::Acquire);
        loop {
            let (tag, head) = Self::split_top(top);
            slot.free_next.store(head.bits(), Ordering::Release);
            match self.free_top.compare_exchange_weak(
                top,
                Self::join_top(tag.wrapping_add(1), handle),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => top = actual,
            }
        }
    }

    // =========================================================================
    // Value access
    // =========================================================================

    /// Shared view of the value stored in a live slot.
    ///
    /// # Safety
    /// The slot must not be reclaimed or reallocated while the reference is
    /// alive: the caller holds a pinned guard and read `handle` under it.
    ///
    #[inline]
    pub(crate) unsafe fn value(&self, handle: Handle) -> Option<&T> {
        unsafe { (*self.slot(handle).value.get()).as_ref() }
    }

    /// Move the value out of a slot without recycling it.
    ///
    /// # Safety
    /// The caller must own the slot exclusively (teardown, or a node that was
    /// never published).
    ///
    pub(crate) unsafe fn take(&self, handle: Handle) -> Option<T> {
        unsafe { (*self.slot(handle).value.get()).take() }
    }

    /// Hand back a slot that was allocated but never linked into a list.
    ///
    /// # Safety
    /// No other thread may have observed `handle`.
    ///
    pub(crate) unsafe fn release_unpublished(&self, handle: Handle) -> Option<T> {
        let value = unsafe { self.take(handle) };
        self.push_free(handle);
        value
    }

    /// Drop the value of a retired slot and make the slot reusable.
    ///
    /// # Safety
    /// - `handle` was unlinked from its list and retired exactly once
    /// - no thread that could still read `handle` remains pinned
    ///
    pub(crate) unsafe fn reclaim(&self, handle: Handle) {
        let value = unsafe { self.take(handle) };
        debug_assert!(value.is_some(), "{handle:?} reclaimed twice");
        drop(value);
        self.push_free(handle);
    }
}

impl<T> Drop for NodeArena<T> {
    fn drop(&mut self) {
        for segment in 0..SEGMENT_COUNT {
            let base = *self.segments[segment].get_mut();
            if base.is_null() {
                continue;
            }

            let len = self.segment_len(segment);
            // Safety: base was produced by Box::into_raw of a slice of `len`
            // slots in ensure_segment(). Remaining values drop with the slots.
            unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(base, len))) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_locate_covers_segments_contiguously() {
        let arena: NodeArena<u32> = NodeArena::new(4);
        assert_eq!(arena.first_capacity(), 4);

        assert_eq!(arena.locate(0), (0, 0));
        assert_eq!(arena.locate(3), (0, 3));
        assert_eq!(arena.locate(4), (1, 0));
        assert_eq!(arena.locate(11), (1, 7));
        assert_eq!(arena.locate(12), (2, 0));

        let (segment, offset) = arena.locate(Handle::CAPACITY - 1);
        assert!(segment < SEGMENT_COUNT);
        assert!(offset < arena.segment_len(segment));
    }

    #[test]
    fn test_first_capacity_rounds_up() {
        assert_eq!(NodeArena::<u8>::new(0).first_capacity(), 1);
        assert_eq!(NodeArena::<u8>::new(5).first_capacity(), 8);
        assert_eq!(NodeArena::<u8>::new(u32::MAX).first_capacity(), 1 << MAX_FIRST_SHIFT);
        assert_eq!(NodeArena::<u8>::new((1 << 31) | 1).first_capacity(), 1 << MAX_FIRST_SHIFT);
        assert_eq!(NodeArena::<u8>::new((1 << MAX_FIRST_SHIFT) + 1).first_capacity(), 1 << MAX_FIRST_SHIFT);
    }

    #[test]
    fn test_allocate_grows_across_segments() {
        let arena = NodeArena::new(2);
        let handles: Vec<_> = (0..20).map(|i| arena.allocate(i).unwrap()).collect();

        assert_eq!(arena.high_water(), 20);
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(unsafe { arena.value(*handle) }, Some(&i));
            assert!(arena.slot(*handle).link(Link::Prev).is_nil());
            assert!(arena.slot(*handle).link(Link::Next).is_nil());
        }
    }

    #[test]
    fn test_reclaimed_handles_are_reused() {
        let arena = NodeArena::new(4);
        let first = arena.allocate(String::from("a")).unwrap();
        let second = arena.allocate(String::from("b")).unwrap();

        arena.slot(first).set_link(Link::Next, second);
        unsafe { arena.reclaim(first) };

        let reused = arena.allocate(String::from("c")).unwrap();
        assert_eq!(reused, first);
        assert_eq!(arena.high_water(), 2);
        assert!(arena.slot(reused).link(Link::Next).is_nil());
        assert_eq!(unsafe { arena.value(reused) }.map(String::as_str), Some("c"));
    }

    #[test]
    fn test_release_unpublished_returns_value() {
        let arena = NodeArena::new(1);
        let handle = arena.allocate(vec![1, 2, 3]).unwrap();

        let value = unsafe { arena.release_unpublished(handle) };
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert_eq!(arena.pop_free(), Some(handle));
    }

    #[test]
    fn test_concurrent_allocate_yields_distinct_handles() {
        let arena = Arc::new(NodeArena::new(1));
        let num_threads = 8;
        let per_thread = 500;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let arena = Arc::clone(&arena);
                thread::spawn(move || {
                    (0..per_thread)
                        .map(|i| arena.allocate(t * per_thread + i).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for h in handle.join().unwrap() {
                assert!(seen.insert(h), "{h:?} handed out twice");
            }
        }
        assert_eq!(seen.len(), num_threads * per_thread);
    }

    #[test]
    fn test_concurrent_reclaim_and_allocate() {
        let arena = Arc::new(NodeArena::new(8));
        let num_threads = 8;

        let workers: Vec<_> = (0..num_threads)
            .map(|t| {
                let arena = Arc::clone(&arena);
                thread::spawn(move || {
                    for round in 0..1000 {
                        let handle = arena.allocate(t * 1000 + round).unwrap();
                        assert_eq!(unsafe { arena.value(handle) }, Some(&(t * 1000 + round)));
                        unsafe { arena.reclaim(handle) };
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        // Every slot went back to the free list, so the arena never needed
        // more than one slot per thread.
        assert!(arena.high_water() <= num_threads as u32);
    }
}
