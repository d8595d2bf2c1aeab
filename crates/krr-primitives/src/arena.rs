//! Append-only slot arena for the event log
//!
//! A fixed array of `N` slots with a single atomic claim cursor. Claiming is
//! a compare-exchange bump of the cursor, so it is O(1), never blocks, never
//! allocates, and two concurrent claimers can never receive the same slot.
//!
//! # Safety Invariants
//!
//! 1. **Unique claim**: a slot index is handed out at most once per arena
//! 2. **Write once**: only the [`SlotWriter`] of a slot writes its value,
//!    exactly once, before setting the slot's `published` flag
//! 3. **Read after publish**: readers only dereference a slot after observing
//!    `published == true` with `Acquire` ordering
//! 4. **No drop**: values are `Copy`, so slots never need dropping
//!
//! # Verification
//!
//! This module includes Kani proofs for the claim invariants.

use core::mem::MaybeUninit;

use crate::sync::{AtomicBool, AtomicUsize, Ordering, UnsafeCell};

/// One storage cell of the arena.
struct Slot<T> {
    /// Set once the value is fully written.
    published: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    #[cfg(not(feature = "loom"))]
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Self = Self {
        published: AtomicBool::new(false),
        value: UnsafeCell::new(MaybeUninit::uninit()),
    };

    #[cfg(feature = "loom")]
    fn new() -> Self {
        Self {
            published: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Fixed-capacity, append-only arena of `N` slots.
///
/// Storage is reserved inline, so an arena placed in a `static` needs no heap
/// at all. Slots are claimed in cursor order; once the cursor reaches `N`
/// every further claim returns `None`.
pub struct SlotArena<T: Copy, const N: usize> {
    /// Index of the next slot to hand out (never exceeds `N`)
    cursor: AtomicUsize,
    slots: [Slot<T>; N],
}

impl<T: Copy, const N: usize> SlotArena<T, N> {
    /// Number of slots reserved by this arena.
    pub const CAPACITY: usize = N;

    /// Create an empty arena.
    #[cfg(not(feature = "loom"))]
    pub const fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            slots: [Slot::<T>::EMPTY; N],
        }
    }

    /// Create an empty arena.
    #[cfg(feature = "loom")]
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            slots: core::array::from_fn(|_| Slot::new()),
        }
    }

    /// Claim the next free slot.
    ///
    /// Returns `None` once all `N` slots have been handed out. The claimed
    /// slot holds no value until [`SlotWriter::publish`] is called on it.
    pub fn claim(&self) -> Option<SlotWriter<'_, T>> {
        loop {
            let head = self.cursor.load(Ordering::Relaxed);
            if head >= N {
                return None;
            }

            // Atomic compare-exchange to take ownership of slot `head`
            if self
                .cursor
                .compare_exchange_weak(head, head + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(SlotWriter {
                    slot: &self.slots[head],
                    index: head,
                });
            }
            // If CAS failed, another core claimed - retry
        }
    }

    /// Number of slots claimed so far, published or not.
    pub fn claimed(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Number of slots still available.
    pub fn remaining(&self) -> usize {
        N.saturating_sub(self.claimed())
    }

    /// Get the value of a published slot.
    ///
    /// Returns `None` for out-of-range indices and for slots that were
    /// claimed but not (yet) published.
    pub fn get(&self, index: usize) -> Option<&T> {
        let slot = self.slots.get(index)?;
        if !slot.published.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `published` is only set by the slot's single writer after
        // the value was fully written, and the slot is never written again.
        Some(slot.value.with(|ptr| unsafe { (*ptr).assume_init_ref() }))
    }

    /// Iterate published slots in slot order as `(index, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        (0..self.claimed()).filter_map(move |index| self.get(index).map(|value| (index, value)))
    }

    /// Number of published slots.
    pub fn published(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(not(feature = "loom"))]
impl<T: Copy, const N: usize> Default for SlotArena<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: Shared access is synchronized by the claim cursor (unique writer per
// slot) and the per-slot `published` flag (Release on write, Acquire on read).
unsafe impl<T: Copy + Send + Sync, const N: usize> Sync for SlotArena<T, N> {}

/// Exclusive write access to one claimed slot.
///
/// Dropping the writer without publishing leaves a permanent hole: the slot
/// stays claimed and is skipped by readers.
pub struct SlotWriter<'a, T> {
    slot: &'a Slot<T>,
    index: usize,
}

impl<'a, T: Copy> SlotWriter<'a, T> {
    /// Index of the claimed slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Write the slot's value and make it visible to readers.
    pub fn publish(self, value: T) -> &'a T {
        // SAFETY: this writer is the only one ever created for this slot and
        // `publish` consumes it, so no other reference to the value exists.
        let stored: &'a T = self
            .slot
            .value
            .with_mut(|ptr| unsafe { (*ptr).write(value) });
        self.slot.published.store(true, Ordering::Release);
        stored
    }
}

// ============================================================================
// Kani Proofs for Arena Invariants
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: Two claims never return the same slot
    #[kani::proof]
    fn claims_are_distinct() {
        let arena: SlotArena<u8, 4> = SlotArena::new();

        let first = arena.claim();
        let second = arena.claim();

        if let (Some(a), Some(b)) = (first, second) {
            kani::assert(a.index() != b.index(), "Claims must be distinct");
        }
    }

    /// Proof: Claiming past capacity returns None and leaves the cursor at N
    #[kani::proof]
    #[kani::unwind(6)]
    fn exhaustion_returns_none() {
        let arena: SlotArena<u8, 3> = SlotArena::new();

        for _ in 0..3 {
            kani::assert(arena.claim().is_some(), "Claim within capacity must succeed");
        }

        kani::assert(arena.claim().is_none(), "Claim past capacity must fail");
        kani::assert(arena.claimed() == 3, "Cursor must stop at capacity");
    }

    /// Proof: Cursor only moves forward, and only on success
    #[kani::proof]
    fn cursor_monotonic() {
        let arena: SlotArena<u8, 2> = SlotArena::new();
        let before = arena.claimed();

        let claimed = arena.claim().is_some();
        let after = arena.claimed();

        if claimed {
            kani::assert(after == before + 1, "Cursor must advance by one");
        } else {
            kani::assert(after == before, "Cursor must not move on failure");
        }
    }

    /// Proof: A claimed but unpublished slot is invisible to readers
    #[kani::proof]
    fn unpublished_slot_is_invisible() {
        let arena: SlotArena<u8, 2> = SlotArena::new();
        let value: u8 = kani::any();

        let writer = arena.claim();
        kani::assume(writer.is_some());
        kani::assert(arena.get(0).is_none(), "Unpublished slot must be hidden");

        if let Some(writer) = writer {
            writer.publish(value);
        }
        kani::assert(arena.get(0) == Some(&value), "Published value must be visible");
    }
}
