//! Control bytes, the hash split, and capacity arithmetic.
//!
//! Every slot of a table has one control byte. A byte with the high bit clear
//! is a full slot and holds the low 7 bits of the element's hash (H2). The
//! remaining encodings are reserved markers:
//!
//! | byte   | meaning                                           |
//! |--------|---------------------------------------------------|
//! | `0x80` | [`EMPTY`]: never held an element since last reset |
//! | `0xFE` | [`DELETED`]: tombstone left behind by an erase    |
//! | `0xFF` | [`SENTINEL`]: the single byte at index `capacity` |
//!
//! `EMPTY` and `DELETED` both have the sign bit set and compare below
//! `SENTINEL` as signed bytes, which is what the SSE2 matcher relies on to
//! find "empty or deleted" slots with one compare.

use crate::group::GROUP_WIDTH;

/// Marks a slot that is free and terminates probe chains.
pub(crate) const EMPTY: u8 = 0x80;

/// Marks a slot whose element was erased while a probe chain may run through
/// it.
pub(crate) const DELETED: u8 = 0xFE;

/// Marks the end of the slot range. Never matches empty, deleted or a tag.
pub(crate) const SENTINEL: u8 = 0xFF;

/// Number of control bytes mirrored after the sentinel so a group load at
/// any probe offset stays in bounds.
pub(crate) const NUM_CLONED_BYTES: usize = GROUP_WIDTH - 1;

#[inline(always)]
pub(crate) fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

#[inline(always)]
pub(crate) fn is_empty(ctrl: u8) -> bool {
    ctrl == EMPTY
}

#[inline(always)]
pub(crate) fn is_deleted(ctrl: u8) -> bool {
    ctrl == DELETED
}

/// Probe seed: everything above the tag bits.
#[inline(always)]
pub(crate) fn h1(hash: u64) -> usize {
    (hash >> 7) as usize
}

/// Tag stored in the control byte of a full slot.
#[inline(always)]
pub(crate) fn h2(hash: u64) -> u8 {
    (hash & 0x7F) as u8
}

/// Rounds `n` up to the next capacity of the form `2^k - 1`, with a minimum
/// of 1.
#[inline]
pub(crate) fn normalize_capacity(n: usize) -> usize {
    if n == 0 {
        1
    } else {
        usize::MAX >> n.leading_zeros()
    }
}

/// Number of elements a table with `capacity` slots holds before it has to
/// grow. Keeps the load factor at 7/8.
#[inline]
pub(crate) fn capacity_to_growth(capacity: usize) -> usize {
    debug_assert!(capacity == 0 || is_valid_capacity(capacity));
    capacity - capacity / 8
}

/// Smallest slot count (before normalization) whose growth budget covers
/// `growth` elements. `None` on overflow.
#[inline]
pub(crate) fn growth_to_lowerbound_capacity(growth: usize) -> Option<usize> {
    if growth == 0 {
        return Some(0);
    }
    growth.checked_add((growth - 1) / 7)
}

/// Tables smaller than a group see every slot from any probe offset, so they
/// never need tombstones and skip the backwards placement heuristic.
#[inline(always)]
pub(crate) fn is_small(capacity: usize) -> bool {
    capacity < NUM_CLONED_BYTES
}

#[inline(always)]
pub(crate) fn is_valid_capacity(capacity: usize) -> bool {
    capacity > 0 && (capacity & capacity.wrapping_add(1)) == 0
}

/// Writes `value` into control byte `index` and its mirror.
///
/// # Safety
///
/// `ctrl` must point to `capacity + GROUP_WIDTH` writable control bytes and
/// `index` must be below `capacity`.
#[inline(always)]
pub(crate) unsafe fn set_ctrl(ctrl: *mut u8, capacity: usize, index: usize, value: u8) {
    debug_assert!(index < capacity);
    let mirror = (index.wrapping_sub(NUM_CLONED_BYTES) & capacity) + (NUM_CLONED_BYTES & capacity);
    // SAFETY: The caller guarantees `index < capacity`. `mirror` is either
    // `index` itself or `capacity + 1 + index`, which is below
    // `capacity + GROUP_WIDTH` because only indices below `NUM_CLONED_BYTES`
    // are mirrored.
    unsafe {
        *ctrl.add(index) = value;
        *ctrl.add(mirror) = value;
    }
}
