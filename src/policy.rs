//! Slot storage strategies.
//!
//! A table is generic over a [`SlotPolicy`] that decides what one slot of the
//! slot array holds. The choice is made at compile time and the probing
//! algorithm is the same for both:
//!
//! - [`Inline`] stores the element itself in the slot. Rehashing moves
//!   elements, so references do not survive growth (the borrow checker
//!   already forbids holding them across `&mut` calls).
//! - [`Node`] stores a `Box<T>` in the slot. Rehashing only moves the box
//!   pointer, so an element keeps its address for as long as it is in the
//!   table, and across [`extract`](crate::HashTable::extract) and
//!   re-insertion of the same [`NodeHandle`].

use alloc::boxed::Box;
use core::fmt::Debug;

mod sealed {
    pub trait Sealed {}
}

/// Compile-time strategy for what a slot holds. Implemented only by
/// [`Inline`] and [`Node`].
pub trait SlotPolicy<T>: sealed::Sealed {
    /// What a slot of the slot array stores.
    type Slot;

    /// Whether element addresses are stable across rehashing.
    const STABLE_ADDRESSES: bool;

    /// Wraps a value into a slot.
    fn new_slot(value: T) -> Self::Slot;

    /// Unwraps a slot back into its value.
    fn into_value(slot: Self::Slot) -> T;

    /// Borrows the value held by a slot.
    fn get(slot: &Self::Slot) -> &T;

    /// Mutably borrows the value held by a slot.
    fn get_mut(slot: &mut Self::Slot) -> &mut T;
}

/// Elements live directly in the slot array.
#[derive(Debug, Clone, Copy)]
pub enum Inline {}

/// Elements live in individually boxed nodes; slots hold the pointers.
#[derive(Debug, Clone, Copy)]
pub enum Node {}

impl sealed::Sealed for Inline {}
impl sealed::Sealed for Node {}

impl<T> SlotPolicy<T> for Inline {
    type Slot = T;

    const STABLE_ADDRESSES: bool = false;

    #[inline(always)]
    fn new_slot(value: T) -> T {
        value
    }

    #[inline(always)]
    fn into_value(slot: T) -> T {
        slot
    }

    #[inline(always)]
    fn get(slot: &T) -> &T {
        slot
    }

    #[inline(always)]
    fn get_mut(slot: &mut T) -> &mut T {
        slot
    }
}

impl<T> SlotPolicy<T> for Node {
    type Slot = Box<T>;

    const STABLE_ADDRESSES: bool = true;

    #[inline(always)]
    fn new_slot(value: T) -> Box<T> {
        Box::new(value)
    }

    #[inline(always)]
    fn into_value(slot: Box<T>) -> T {
        *slot
    }

    #[inline(always)]
    fn get(slot: &Box<T>) -> &T {
        slot
    }

    #[inline(always)]
    fn get_mut(slot: &mut Box<T>) -> &mut T {
        slot
    }
}

/// An element removed from a table together with its slot storage.
///
/// For [`Node`] tables this owns the original heap node, so handing it back
/// through `insert_node` places the very same allocation into a table. For
/// [`Inline`] tables it simply owns the value.
pub struct NodeHandle<T, P: SlotPolicy<T>> {
    slot: P::Slot,
}

impl<T, P: SlotPolicy<T>> NodeHandle<T, P> {
    /// Creates a detached node holding `value`.
    pub fn new(value: T) -> Self {
        NodeHandle {
            slot: P::new_slot(value),
        }
    }

    pub(crate) fn from_slot(slot: P::Slot) -> Self {
        NodeHandle { slot }
    }

    pub(crate) fn into_slot(self) -> P::Slot {
        self.slot
    }

    /// The held value.
    pub fn value(&self) -> &T {
        P::get(&self.slot)
    }

    /// The held value, mutably. Changing the key changes where the node lands
    /// when it is inserted again.
    pub fn value_mut(&mut self) -> &mut T {
        P::get_mut(&mut self.slot)
    }

    /// Consumes the handle and returns the value.
    pub fn into_value(self) -> T {
        P::into_value(self.slot)
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> NodeHandle<(K, V), P> {
    /// The key of a map node.
    pub fn key(&self) -> &K {
        &self.value().0
    }

    /// The mapped value of a map node.
    pub fn mapped(&self) -> &V {
        &self.value().1
    }

    /// The mapped value of a map node, mutably.
    pub fn mapped_mut(&mut self) -> &mut V {
        &mut self.value_mut().1
    }
}

impl<T: Debug, P: SlotPolicy<T>> Debug for NodeHandle<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("NodeHandle").field(self.value()).finish()
    }
}
