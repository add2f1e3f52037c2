#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod control;
mod error;
mod group;
mod probe;

pub mod policy;

/// A hash map over [`HashTable`].
///
/// Provides [`HashMap`] with a standard key-value interface and the
/// [`FlatHashMap`] and [`NodeHashMap`] aliases for the two slot policies.
pub mod hash_map;

pub mod hash_state;

/// The raw open-addressing table.
///
/// [`HashTable`] takes precomputed hashes and equality predicates and
/// handles control bytes, probing, tombstones, and growth.
pub mod hash_table;

/// A hash set over [`HashTable`].
///
/// Provides [`HashSet`] with a standard set interface and the
/// [`FlatHashSet`] and [`NodeHashSet`] aliases for the two slot policies.
pub mod hash_set;

pub use error::TryReserveError;
pub use group::GroupKind;
pub use hash_map::Entry;
pub use hash_map::FlatHashMap;
pub use hash_map::HashMap;
pub use hash_map::NodeHashMap;
pub use hash_set::FlatHashSet;
pub use hash_set::HashSet;
pub use hash_set::NodeHashSet;
pub use hash_state::HashState;
pub use hash_state::HashValue;
pub use hash_table::HashTable;
#[cfg(feature = "stats")]
pub use hash_table::TableStats;
pub use policy::Inline;
pub use policy::Node;
pub use policy::NodeHandle;
pub use policy::SlotPolicy;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder when neither `foldhash` nor `std` is enabled. Supply a
        /// hasher builder explicitly.
        pub enum DefaultHashBuilder {}
    }
}
