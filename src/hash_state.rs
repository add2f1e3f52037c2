//! Type-erased hashing.
//!
//! [`HashState`] wraps any [`Hasher`] behind `&mut dyn Hasher`, so code that
//! feeds bytes into a hash does not need to be generic over the hasher type.
//! Every write is forwarded unchanged, which means hashing a value through a
//! `HashState` yields exactly the hash the wrapped hasher would have produced
//! on its own.
//!
//! ```rust
//! use core::hash::BuildHasher;
//!
//! use swiss_table::DefaultHashBuilder;
//! use swiss_table::hash_state::hash_value_with;
//!
//! let builder = DefaultHashBuilder::default();
//! assert_eq!(hash_value_with(&builder, &(1u32, "one")), builder.hash_one((1u32, "one")));
//! ```

use core::hash::BuildHasher;
use core::hash::Hash;
use core::hash::Hasher;

/// A hasher behind a trait object, with a single "combine bytes" capability
/// and typed conveniences layered on top of it.
pub struct HashState<'a> {
    hasher: &'a mut dyn Hasher,
}

impl<'a> HashState<'a> {
    /// Wraps `hasher`.
    pub fn new(hasher: &'a mut dyn Hasher) -> Self {
        HashState { hasher }
    }

    /// Feeds raw bytes into the hash.
    pub fn combine_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.write(bytes);
        self
    }

    /// Feeds a hashable value into the hash.
    pub fn combine<T: Hash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.hash(self);
        self
    }

    /// Feeds a run of values, prefixed by its length so that adjacent runs
    /// cannot be confused with each other.
    pub fn combine_contiguous<T: Hash>(&mut self, values: &[T]) -> &mut Self {
        self.hasher.write_usize(values.len());
        Hash::hash_slice(values, self);
        self
    }
}

impl Hasher for HashState<'_> {
    fn finish(&self) -> u64 {
        self.hasher.finish()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hasher.write(bytes);
    }

    fn write_u8(&mut self, i: u8) {
        self.hasher.write_u8(i);
    }

    fn write_u16(&mut self, i: u16) {
        self.hasher.write_u16(i);
    }

    fn write_u32(&mut self, i: u32) {
        self.hasher.write_u32(i);
    }

    fn write_u64(&mut self, i: u64) {
        self.hasher.write_u64(i);
    }

    fn write_u128(&mut self, i: u128) {
        self.hasher.write_u128(i);
    }

    fn write_usize(&mut self, i: usize) {
        self.hasher.write_usize(i);
    }

    fn write_i8(&mut self, i: i8) {
        self.hasher.write_i8(i);
    }

    fn write_i16(&mut self, i: i16) {
        self.hasher.write_i16(i);
    }

    fn write_i32(&mut self, i: i32) {
        self.hasher.write_i32(i);
    }

    fn write_i64(&mut self, i: i64) {
        self.hasher.write_i64(i);
    }

    fn write_i128(&mut self, i: i128) {
        self.hasher.write_i128(i);
    }

    fn write_isize(&mut self, i: isize) {
        self.hasher.write_isize(i);
    }
}

/// Object-safe hashing: any value that can feed itself into a [`HashState`].
///
/// Implemented for every [`Hash`] type. `dyn HashValue` is itself [`Hash`],
/// so heterogeneous keys can share one table.
pub trait HashValue {
    /// Feeds `self` into `state`.
    fn hash_value(&self, state: &mut HashState<'_>);
}

impl<T: Hash + ?Sized> HashValue for T {
    fn hash_value(&self, state: &mut HashState<'_>) {
        self.hash(state);
    }
}

impl Hash for dyn HashValue + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_value(&mut HashState::new(state));
    }
}

/// Hashes `value` with a fresh hasher from `builder`.
pub fn hash_value_with<S, T>(builder: &S, value: &T) -> u64
where
    S: BuildHasher,
    T: HashValue + ?Sized,
{
    let mut hasher = builder.build_hasher();
    value.hash_value(&mut HashState::new(&mut hasher));
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::hash::BuildHasherDefault;

    use siphasher::sip::SipHasher;

    use super::*;

    type Sip = BuildHasherDefault<SipHasher>;

    #[test]
    fn erased_hash_matches_direct_hash() {
        let builder = Sip::default();
        assert_eq!(hash_value_with(&builder, &42u64), builder.hash_one(42u64));
        assert_eq!(hash_value_with(&builder, "key"), builder.hash_one("key"));
        assert_eq!(
            hash_value_with(&builder, &(7u8, String::from("x"), -3i64)),
            builder.hash_one((7u8, String::from("x"), -3i64))
        );
    }

    #[test]
    fn combine_bytes_is_write() {
        let mut direct = SipHasher::new();
        direct.write(b"abc");
        direct.write(b"def");

        let mut inner = SipHasher::new();
        HashState::new(&mut inner)
            .combine_bytes(b"abc")
            .combine_bytes(b"def");

        assert_eq!(inner.finish(), direct.finish());
    }

    #[test]
    fn contiguous_runs_are_length_prefixed() {
        let hash = |runs: &[&[u32]]| {
            let mut inner = SipHasher::new();
            let mut state = HashState::new(&mut inner);
            for run in runs {
                state.combine_contiguous(run);
            }
            state.finish()
        };

        assert_ne!(hash(&[&[1, 2], &[3]]), hash(&[&[1], &[2, 3]]));
        assert_eq!(hash(&[&[1, 2], &[3]]), hash(&[&[1, 2], &[3]]));
    }

    #[test]
    fn dyn_values_hash_like_concrete_ones() {
        let builder = Sip::default();
        let values: Vec<Box<dyn HashValue>> = alloc::vec![Box::new(5u16), Box::new("five")];
        assert_eq!(builder.hash_one(&*values[0]), builder.hash_one(5u16));
        assert_eq!(builder.hash_one(&*values[1]), builder.hash_one("five"));
    }
}
