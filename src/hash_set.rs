use alloc::boxed::Box;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;

use crate::DefaultHashBuilder;
use crate::control::capacity_to_growth;
use crate::error::TryReserveError;
use crate::hash_table;
use crate::hash_table::HashTable;
use crate::policy::Inline;
use crate::policy::Node;
use crate::policy::NodeHandle;
use crate::policy::SlotPolicy;

/// A [`HashSet`] whose values live inline in the slot array.
pub type FlatHashSet<T, S = DefaultHashBuilder> = HashSet<T, S, Inline>;

/// A [`HashSet`] whose values live in boxed nodes with stable addresses.
pub type NodeHashSet<T, S = DefaultHashBuilder> = HashSet<T, S, Node>;

/// A hash set backed by the group-probing [`HashTable`].
///
/// `HashSet<T, S, P>` stores values of type `T`, hashing them with the
/// [`BuildHasher`] `S`. The slot policy `P` selects flat storage
/// ([`FlatHashSet`]) or node storage with stable addresses
/// ([`NodeHashSet`]).
pub struct HashSet<T, S = DefaultHashBuilder, P = Inline>
where
    P: SlotPolicy<T>,
{
    table: HashTable<T, P>,
    hash_builder: S,
}

impl<T, S, P> PartialEq for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<T>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<T, S, P> Eq for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<T>,
{
}

impl<T, S, P> Debug for HashSet<T, S, P>
where
    T: Debug,
    P: SlotPolicy<T>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S, P> Clone for HashSet<T, S, P>
where
    T: Clone,
    S: Clone,
    P: SlotPolicy<T>,
{
    fn clone(&self) -> Self {
        HashSet {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<T, S, P> HashSet<T, S, P>
where
    P: SlotPolicy<T>,
{
    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of values the set can hold without growing.
    pub fn capacity(&self) -> usize {
        capacity_to_growth(self.table.capacity())
    }

    /// Returns a reference to the set's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes all values, keeping the allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the allocation as much as possible.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Reserves room for at least `additional` more values.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Tries to reserve room for at least `additional` more values. On error
    /// the set is unchanged.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Returns an iterator over the values in arbitrary order.
    pub fn iter(&self) -> Iter<'_, T, P> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Removes all values, returning them as an iterator. The allocation is
    /// kept.
    pub fn drain(&mut self) -> Drain<'_, T, P> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Retains only the values for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use swiss_table::FlatHashSet;
    ///
    /// let mut set: FlatHashSet<i32> = (1..=4).collect();
    /// set.retain(|&x| x % 2 == 0);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.contains(&2));
    /// assert!(set.contains(&4));
    /// # }
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.table.retain(|v| f(v));
    }

    /// Removes every value for which `f` returns `true` and returns how many
    /// were removed.
    pub fn erase_if(&mut self, mut f: impl FnMut(&T) -> bool) -> usize {
        self.table.erase_if(|v| f(v))
    }

    /// Creates an iterator that removes and yields the values for which `f`
    /// returns `true`.
    ///
    /// If the iterator is dropped before it is exhausted, the remaining
    /// matching values are still removed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use swiss_table::FlatHashSet;
    ///
    /// let mut set: FlatHashSet<i32> = (1..=4).collect();
    /// let extracted: Vec<_> = set.extract_if(|&x| x % 2 == 0).collect();
    /// assert_eq!(set.len(), 2);
    /// assert_eq!(extracted.len(), 2);
    /// assert!(set.contains(&1));
    /// assert!(set.contains(&3));
    /// # }
    /// ```
    pub fn extract_if<'a, F>(&'a mut self, mut f: F) -> ExtractIf<'a, T, P>
    where
        F: FnMut(&T) -> bool + 'a,
    {
        // Values are handed out as `&T` only; mutating them would desync
        // their stored hashes.
        let pred: Box<dyn FnMut(&mut T) -> bool + 'a> = Box::new(move |v: &mut T| f(&*v));
        ExtractIf {
            inner: self.table.extract_if(pred),
        }
    }
}

impl<T, S, P> HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<T>,
{
    /// Creates an empty set using `hash_builder` to hash values.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a set that holds at least `capacity` values before growing,
    /// using `hash_builder` to hash values.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    #[inline]
    fn make_hash<Q: Hash + ?Sized>(&self, value: &Q) -> u64 {
        self.hash_builder.hash_one(value)
    }

    /// Adds a value to the set. Returns `false`, leaving the stored value
    /// untouched, if an equal value was already present.
    pub fn insert(&mut self, value: T) -> bool {
        let hash = self.make_hash(&value);
        match self.table.entry(hash, |v| *v == value) {
            hash_table::Entry::Occupied(_) => false,
            hash_table::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Returns `true` if the set contains a value equal to `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(value).is_some()
    }

    /// Returns a reference to the stored value equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(value);
        self.table.find(hash, |v| v.borrow() == value)
    }

    /// Removes a value. Returns whether it was present.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(value).is_some()
    }

    /// Removes and returns the stored value equal to `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use swiss_table::FlatHashSet;
    ///
    /// let mut set: FlatHashSet<i32> = FlatHashSet::new();
    /// set.insert(1);
    /// assert_eq!(set.take(&1), Some(1));
    /// assert_eq!(set.take(&1), None);
    /// # }
    /// ```
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(value);
        self.table.remove(hash, |v| v.borrow() == value)
    }

    /// Adds a value, replacing and returning an equal value already present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use swiss_table::FlatHashSet;
    ///
    /// let mut set: FlatHashSet<i32> = FlatHashSet::new();
    /// set.insert(1);
    /// assert_eq!(set.replace(1), Some(1));
    /// assert_eq!(set.replace(2), None);
    /// assert_eq!(set.len(), 2);
    /// # }
    /// ```
    pub fn replace(&mut self, value: T) -> Option<T> {
        let hash = self.make_hash(&value);
        match self.table.entry(hash, |v| *v == value) {
            hash_table::Entry::Occupied(mut entry) => {
                Some(core::mem::replace(entry.get_mut(), value))
            }
            hash_table::Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Removes a value and returns its node.
    pub fn extract<Q>(&mut self, value: &Q) -> Option<NodeHandle<T, P>>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(value);
        self.table.extract(hash, |v| v.borrow() == value)
    }

    /// Inserts a node obtained from [`HashSet::extract`]. If an equal value
    /// is present the set is unchanged and the node is handed back.
    pub fn insert_node(&mut self, node: NodeHandle<T, P>) -> InsertReturn<'_, T, P> {
        let hash = self.make_hash(node.value());
        let ret = self.table.insert_node(hash, node, |a, b| a == b);
        InsertReturn {
            position: ret.position,
            inserted: ret.inserted,
            node: ret.node,
        }
    }

    /// Moves every value of `other` that is not in `self` into `self`.
    /// Values already present stay in `other`.
    pub fn merge<S2: BuildHasher>(&mut self, other: &mut HashSet<T, S2, P>) {
        let hash_builder = &self.hash_builder;
        self.table
            .merge(&mut other.table, |v| hash_builder.hash_one(v), |a, b| a == b);
    }
}

impl<T, S, P> HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<T>,
{
    /// Creates an empty set. Nothing is allocated until the first insert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use swiss_table::NodeHashSet;
    ///
    /// let set: NodeHashSet<i32> = NodeHashSet::new();
    /// assert!(set.is_empty());
    /// assert_eq!(set.capacity(), 0);
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a set that holds at least `capacity` values before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S, P> Default for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, P> FromIterator<T> for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T, S, P> Extend<T> for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let reserve = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(reserve);
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, S, P> IntoIterator for HashSet<T, S, P>
where
    P: SlotPolicy<T>,
{
    type IntoIter = IntoIter<T, P>;
    type Item = T;

    fn into_iter(self) -> IntoIter<T, P> {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, T, S, P> IntoIterator for &'a HashSet<T, S, P>
where
    P: SlotPolicy<T>,
{
    type IntoIter = Iter<'a, T, P>;
    type Item = &'a T;

    fn into_iter(self) -> Iter<'a, T, P> {
        self.iter()
    }
}

/// The result of [`HashSet::insert_node`].
pub struct InsertReturn<'a, T, P: SlotPolicy<T> = Inline> {
    /// The value now in the set: the inserted one, or the existing one that
    /// blocked the insertion.
    pub position: &'a T,
    /// Whether the node was inserted.
    pub inserted: bool,
    /// The node, handed back when it was not inserted.
    pub node: Option<NodeHandle<T, P>>,
}

impl<T: Debug, P: SlotPolicy<T>> Debug for InsertReturn<'_, T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsertReturn")
            .field("position", &self.position)
            .field("inserted", &self.inserted)
            .field("node", &self.node)
            .finish()
    }
}

/// An iterator over the values of a `HashSet`.
pub struct Iter<'a, T, P: SlotPolicy<T> = Inline> {
    inner: hash_table::Iter<'a, T, P>,
}

impl<T, P: SlotPolicy<T>> Clone for Iter<'_, T, P> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, T, P: SlotPolicy<T>> Iterator for Iter<'a, T, P> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for Iter<'_, T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for Iter<'_, T, P> {}

/// A draining iterator over the values of a `HashSet`.
pub struct Drain<'a, T, P: SlotPolicy<T> = Inline> {
    inner: hash_table::Drain<'a, T, P>,
}

impl<T, P: SlotPolicy<T>> Iterator for Drain<'_, T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for Drain<'_, T, P> {}

/// An owning iterator over the values of a `HashSet`.
pub struct IntoIter<T, P: SlotPolicy<T> = Inline> {
    inner: hash_table::IntoIter<T, P>,
}

impl<T, P: SlotPolicy<T>> Iterator for IntoIter<T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for IntoIter<T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for IntoIter<T, P> {}

/// An iterator removing the values that match a predicate. See
/// [`HashSet::extract_if`].
pub struct ExtractIf<'a, T, P: SlotPolicy<T> = Inline> {
    inner: hash_table::ExtractIf<'a, T, P, Box<dyn FnMut(&mut T) -> bool + 'a>>,
}

impl<T, P: SlotPolicy<T>> Iterator for ExtractIf<'_, T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}


#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    type Flat<T> = FlatHashSet<T, SipHashBuilder>;
    type Nodes<T> = NodeHashSet<T, SipHashBuilder>;

    #[test]
    fn test_new_and_with_hasher() {
        let set: Flat<i32> = Flat::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.capacity(), 0);

        let set: Nodes<i32> = HashSet::with_hasher(SipHashBuilder::default());
        assert!(set.is_empty());
    }

    #[test]
    fn test_with_capacity() {
        let set: Flat<i32> = Flat::with_capacity(100);
        assert!(set.capacity() >= 100);
        assert!(set.is_empty());
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set: Flat<String> = Flat::new();
        assert!(set.insert("a".to_string()));
        assert!(set.insert("b".to_string()));
        assert!(!set.insert("a".to_string()));
        assert_eq!(set.len(), 2);

        assert!(set.contains("a"));
        assert!(set.contains(&"b".to_string()));
        assert!(!set.contains("c"));
        assert_eq!(set.get("a").map(String::as_str), Some("a"));
    }

    #[test]
    fn insert_keeps_existing_value() {
        #[derive(Debug)]
        struct Tagged(u32, &'static str);

        impl PartialEq for Tagged {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }
        impl Eq for Tagged {}
        impl Hash for Tagged {
            fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        let mut set: Flat<Tagged> = Flat::new();
        assert!(set.insert(Tagged(1, "first")));
        assert!(!set.insert(Tagged(1, "second")));
        assert_eq!(set.get(&Tagged(1, "")).map(|t| t.1), Some("first"));

        let old = set.replace(Tagged(1, "third"));
        assert_eq!(old.map(|t| t.1), Some("first"));
        assert_eq!(set.get(&Tagged(1, "")).map(|t| t.1), Some("third"));
    }

    #[test]
    fn test_remove_and_take() {
        let mut set: Nodes<i32> = (0..10).collect();
        assert!(set.remove(&3));
        assert!(!set.remove(&3));
        assert_eq!(set.take(&4), Some(4));
        assert_eq!(set.take(&4), None);
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn test_clear_reserve_shrink() {
        let mut set: Flat<u64> = (0..200).collect();
        let cap = set.capacity();
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.capacity(), cap);

        set.shrink_to_fit();
        assert_eq!(set.capacity(), 0);

        set.reserve(50);
        assert!(set.capacity() >= 50);
        assert!(set.try_reserve(usize::MAX).is_err());
        assert!(set.capacity() >= 50);
    }

    #[test]
    fn test_iter_and_into_iter() {
        let set: Flat<u32> = (0..100).collect();
        let mut seen: Vec<u32> = set.iter().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        assert_eq!(set.iter().len(), 100);

        let mut by_ref = 0;
        for _ in &set {
            by_ref += 1;
        }
        assert_eq!(by_ref, 100);

        let mut owned: Vec<u32> = set.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned.len(), 100);
    }

    #[test]
    fn test_drain() {
        let mut set: Nodes<String> = (0..20).map(|i| i.to_string()).collect();
        let cap = set.capacity();
        let drained: Vec<String> = set.drain().collect();
        assert_eq!(drained.len(), 20);
        assert!(set.is_empty());
        assert_eq!(set.capacity(), cap);
        assert!(set.insert("again".to_string()));
    }

    #[test]
    fn test_retain_and_erase_if() {
        let mut set: Flat<i32> = (0..100).collect();
        set.retain(|&v| v % 3 != 0);
        assert_eq!(set.len(), 66);
        assert!(!set.contains(&0));

        assert_eq!(set.erase_if(|&v| v > 50), 32);
        assert_eq!(set.erase_if(|&v| v > 50), 0);
        assert_eq!(set.len(), 34);
    }

    #[test]
    fn test_extract_if() {
        let mut set: Nodes<i32> = (0..10).collect();
        let mut odd: Vec<i32> = set.extract_if(|&v| v % 2 == 1).collect();
        odd.sort_unstable();
        assert_eq!(odd, [1, 3, 5, 7, 9]);
        assert_eq!(set.len(), 5);

        // Dropping early still removes every match.
        let mut it = set.extract_if(|&v| v < 6);
        assert!(it.next().is_some());
        drop(it);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&6));
        assert!(set.contains(&8));
    }

    #[test]
    fn test_extract_and_insert_node() {
        let mut set: Nodes<String> = ["x", "y"].into_iter().map(String::from).collect();
        let node = set.extract("x").unwrap();
        let addr = node.value() as *const String;
        assert_eq!(set.len(), 1);

        let ret = set.insert_node(node);
        assert!(ret.inserted);
        assert!(ret.node.is_none());
        assert_eq!(ret.position as *const String, addr);

        let mut other: Nodes<String> = ["y"].into_iter().map(String::from).collect();
        let dup = other.extract("y").unwrap();
        let ret = set.insert_node(dup);
        assert!(!ret.inserted);
        assert_eq!(ret.position, "y");
        assert_eq!(ret.node.map(NodeHandle::into_value).as_deref(), Some("y"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_merge() {
        let mut a: Flat<i32> = [1, 2, 3].into_iter().collect();
        let mut b: Flat<i32> = [3, 4, 5].into_iter().collect();
        a.merge(&mut b);

        let mut left: Vec<i32> = a.iter().copied().collect();
        left.sort_unstable();
        assert_eq!(left, [1, 2, 3, 4, 5]);
        assert_eq!(b.iter().copied().collect::<Vec<_>>(), [3]);
    }

    #[test]
    fn test_equality_clone_debug() {
        let a: Flat<i32> = (0..50).collect();
        let b: Flat<i32> = (0..50).rev().collect();
        assert_eq!(a, b);

        let mut c = a.clone();
        assert_eq!(a, c);
        c.insert(100);
        assert_ne!(a, c);

        let one: Flat<i32> = [7].into_iter().collect();
        assert_eq!(alloc::format!("{one:?}"), "{7}");
    }

    #[test]
    fn test_extend() {
        let mut set: Flat<i32> = Flat::new();
        set.extend([1, 2, 2, 3]);
        assert_eq!(set.len(), 3);
        set.extend(2..6);
        assert_eq!(set.len(), 5);
    }
}
