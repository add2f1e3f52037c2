use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::ops::Index;

use crate::DefaultHashBuilder;
use crate::control::capacity_to_growth;
use crate::error::TryReserveError;
use crate::hash_table;
use crate::hash_table::HashTable;
use crate::policy::Inline;
use crate::policy::Node;
use crate::policy::NodeHandle;
use crate::policy::SlotPolicy;

/// A [`HashMap`] whose entries live inline in the slot array.
pub type FlatHashMap<K, V, S = DefaultHashBuilder> = HashMap<K, V, S, Inline>;

/// A [`HashMap`] whose entries live in boxed nodes. References to entries
/// stay valid across growth, and entries keep their address when extracted
/// and inserted again.
pub type NodeHashMap<K, V, S = DefaultHashBuilder> = HashMap<K, V, S, Node>;

/// A hash map backed by the group-probing [`HashTable`].
///
/// `HashMap<K, V, S, P>` stores `(K, V)` pairs, hashing keys with the
/// [`BuildHasher`] `S`. The slot policy `P` selects between flat storage
/// ([`FlatHashMap`]) and node storage with stable addresses
/// ([`NodeHashMap`]).
///
/// [`insert`](HashMap::insert) replaces the value of a key that is already
/// present. Use [`entry`](HashMap::entry) with [`Entry::or_insert`] to keep
/// the existing value instead.
///
/// # Examples
///
/// ```rust
/// use swiss_table::FlatHashMap;
///
/// let mut scores: FlatHashMap<&str, u32> = FlatHashMap::new();
/// scores.insert("alice", 10);
/// scores.insert("bob", 7);
/// *scores.entry("bob").or_insert(0) += 1;
///
/// assert_eq!(scores["bob"], 8);
/// assert_eq!(scores.get("carol"), None);
/// ```
pub struct HashMap<K, V, S = DefaultHashBuilder, P = Inline>
where
    P: SlotPolicy<(K, V)>,
{
    table: HashTable<(K, V), P>,
    hash_builder: S,
}

impl<K, V, S, P> Debug for HashMap<K, V, S, P>
where
    K: Debug,
    V: Debug,
    P: SlotPolicy<(K, V)>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, P> Clone for HashMap<K, V, S, P>
where
    K: Clone,
    V: Clone,
    S: Clone,
    P: SlotPolicy<(K, V)>,
{
    fn clone(&self) -> Self {
        HashMap {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    P: SlotPolicy<(K, V)>,
{
    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of elements the map can hold without growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::FlatHashMap;
    /// let map: FlatHashMap<i32, String> = FlatHashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn capacity(&self) -> usize {
        capacity_to_growth(self.table.capacity())
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes all elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the allocation as much as possible.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Tries to reserve room for at least `additional` more elements. On
    /// error the map is unchanged.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Returns an iterator over the key-value pairs in arbitrary order.
    pub fn iter(&self) -> Iter<'_, K, V, P> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the key-value pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, P> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V, P> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V, P> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V, P> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes all key-value pairs, returning them as an iterator. The
    /// allocation is kept.
    pub fn drain(&mut self) -> Drain<'_, K, V, P> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Keeps only the pairs for which `f` returns `true`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.table.retain(|(k, v)| f(k, v));
    }

    /// Removes every pair for which `f` returns `true` and returns how many
    /// were removed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::FlatHashMap;
    /// let mut map: FlatHashMap<u32, u32> = (0..10).map(|i| (i, i * i)).collect();
    /// assert_eq!(map.erase_if(|_, v| *v > 20), 5);
    /// assert_eq!(map.erase_if(|_, v| *v > 20), 0);
    /// assert_eq!(map.len(), 5);
    /// ```
    pub fn erase_if<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.table.erase_if(|(k, v)| f(k, v))
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<(K, V)>,
{
    /// Creates an empty map using `hash_builder` to hash keys.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a map that holds at least `capacity` elements before growing,
    /// using `hash_builder` to hash keys.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    #[inline]
    fn make_hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Inserts a key-value pair.
    ///
    /// If the key was present, its value is replaced and the old value is
    /// returned; the stored key is left as it was. To keep an existing value
    /// instead, use [`HashMap::entry`] with [`Entry::or_insert`].
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            hash_table::Entry::Occupied(mut entry) => {
                Some(core::mem::replace(&mut entry.get_mut().1, value))
            }
            hash_table::Entry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Returns a reference to the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and its value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        self.table
            .find(hash, |(k, _)| k.borrow() == key)
            .map(|(k, v)| (k, v))
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        self.table
            .find_mut(hash, |(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Removes `key` and returns its value. Removing an absent key does
    /// nothing.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` and returns the stored key with its value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        self.table.remove(hash, |(k, _)| k.borrow() == key)
    }

    /// Gets the entry for `key` for in-place manipulation.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, P> {
        let hash = self.make_hash(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            hash_table::Entry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            hash_table::Entry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Removes `key` and returns its node. For a [`NodeHashMap`] the node is
    /// the original allocation, so inserting it into another map with
    /// [`HashMap::insert_node`] keeps the entry's address.
    pub fn extract<Q>(&mut self, key: &Q) -> Option<NodeHandle<(K, V), P>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        self.table.extract(hash, |(k, _)| k.borrow() == key)
    }

    /// Inserts a node obtained from [`HashMap::extract`].
    ///
    /// If the key is already present, the map is unchanged and the node is
    /// handed back in [`InsertReturn::node`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::NodeHashMap;
    /// let mut a: NodeHashMap<u32, &str> = NodeHashMap::new();
    /// let mut b: NodeHashMap<u32, &str> = NodeHashMap::new();
    /// a.insert(1, "one");
    /// let before = a.get(&1).unwrap() as *const &str;
    ///
    /// let node = a.extract(&1).unwrap();
    /// let ret = b.insert_node(node);
    /// assert!(ret.inserted);
    /// assert_eq!(ret.position.1 as *const &str, before);
    /// ```
    pub fn insert_node(&mut self, node: NodeHandle<(K, V), P>) -> InsertReturn<'_, K, V, P> {
        let hash = self.make_hash(node.key());
        let ret = self.table.insert_node(hash, node, |a, b| a.0 == b.0);
        let (key, value) = ret.position;
        InsertReturn {
            position: (&*key, value),
            inserted: ret.inserted,
            node: ret.node,
        }
    }

    /// Moves every entry of `other` whose key is not in `self` into `self`.
    /// Entries with keys already present stay in `other`. Node addresses are
    /// preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::FlatHashMap;
    /// let mut a: FlatHashMap<u32, &str> = [(1, "a"), (2, "b")].into_iter().collect();
    /// let mut b: FlatHashMap<u32, &str> = [(2, "x"), (3, "c")].into_iter().collect();
    /// a.merge(&mut b);
    ///
    /// assert_eq!(a.len(), 3);
    /// assert_eq!(a[&2], "b");
    /// assert_eq!(b.len(), 1);
    /// assert_eq!(b[&2], "x");
    /// ```
    pub fn merge<S2: BuildHasher>(&mut self, other: &mut HashMap<K, V, S2, P>) {
        let hash_builder = &self.hash_builder;
        self.table.merge(
            &mut other.table,
            |(k, _)| hash_builder.hash_one(k),
            |a, b| a.0 == b.0,
        );
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<(K, V)>,
{
    /// Creates an empty map. Nothing is allocated until the first insert.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a map that holds at least `capacity` elements before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, P> Default for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<(K, V)>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, P> PartialEq for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    P: SlotPolicy<(K, V)>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v == o))
    }
}

impl<K, V, S, P> Eq for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    P: SlotPolicy<(K, V)>,
{
}

impl<K, Q, V, S, P> Index<&Q> for HashMap<K, V, S, P>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    P: SlotPolicy<(K, V)>,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not found in HashMap"),
        }
    }
}

impl<K, V, S, P> FromIterator<(K, V)> for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    P: SlotPolicy<(K, V)>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S, P> Extend<(K, V)> for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    P: SlotPolicy<(K, V)>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        // Duplicate keys are likely when extending a non-empty map, so only
        // half the hint is reserved up front.
        let reserve = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(reserve);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S, P> IntoIterator for HashMap<K, V, S, P>
where
    P: SlotPolicy<(K, V)>,
{
    type IntoIter = IntoIter<K, V, P>;
    type Item = (K, V);

    fn into_iter(self) -> IntoIter<K, V, P> {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, V, S, P> IntoIterator for &'a HashMap<K, V, S, P>
where
    P: SlotPolicy<(K, V)>,
{
    type IntoIter = Iter<'a, K, V, P>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Iter<'a, K, V, P> {
        self.iter()
    }
}

impl<'a, K, V, S, P> IntoIterator for &'a mut HashMap<K, V, S, P>
where
    P: SlotPolicy<(K, V)>,
{
    type IntoIter = IterMut<'a, K, V, P>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> IterMut<'a, K, V, P> {
        self.iter_mut()
    }
}

/// The result of [`HashMap::insert_node`].
pub struct InsertReturn<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    /// The entry now in the map under the node's key: the inserted one, or
    /// the existing one that blocked the insertion.
    pub position: (&'a K, &'a mut V),
    /// Whether the node was inserted.
    pub inserted: bool,
    /// The node, handed back when it was not inserted.
    pub node: Option<NodeHandle<(K, V), P>>,
}

impl<K: Debug, V: Debug, P: SlotPolicy<(K, V)>> Debug for InsertReturn<'_, K, V, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsertReturn")
            .field("position", &self.position)
            .field("inserted", &self.inserted)
            .field("node", &self.node)
            .finish()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, P>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, P>),
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Entry<'a, K, V, P> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value. An existing value is kept.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Like [`Entry::or_insert_with`], with a fallible constructor. A failed
    /// construction leaves the map unchanged.
    pub fn or_try_insert_with<F, E>(self, default: F) -> Result<&'a mut V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(VacantEntry { entry, key }) => entry
                .try_insert_with(|| default().map(|value| (key, value)))
                .map(|(_, v)| v),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, P> Entry<'a, K, V, P>
where
    V: Default,
    P: SlotPolicy<(K, V)>,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    entry: hash_table::VacantEntry<'a, (K, V), P>,
    key: K,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> VacantEntry<'a, K, V, P> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    entry: hash_table::OccupiedEntry<'a, (K, V), P>,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> OccupiedEntry<'a, K, V, P> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }

    /// Removes the entry from the map and returns its node.
    pub fn remove_node(self) -> NodeHandle<(K, V), P> {
        self.entry.remove_node()
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: hash_table::Iter<'a, (K, V), P>,
}

impl<K, V, P: SlotPolicy<(K, V)>> Clone for Iter<'_, K, V, P> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Iterator for Iter<'a, K, V, P> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for Iter<'_, K, V, P> {}
impl<K, V, P: SlotPolicy<(K, V)>> FusedIterator for Iter<'_, K, V, P> {}

/// An iterator over the key-value pairs of a `HashMap`, with mutable values.
pub struct IterMut<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: hash_table::IterMut<'a, (K, V), P>,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Iterator for IterMut<'a, K, V, P> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for IterMut<'_, K, V, P> {}
impl<K, V, P: SlotPolicy<(K, V)>> FusedIterator for IterMut<'_, K, V, P> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: Iter<'a, K, V, P>,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Iterator for Keys<'a, K, V, P> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for Keys<'_, K, V, P> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: Iter<'a, K, V, P>,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Iterator for Values<'a, K, V, P> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for Values<'_, K, V, P> {}

/// An iterator over mutable references to the values of a `HashMap`.
pub struct ValuesMut<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: IterMut<'a, K, V, P>,
}

impl<'a, K, V, P: SlotPolicy<(K, V)>> Iterator for ValuesMut<'a, K, V, P> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for ValuesMut<'_, K, V, P> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: hash_table::Drain<'a, (K, V), P>,
}

impl<K, V, P: SlotPolicy<(K, V)>> Iterator for Drain<'_, K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for Drain<'_, K, V, P> {}

/// An owning iterator over the key-value pairs of a `HashMap`.
pub struct IntoIter<K, V, P: SlotPolicy<(K, V)> = Inline> {
    inner: hash_table::IntoIter<(K, V), P>,
}

impl<K, V, P: SlotPolicy<(K, V)>> Iterator for IntoIter<K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, P: SlotPolicy<(K, V)>> ExactSizeIterator for IntoIter<K, V, P> {}
impl<K, V, P: SlotPolicy<(K, V)>> FusedIterator for IntoIter<K, V, P> {}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

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

    type Flat<K, V> = FlatHashMap<K, V, SipHashBuilder>;
    type Nodes<K, V> = NodeHashMap<K, V, SipHashBuilder>;

    #[test]
    fn test_new_and_with_hasher() {
        let map: Flat<i32, String> = HashMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.capacity(), 0);

        let map: Flat<i32, String> = HashMap::with_hasher(SipHashBuilder { k1: 1, k2: 2 });
        assert_eq!(map.hasher().k1, 1);
    }

    #[test]
    fn test_with_capacity() {
        let mut map: Flat<u32, u32> = HashMap::with_capacity(100);
        let capacity = map.capacity();
        assert!(capacity >= 100);
        for i in 0..100 {
            map.insert(i, i);
        }
        assert_eq!(map.capacity(), capacity);
    }

    #[test]
    fn test_insert_and_get() {
        let mut map: Flat<i32, &str> = HashMap::new();
        assert_eq!(map.insert(1, "one"), None);
        assert_eq!(map.insert(2, "two"), None);
        assert_eq!(map.get(&1), Some(&"one"));
        assert_eq!(map.get(&3), None);

        assert_eq!(map.insert(1, "uno"), Some("one"));
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], "uno");
    }

    #[test]
    fn test_reinsert_through_entry_keeps_existing() {
        let mut map: Nodes<u32, &str> = HashMap::new();
        map.insert(5, "first");
        let value = map.entry(5).or_insert("second");
        assert_eq!(*value, "first");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_borrowed_lookups() {
        let mut map: Flat<String, u32> = HashMap::new();
        map.insert("apple".to_string(), 1);
        map.insert("pear".to_string(), 2);

        assert_eq!(map.get("apple"), Some(&1));
        assert!(map.contains_key("pear"));
        assert_eq!(map.get_key_value("pear"), Some((&"pear".to_string(), &2)));
        *map.get_mut("pear").unwrap() += 10;
        assert_eq!(map["pear"], 12);
        assert_eq!(map.remove_entry("apple"), Some(("apple".to_string(), 1)));
        assert_eq!(map.remove("apple"), None);
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn test_index_missing_panics() {
        let map: Flat<i32, i32> = HashMap::new();
        let _ = map[&1];
    }

    #[test]
    fn test_clear_and_reserve() {
        let mut map: Flat<u64, u64> = HashMap::new();
        for i in 0..100 {
            map.insert(i, i);
        }
        let capacity = map.capacity();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.capacity(), capacity);

        map.reserve(1000);
        assert!(map.capacity() >= 1000);
        assert!(map.try_reserve(usize::MAX).is_err());
        map.insert(1, 1);
        assert_eq!(map[&1], 1);

        map.shrink_to_fit();
        assert!(map.capacity() < 1000);
        assert_eq!(map[&1], 1);
    }

    #[test]
    fn test_entry_api() {
        let mut map: Flat<&str, i32> = HashMap::new();
        *map.entry("a").or_insert(0) += 1;
        *map.entry("a").or_insert(0) += 1;
        *map.entry("b").or_default() += 5;
        map.entry("c").and_modify(|v| *v = 100).or_insert_with(|| 3);
        map.entry("c").and_modify(|v| *v = 100).or_insert_with(|| 3);

        assert_eq!(map["a"], 2);
        assert_eq!(map["b"], 5);
        assert_eq!(map["c"], 100);
        assert_eq!(*map.entry("z").key(), "z");

        match map.entry("a") {
            Entry::Occupied(mut occ) => {
                assert_eq!(occ.key(), &"a");
                assert_eq!(occ.insert(9), 2);
                assert_eq!(occ.remove_entry(), ("a", 9));
            }
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        match map.entry("q") {
            Entry::Vacant(vac) => assert_eq!(vac.into_key(), "q"),
            Entry::Occupied(_) => panic!("expected vacant"),
        }
        assert!(!map.contains_key("q"));
    }

    #[test]
    fn test_or_try_insert_with() {
        let mut map: Flat<u32, String> = HashMap::new();
        let failed: Result<&mut String, &str> = map.entry(1).or_try_insert_with(|| Err("boom"));
        assert_eq!(failed, Err("boom"));
        assert!(map.is_empty());

        let ok = map
            .entry(1)
            .or_try_insert_with(|| Ok::<_, &str>("one".to_string()))
            .unwrap();
        ok.push('!');
        assert_eq!(map[&1], "one!");
    }

    #[test]
    fn test_iterators() {
        let mut map: Flat<u32, u32> = (0..20).map(|i| (i, i * 2)).collect();
        assert_eq!(map.iter().len(), 20);

        let mut keys: Vec<u32> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..20).collect::<Vec<_>>());

        for v in map.values_mut() {
            *v += 1;
        }
        for (k, v) in map.iter_mut() {
            assert_eq!(*v, k * 2 + 1);
            *v -= 1;
        }
        let sum: u32 = map.values().sum();
        assert_eq!(sum, (0..20).map(|i| i * 2).sum());

        for (_, v) in &mut map {
            *v = 0;
        }
        assert!((&map).into_iter().all(|(_, v)| *v == 0));

        let mut owned: Vec<(u32, u32)> = map.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned.len(), 20);
        assert_eq!(owned[3], (3, 0));
    }

    #[test]
    fn test_drain() {
        let mut map: Nodes<u32, String> = (0..10).map(|i| (i, i.to_string())).collect();
        let mut drained: Vec<(u32, String)> = map.drain().collect();
        drained.sort();
        assert_eq!(drained.len(), 10);
        assert_eq!(drained[9], (9, "9".to_string()));
        assert!(map.is_empty());
        map.insert(1, "1".to_string());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_retain_and_erase_if() {
        let mut map: Flat<u32, u32> = (0..100).map(|i| (i, i)).collect();
        map.retain(|k, v| {
            *v += 1;
            k % 2 == 0
        });
        assert_eq!(map.len(), 50);
        assert!(map.iter().all(|(k, v)| *v == k + 1));

        assert_eq!(map.erase_if(|k, _| *k < 10), 5);
        assert_eq!(map.erase_if(|k, _| *k < 10), 0);
        assert_eq!(map.len(), 45);
    }

    #[test]
    fn test_merge() {
        let mut a: Nodes<u32, &str> = HashMap::new();
        a.insert(1, "a");
        a.insert(2, "b");
        let mut b: Nodes<u32, &str> = HashMap::new();
        b.insert(2, "x");
        b.insert(3, "c");
        let moved = b.get(&3).unwrap() as *const &str;

        a.merge(&mut b);

        assert_eq!(a.len(), 3);
        assert_eq!(a[&1], "a");
        assert_eq!(a[&2], "b");
        assert_eq!(a[&3], "c");
        assert_eq!(a.get(&3).unwrap() as *const &str, moved);
        assert_eq!(b.len(), 1);
        assert_eq!(b[&2], "x");
    }

    #[test]
    fn test_merge_across_hashers() {
        let mut a: Flat<u32, u32> = HashMap::with_hasher(SipHashBuilder { k1: 1, k2: 1 });
        let mut b: FlatHashMap<u32, u32, SipHashBuilder> =
            HashMap::with_hasher(SipHashBuilder { k1: 9, k2: 9 });
        for i in 0..50 {
            b.insert(i, i);
        }
        a.merge(&mut b);
        assert!(b.is_empty());
        for i in 0..50 {
            assert_eq!(a[&i], i);
        }
    }

    #[test]
    fn test_extract_and_insert_node() {
        let mut map: Nodes<String, u32> = HashMap::new();
        map.insert("k".to_string(), 1);
        let before = map.get("k").unwrap() as *const u32;

        let mut node = map.extract("k").unwrap();
        assert!(map.get("k").is_none());
        assert_eq!(node.key(), "k");
        *node.mapped_mut() = 2;

        let ret = map.insert_node(node);
        assert!(ret.inserted);
        assert!(ret.node.is_none());
        assert_eq!(ret.position.0, "k");
        assert_eq!(&*ret.position.1 as *const u32, before);
        assert_eq!(map["k"], 2);

        let ret = map.insert_node(NodeHandle::new(("k".to_string(), 3)));
        assert!(!ret.inserted);
        assert_eq!(*ret.position.1, 2);
        assert_eq!(*ret.node.unwrap().mapped(), 3);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_node_addresses_survive_growth() {
        let mut map: Nodes<u32, u64> = HashMap::new();
        map.insert(0, 0);
        let first = map.get(&0).unwrap() as *const u64;
        for i in 1..2000 {
            map.insert(i, u64::from(i));
        }
        assert_eq!(map.get(&0).unwrap() as *const u64, first);
    }

    #[test]
    fn test_equality_and_clone() {
        let a: Flat<u32, String> = (0..30).map(|i| (i, i.to_string())).collect();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.insert(0, "zero".to_string());
        assert_ne!(a, b);
        b.insert(0, "0".to_string());
        assert_eq!(a, b);
        b.remove(&29);
        assert_ne!(a, b);
    }

    #[test]
    fn test_extend_with_duplicates() {
        let mut map: Flat<u32, u32> = HashMap::new();
        map.extend((0..10).map(|i| (i, i)));
        map.extend((5..15).map(|i| (i, i * 10)));
        assert_eq!(map.len(), 15);
        assert_eq!(map[&4], 4);
        assert_eq!(map[&5], 50);
    }

    #[test]
    fn test_debug_format() {
        let mut map: Flat<u32, &str> = HashMap::new();
        map.insert(1, "one");
        assert_eq!(alloc::format!("{map:?}"), r#"{1: "one"}"#);
    }

    #[test]
    fn test_growth_from_capacity_seven() {
        let mut map: Flat<u64, u64> = HashMap::with_capacity(7);
        assert_eq!(map.capacity(), 7);
        for i in 0..1000 {
            map.insert(i, i * 3);
        }
        assert_eq!(map.len(), 1000);
        for i in 0..1000 {
            assert_eq!(map[&i], i * 3);
        }
    }
}
