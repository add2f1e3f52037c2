use alloc::alloc::alloc;
use alloc::alloc::dealloc;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem;
use core::ptr;
use core::ptr::NonNull;

use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::control::DELETED;
use crate::control::EMPTY;
use crate::control::NUM_CLONED_BYTES;
use crate::control::SENTINEL;
use crate::control::capacity_to_growth;
use crate::control::growth_to_lowerbound_capacity;
use crate::control::h1;
use crate::control::h2;
use crate::control::is_deleted;
use crate::control::is_empty;
use crate::control::is_full;
use crate::control::is_small;
use crate::control::is_valid_capacity;
use crate::control::normalize_capacity;
use crate::control::set_ctrl;
use crate::error::Fallibility;
use crate::error::TryReserveError;
use crate::group::BitMask;
use crate::group::GROUP_WIDTH;
use crate::group::GroupKind;
use crate::policy::Inline;
use crate::policy::NodeHandle;
use crate::policy::SlotPolicy;
use crate::probe::ProbeSeq;
use crate::probe::probe_group_index;

/// Mixed into the per-process seed so the placement stream differs from any
/// hash the default builder produces for user keys.
const PLACEMENT_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[cfg(feature = "foldhash")]
fn default_seed() -> u64 {
    use core::hash::BuildHasher;
    foldhash::fast::RandomState::default().hash_one(PLACEMENT_SALT)
}

#[cfg(all(not(feature = "foldhash"), feature = "std"))]
fn default_seed() -> u64 {
    use core::hash::BuildHasher;
    std::hash::RandomState::new().hash_one(PLACEMENT_SALT)
}

#[cfg(all(not(feature = "foldhash"), not(feature = "std")))]
fn default_seed() -> u64 {
    PLACEMENT_SALT
}

/// Growth requested through an infallible path either succeeds, panics, or
/// aborts.
#[inline(always)]
fn infallible(result: Result<(), TryReserveError>) {
    if let Err(err) = result {
        unreachable!("infallible growth reported {err}");
    }
}

/// Offsets of the three arrays inside one table allocation.
///
/// The control bytes come first (`capacity + GROUP_WIDTH` of them), then the
/// slot array, then one stored `u64` hash per slot. Stored hashes let resize
/// and in-place rehash move elements without calling back into the hasher.
#[derive(Debug, Clone, Copy)]
struct DataLayout {
    layout: Layout,
    ctrl_offset: usize,
    slots_offset: usize,
    hashes_offset: usize,
}

impl DataLayout {
    fn new<S>(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return Some(DataLayout {
                layout: Layout::new::<()>(),
                ctrl_offset: 0,
                slots_offset: 0,
                hashes_offset: 0,
            });
        }

        let ctrl = Layout::array::<u8>(capacity.checked_add(GROUP_WIDTH)?).ok()?;
        let slots = Layout::array::<S>(capacity).ok()?;
        let hashes = Layout::array::<u64>(capacity).ok()?;

        let (layout, ctrl_offset) = Layout::new::<()>().extend(ctrl).ok()?;
        let (layout, slots_offset) = layout.extend(slots).ok()?;
        let (layout, hashes_offset) = layout.extend(hashes).ok()?;

        Some(DataLayout {
            layout: layout.pad_to_align(),
            ctrl_offset,
            slots_offset,
            hashes_offset,
        })
    }

    /// # Safety
    ///
    /// `base` must be the allocation this layout describes, or dangling for
    /// a zero-capacity layout.
    #[inline(always)]
    unsafe fn ctrl(&self, base: NonNull<u8>) -> *mut u8 {
        // SAFETY: Offsets were computed from this layout.
        unsafe { base.as_ptr().add(self.ctrl_offset) }
    }

    /// # Safety
    ///
    /// Same as [`DataLayout::ctrl`], and `S` must be the slot type the layout
    /// was computed for.
    #[inline(always)]
    unsafe fn slots<S>(&self, base: NonNull<u8>) -> *mut S {
        // SAFETY: Offsets were computed from this layout.
        unsafe { base.as_ptr().add(self.slots_offset).cast::<S>() }
    }

    /// # Safety
    ///
    /// Same as [`DataLayout::ctrl`].
    #[inline(always)]
    unsafe fn hashes(&self, base: NonNull<u8>) -> *mut u64 {
        // SAFETY: Offsets were computed from this layout.
        unsafe { base.as_ptr().add(self.hashes_offset).cast::<u64>() }
    }
}

/// Allocates storage for `capacity` slots with every control byte reset.
fn allocate<S>(
    capacity: usize,
    fallibility: Fallibility,
) -> Result<(DataLayout, NonNull<u8>), TryReserveError> {
    debug_assert!(capacity == 0 || is_valid_capacity(capacity));
    let layout = DataLayout::new::<S>(capacity).ok_or_else(|| fallibility.capacity_overflow())?;
    if capacity == 0 {
        return Ok((layout, NonNull::dangling()));
    }

    // SAFETY: A non-zero capacity always has a non-zero layout because of the
    // control bytes.
    let raw = unsafe { alloc(layout.layout) };
    let Some(base) = NonNull::new(raw) else {
        return Err(fallibility.alloc_err(layout.layout));
    };

    // SAFETY: The allocation holds `capacity + GROUP_WIDTH` control bytes at
    // `ctrl_offset`.
    unsafe {
        let ctrl = layout.ctrl(base);
        ptr::write_bytes(ctrl, EMPTY, capacity + GROUP_WIDTH);
        *ctrl.add(capacity) = SENTINEL;
    }

    Ok((layout, base))
}

/// Returns the first slot along `hash`'s probe sequence that is empty or
/// deleted. With `backwards`, the last such slot of the first group that has
/// one is picked instead.
///
/// Small tables keep EMPTY padding in their trailing control bytes, so a full
/// small table still yields an index. Callers detect that through the growth
/// budget.
///
/// # Safety
///
/// `ctrl` must point to the control bytes of a table with `capacity > 0`.
#[inline]
unsafe fn find_first_non_full(
    ctrl: *const u8,
    capacity: usize,
    group: GroupKind,
    hash: u64,
    backwards: bool,
) -> usize {
    for pos in ProbeSeq::new(h1(hash), capacity) {
        // SAFETY: Probe offsets are at most `capacity`, and the control array
        // has `GROUP_WIDTH` bytes past the sentinel.
        let mask = unsafe { group.match_empty_or_deleted(ctrl.add(pos)) };
        let bit = if backwards {
            mask.highest_set_bit()
        } else {
            mask.lowest_set_bit()
        };
        if let Some(bit) = bit {
            return (pos + bit) & capacity;
        }
    }

    unreachable!("a table always keeps a free slot within its probe sequence")
}

/// Walks the full slots of a control array, one aligned group at a time.
///
/// Holds a raw pointer rather than a borrow, so the owner may erase slots it
/// has already been handed while iterating.
#[derive(Clone)]
pub(crate) struct RawIter {
    ctrl: *const u8,
    capacity: usize,
    group: GroupKind,
    base: usize,
    current: BitMask,
}

impl RawIter {
    /// # Safety
    ///
    /// `ctrl` must stay valid for as long as the iterator is advanced.
    unsafe fn new(ctrl: *const u8, capacity: usize, group: GroupKind) -> Self {
        let current = if capacity == 0 {
            BitMask(0)
        } else {
            // SAFETY: A non-empty table has at least `GROUP_WIDTH` control
            // bytes.
            unsafe { group.match_full(ctrl) }.truncate(capacity)
        };
        RawIter {
            ctrl,
            capacity,
            group,
            base: 0,
            current,
        }
    }
}

impl Iterator for RawIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(bit) = self.current.next() {
                return Some(self.base + bit);
            }
            if self.base >= self.capacity {
                return None;
            }
            self.base += GROUP_WIDTH;
            if self.base >= self.capacity {
                return None;
            }
            // SAFETY: `base < capacity`, so the group load stays inside the
            // control array.
            self.current = unsafe { self.group.match_full(self.ctrl.add(self.base)) }
                .truncate(self.capacity - self.base);
        }
    }
}

/// Statistics describing the occupancy of a table.
///
/// Available with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct TableStats {
    /// Number of elements currently in the table.
    pub len: usize,
    /// Number of slots.
    pub capacity: usize,
    /// Insertions into empty slots left before the table must grow.
    pub growth_left: usize,
    /// Number of tombstones.
    pub tombstones: usize,
    /// Load factor (`len / capacity`).
    pub load_factor: f64,
    /// Total bytes of the table allocation.
    pub total_bytes: usize,
    /// Longest probe, counted in groups, any element needs.
    pub max_probe_length: usize,
}

#[cfg(any(test, feature = "stats"))]
impl TableStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Statistics ===");
        println!(
            "Population: {}/{} slots ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Growth left: {} ({} tombstones)",
            self.growth_left, self.tombstones
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!("Longest probe: {} groups", self.max_probe_length);
    }
}

/// An open-addressing hash table storing elements of type `T` in groups of
/// control bytes probed with SIMD.
///
/// Like the raw tables it is modeled after, `HashTable` never hashes anything
/// itself: every operation takes the element's 64-bit hash and an equality
/// predicate. [`HashMap`](crate::HashMap) and [`HashSet`](crate::HashSet) put
/// a [`BuildHasher`](core::hash::BuildHasher) in front of it.
///
/// The slot policy `P` decides whether elements live in the slot array
/// ([`Inline`], the default) or in boxed nodes ([`Node`](crate::Node)) whose
/// addresses never change while they are in the table.
///
/// ## Layout
///
/// - A control array of `capacity + 16` bytes: one byte per slot, a sentinel,
///   and a mirror of the first 15 bytes so any 16-byte group load is in
///   bounds.
/// - The slot array.
/// - One stored hash per slot, used when the table is rebuilt.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use siphasher::sip::SipHasher;
/// # use swiss_table::hash_table::Entry;
/// # use swiss_table::hash_table::HashTable;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table: HashTable<Person> = HashTable::with_capacity(100);
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p| p.id == 123) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => unreachable!(),
/// }
///
/// assert_eq!(table.find(hash, |p| p.id == 123).unwrap().name, "Alice");
/// ```
pub struct HashTable<T, P = Inline>
where
    P: SlotPolicy<T>,
{
    layout: DataLayout,
    alloc: NonNull<u8>,

    capacity: usize,
    populated: usize,
    growth_left: usize,

    group: GroupKind,
    placement: SmallRng,

    _slots: PhantomData<P::Slot>,
}

// SAFETY: The table owns its slots exclusively, like a `Vec<P::Slot>`.
unsafe impl<T, P: SlotPolicy<T>> Send for HashTable<T, P> where P::Slot: Send {}

// SAFETY: Shared access only hands out shared references to slots.
unsafe impl<T, P: SlotPolicy<T>> Sync for HashTable<T, P> where P::Slot: Sync {}

impl<T, P: SlotPolicy<T>> Debug for HashTable<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct Ctrl<'a, T, P: SlotPolicy<T>>(&'a HashTable<T, P>);

        impl<T, P: SlotPolicy<T>> Debug for Ctrl<'_, T, P> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let table = self.0;
                let mut list = f.debug_list();
                if table.capacity == 0 {
                    return list.finish();
                }

                // SAFETY: The control array holds `capacity + GROUP_WIDTH`
                // initialized bytes.
                let bytes = unsafe {
                    core::slice::from_raw_parts(table.ctrl(), table.capacity + GROUP_WIDTH)
                };
                for chunk in bytes.chunks(GROUP_WIDTH) {
                    let mut line = alloc::string::String::with_capacity(GROUP_WIDTH * 3);
                    for &byte in chunk {
                        let cell = match byte {
                            EMPTY => alloc::string::String::from(".."),
                            DELETED => alloc::string::String::from("xx"),
                            SENTINEL => alloc::string::String::from("||"),
                            tag => alloc::format!("{tag:02x}"),
                        };
                        line.push_str(&cell);
                        line.push(' ');
                    }
                    list.entry(&format_args!("{}", line.trim_end()));
                }
                list.finish()
            }
        }

        f.debug_struct("HashTable")
            .field("len", &self.populated)
            .field("capacity", &self.capacity)
            .field("growth_left", &self.growth_left)
            .field("group", &self.group)
            .field("ctrl", &Ctrl(self))
            .finish()
    }
}

impl<T: Clone, P: SlotPolicy<T>> Clone for HashTable<T, P> {
    fn clone(&self) -> Self {
        let mut new = self.empty_like();
        if self.capacity == 0 {
            return new;
        }
        infallible(new.resize(self.capacity, Fallibility::Infallible));

        // SAFETY: Both tables have the same capacity and therefore the same
        // layout, so every element can go to the slot it occupies in `self`.
        // Control bytes are published one element at a time, so a panicking
        // `clone` leaves `new` holding exactly the elements written so far.
        unsafe {
            for index in self.raw_iter() {
                let value = self.element(index).clone();
                new.slot_ptr(index).write(P::new_slot(value));
                new.hash_ptr(index).write(*self.hash_ptr(index));
                set_ctrl(new.ctrl(), new.capacity, index, *self.ctrl().add(index));
                new.populated += 1;
            }

            ptr::copy_nonoverlapping(self.ctrl(), new.ctrl(), self.capacity + GROUP_WIDTH);
        }
        new.growth_left = self.growth_left;

        new
    }
}

impl<T, P: SlotPolicy<T>> Drop for HashTable<T, P> {
    fn drop(&mut self) {
        // SAFETY: Full control bytes mark initialized slots.
        unsafe {
            self.drop_elements();
        }

        if self.capacity != 0 {
            // SAFETY: The allocation was made with this layout.
            unsafe {
                dealloc(self.alloc.as_ptr(), self.layout.layout);
            }
        }
    }
}

impl<T, P: SlotPolicy<T>> Default for HashTable<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: SlotPolicy<T>> HashTable<T, P> {
    /// Creates an empty table. Nothing is allocated until the first insert.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a table that holds at least `capacity` elements before it has
    /// to grow.
    ///
    /// # Panics
    ///
    /// Panics if the required slot count overflows `usize`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_seed(capacity, default_seed())
    }

    /// Like [`HashTable::with_capacity`], with an explicit seed for the
    /// randomized slot placement. Two tables built with the same seed that
    /// see the same operations end up with identical layouts.
    pub fn with_capacity_and_seed(capacity: usize, seed: u64) -> Self {
        let mut table = HashTable {
            layout: DataLayout {
                layout: Layout::new::<()>(),
                ctrl_offset: 0,
                slots_offset: 0,
                hashes_offset: 0,
            },
            alloc: NonNull::dangling(),
            capacity: 0,
            populated: 0,
            growth_left: 0,
            group: GroupKind::detect(),
            placement: SmallRng::seed_from_u64(seed),
            _slots: PhantomData,
        };

        if capacity != 0 {
            let result = Self::capacity_for(capacity, Fallibility::Infallible)
                .and_then(|slots| table.resize(slots, Fallibility::Infallible));
            infallible(result);
        }

        table
    }

    /// Switches the group matcher used for probing. Any kind is correct;
    /// [`GroupKind::detect`] picks the fastest.
    pub fn with_group_kind(mut self, group: GroupKind) -> Self {
        self.group = group;
        self
    }

    /// The group matcher this table probes with.
    pub fn group_kind(&self) -> GroupKind {
        self.group
    }

    fn empty_like(&self) -> Self {
        HashTable {
            layout: DataLayout {
                layout: Layout::new::<()>(),
                ctrl_offset: 0,
                slots_offset: 0,
                hashes_offset: 0,
            },
            alloc: NonNull::dangling(),
            capacity: 0,
            populated: 0,
            growth_left: 0,
            group: self.group,
            placement: self.placement.clone(),
            _slots: PhantomData,
        }
    }

    fn capacity_for(items: usize, fallibility: Fallibility) -> Result<usize, TryReserveError> {
        growth_to_lowerbound_capacity(items)
            .map(normalize_capacity)
            .ok_or_else(|| fallibility.capacity_overflow())
    }

    #[inline(always)]
    fn ctrl(&self) -> *mut u8 {
        // SAFETY: `alloc` is described by `layout`.
        unsafe { self.layout.ctrl(self.alloc) }
    }

    #[inline(always)]
    fn slots(&self) -> *mut P::Slot {
        // SAFETY: `alloc` is described by `layout`.
        unsafe { self.layout.slots::<P::Slot>(self.alloc) }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity`.
    #[inline(always)]
    unsafe fn slot_ptr(&self, index: usize) -> *mut P::Slot {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees `index` is within the slot array.
        unsafe { self.slots().add(index) }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity`.
    #[inline(always)]
    unsafe fn hash_ptr(&self, index: usize) -> *mut u64 {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees `index` is within the hash array.
        unsafe { self.layout.hashes(self.alloc).add(index) }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity`.
    #[inline(always)]
    unsafe fn ctrl_at(&self, index: usize) -> u8 {
        // SAFETY: Caller guarantees `index` is within the control array.
        unsafe { *self.ctrl().add(index) }
    }

    /// # Safety
    ///
    /// Slot `index` must be full.
    #[inline(always)]
    unsafe fn element(&self, index: usize) -> &T {
        // SAFETY: Full slots are initialized.
        unsafe { P::get(&*self.slot_ptr(index)) }
    }

    /// # Safety
    ///
    /// Slot `index` must be full.
    #[inline(always)]
    unsafe fn element_mut(&mut self, index: usize) -> &mut T {
        // SAFETY: Full slots are initialized.
        unsafe { P::get_mut(&mut *self.slot_ptr(index)) }
    }

    /// # Safety
    ///
    /// The returned iterator must not outlive the current allocation.
    #[inline]
    unsafe fn raw_iter(&self) -> RawIter {
        // SAFETY: Forwarded caller guarantee.
        unsafe { RawIter::new(self.ctrl(), self.capacity, self.group) }
    }

    /// # Safety
    ///
    /// Every full control byte must mark an initialized slot.
    unsafe fn drop_elements(&mut self) {
        if !mem::needs_drop::<P::Slot>() || self.populated == 0 {
            return;
        }
        // SAFETY: Full slots are initialized and each is dropped once.
        unsafe {
            for index in self.raw_iter() {
                ptr::drop_in_place(self.slot_ptr(index));
            }
        }
    }

    /// Resets every control byte without dropping elements.
    fn clear_no_drop(&mut self) {
        if self.capacity != 0 {
            // SAFETY: The control array holds `capacity + GROUP_WIDTH` bytes.
            unsafe {
                ptr::write_bytes(self.ctrl(), EMPTY, self.capacity + GROUP_WIDTH);
                *self.ctrl().add(self.capacity) = SENTINEL;
            }
        }
        self.populated = 0;
        self.growth_left = capacity_to_growth(self.capacity);
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots. Zero for a table that never allocated,
    /// otherwise one less than a power of two.
    ///
    /// At most 7/8 of the slots (all of them below 8 slots) are filled before
    /// the table grows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many more elements can be inserted into empty slots before
    /// the table grows or rehashes. Reusing a tombstone does not consume it.
    pub fn growth_left(&self) -> usize {
        self.growth_left
    }

    fn tombstones(&self) -> usize {
        capacity_to_growth(self.capacity) - self.populated - self.growth_left
    }

    #[inline(always)]
    fn probe_seq(&self, hash: u64) -> ProbeSeq {
        ProbeSeq::new(h1(hash), self.capacity)
    }

    fn find_index(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<usize> {
        if self.populated == 0 {
            return None;
        }

        let tag = h2(hash);
        let ctrl = self.ctrl();
        for pos in self.probe_seq(hash) {
            // SAFETY: Probe offsets are at most `capacity`, matched slots are
            // full, and the control array has `GROUP_WIDTH` bytes past the
            // sentinel.
            unsafe {
                for bit in self.group.match_byte(ctrl.add(pos), tag) {
                    let index = (pos + bit) & self.capacity;
                    if eq(self.element(index)) {
                        return Some(index);
                    }
                }

                if self.group.match_empty(ctrl.add(pos)).any_bit_set() {
                    return None;
                }
            }
        }

        None
    }

    /// Coin flip, driven by the per-table generator, that spreads insertions
    /// over both ends of their first free group.
    #[inline]
    fn should_insert_backwards(&mut self, hash: u64) -> bool {
        (h1(hash) as u64 ^ self.placement.next_u64()) % 13 > 6
    }

    #[inline]
    fn find_insert_slot(&mut self, hash: u64) -> usize {
        let backwards = !is_small(self.capacity) && self.should_insert_backwards(hash);
        // SAFETY: Only called with a non-zero capacity.
        unsafe { find_first_non_full(self.ctrl(), self.capacity, self.group, hash, backwards) }
    }

    /// Claims a slot for an element with `hash`, growing the table first if
    /// the only candidate is an empty slot and the growth budget is spent.
    /// The returned slot's control byte and stored hash are set; the slot
    /// itself is uninitialized.
    fn prepare_insert(&mut self, hash: u64) -> usize {
        if self.capacity == 0 {
            infallible(self.reserve_rehash(1, Fallibility::Infallible));
        }

        let mut index = self.find_insert_slot(hash);
        // SAFETY: `index < capacity`.
        if self.growth_left == 0 && !is_deleted(unsafe { self.ctrl_at(index) }) {
            infallible(self.reserve_rehash(1, Fallibility::Infallible));
            index = self.find_insert_slot(hash);
        }

        // SAFETY: `index < capacity`, and the slot is empty or deleted.
        unsafe {
            if is_empty(self.ctrl_at(index)) {
                self.growth_left -= 1;
            }
            self.populated += 1;
            set_ctrl(self.ctrl(), self.capacity, index, h2(hash));
            self.hash_ptr(index).write(hash);
        }

        index
    }

    /// Marks slot `index` as no longer full. The slot becomes EMPTY when no
    /// probe sequence can have passed over it while it was full, which is the
    /// case when the run of non-empty bytes around it is shorter than a group.
    /// Otherwise it becomes a tombstone.
    ///
    /// # Safety
    ///
    /// Slot `index` must be full. Its contents are left in place for the
    /// caller to move out or drop.
    unsafe fn erase_meta(&mut self, index: usize) {
        debug_assert!(is_full(unsafe { self.ctrl_at(index) }));
        self.populated -= 1;

        let ctrl = self.ctrl();
        let index_before = index.wrapping_sub(GROUP_WIDTH) & self.capacity;
        // SAFETY: Both offsets are at most `capacity`.
        let (empty_before, empty_after) = unsafe {
            (
                self.group.match_empty(ctrl.add(index_before)),
                self.group.match_empty(ctrl.add(index)),
            )
        };

        let was_never_full = empty_before.any_bit_set()
            && empty_after.any_bit_set()
            && empty_after.trailing_zeros() + empty_before.leading_zeros() < GROUP_WIDTH;

        let marker = if was_never_full {
            self.growth_left += 1;
            EMPTY
        } else {
            DELETED
        };

        // SAFETY: `index < capacity`.
        unsafe {
            set_ctrl(ctrl, self.capacity, index, marker);
        }
    }

    /// # Safety
    ///
    /// Slot `index` must be full.
    unsafe fn take_at(&mut self, index: usize) -> P::Slot {
        // SAFETY: Forwarded caller guarantee; the slot is read exactly once
        // after its control byte stops marking it full.
        unsafe {
            self.erase_meta(index);
            self.slot_ptr(index).read()
        }
    }

    /// Makes room for `additional` more elements, either by purging
    /// tombstones in place or by moving to a larger allocation.
    fn reserve_rehash(
        &mut self,
        additional: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        let new_items = self
            .populated
            .checked_add(additional)
            .ok_or_else(|| fallibility.capacity_overflow())?;

        let full_capacity = capacity_to_growth(self.capacity);
        if !is_small(self.capacity) && new_items <= full_capacity / 2 {
            self.rehash_in_place();
            return Ok(());
        }

        let wanted = usize::max(new_items, full_capacity + 1);
        let capacity = Self::capacity_for(wanted, fallibility)?;
        self.resize(capacity, fallibility)
    }

    /// Moves every element into a fresh allocation of `new_capacity` slots.
    ///
    /// The new storage is allocated before anything is touched, so a failed
    /// allocation leaves the table as it was.
    fn resize(
        &mut self,
        new_capacity: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        debug_assert!(capacity_to_growth(new_capacity) >= self.populated);

        let (new_layout, new_alloc) = allocate::<P::Slot>(new_capacity, fallibility)?;
        debug!(
            old_capacity = self.capacity,
            new_capacity,
            len = self.populated,
            "resizing hash table"
        );

        // SAFETY: Full slots of the old table are initialized. Each one is
        // bitwise moved into a free slot of the new table exactly once and
        // the old allocation is released without dropping them.
        unsafe {
            let new_ctrl = new_layout.ctrl(new_alloc);
            let new_slots = new_layout.slots::<P::Slot>(new_alloc);
            let new_hashes = new_layout.hashes(new_alloc);

            for index in self.raw_iter() {
                let hash = *self.hash_ptr(index);
                let target = find_first_non_full(new_ctrl, new_capacity, self.group, hash, false);
                set_ctrl(new_ctrl, new_capacity, target, h2(hash));
                ptr::copy_nonoverlapping(self.slot_ptr(index), new_slots.add(target), 1);
                new_hashes.add(target).write(hash);
            }
        }

        let old_capacity = mem::replace(&mut self.capacity, new_capacity);
        let old_layout = mem::replace(&mut self.layout, new_layout);
        let old_alloc = mem::replace(&mut self.alloc, new_alloc);
        self.growth_left = capacity_to_growth(new_capacity) - self.populated;

        if old_capacity != 0 {
            // SAFETY: The old allocation was made with `old_layout` and holds
            // no live elements anymore.
            unsafe {
                dealloc(old_alloc.as_ptr(), old_layout.layout);
            }
        }

        Ok(())
    }

    /// Rebuilds the table in its current allocation, turning every tombstone
    /// back into an empty slot.
    fn rehash_in_place(&mut self) {
        debug_assert!(!is_small(self.capacity));
        let capacity = self.capacity;
        debug!(
            capacity,
            len = self.populated,
            tombstones = self.tombstones(),
            "rehashing hash table in place"
        );

        let ctrl = self.ctrl();
        // SAFETY: All offsets stay below `capacity + GROUP_WIDTH`. During the
        // rebuild, DELETED marks a slot that still holds an element waiting
        // to be placed, and every such element is placed exactly once: either
        // it stays, moves to an EMPTY slot, or swaps with another waiting
        // element which is then processed in its stead.
        unsafe {
            for index in 0..capacity {
                let byte = ctrl.add(index);
                *byte = if is_full(*byte) { DELETED } else { EMPTY };
            }
            ptr::copy_nonoverlapping(ctrl, ctrl.add(capacity + 1), NUM_CLONED_BYTES);

            let mut index = 0;
            while index < capacity {
                if !is_deleted(*ctrl.add(index)) {
                    index += 1;
                    continue;
                }

                let hash = *self.hash_ptr(index);
                let target = find_first_non_full(ctrl, capacity, self.group, hash, false);
                let seed = h1(hash);

                if probe_group_index(seed, capacity, target)
                    == probe_group_index(seed, capacity, index)
                {
                    set_ctrl(ctrl, capacity, index, h2(hash));
                    index += 1;
                    continue;
                }

                if is_empty(*ctrl.add(target)) {
                    set_ctrl(ctrl, capacity, target, h2(hash));
                    ptr::copy_nonoverlapping(self.slot_ptr(index), self.slot_ptr(target), 1);
                    self.hash_ptr(target).write(hash);
                    set_ctrl(ctrl, capacity, index, EMPTY);
                    index += 1;
                } else {
                    debug_assert!(is_deleted(*ctrl.add(target)));
                    set_ctrl(ctrl, capacity, target, h2(hash));
                    ptr::swap_nonoverlapping(self.slot_ptr(index), self.slot_ptr(target), 1);
                    ptr::swap_nonoverlapping(self.hash_ptr(index), self.hash_ptr(target), 1);
                }
            }
        }

        self.growth_left = capacity_to_growth(capacity) - self.populated;
    }

    /// Returns an iterator over all elements in the table. The order is
    /// unspecified.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::hash_table::HashTable;
    /// let mut table: HashTable<u32> = HashTable::new();
    /// for i in 0..10u32 {
    ///     let hash = u64::from(i).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ///     table.insert_unique(hash, i);
    /// }
    ///
    /// let mut all: Vec<u32> = table.iter().copied().collect();
    /// all.sort();
    /// assert_eq!(all, (0..10).collect::<Vec<_>>());
    /// ```
    pub fn iter(&self) -> Iter<'_, T, P> {
        Iter {
            table: self,
            // SAFETY: The iterator borrows the table.
            iter: unsafe { self.raw_iter() },
            remaining: self.populated,
        }
    }

    /// Returns an iterator over mutable references to all elements.
    ///
    /// Changing the part of an element its hash and equality depend on makes
    /// it unreachable.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, P> {
        IterMut {
            slots: self.slots(),
            // SAFETY: The iterator mutably borrows the table.
            iter: unsafe { self.raw_iter() },
            remaining: self.populated,
            _marker: PhantomData,
        }
    }

    /// Removes all elements and returns them as an iterator. The allocation
    /// is kept; elements not consumed are dropped with the iterator.
    pub fn drain(&mut self) -> Drain<'_, T, P> {
        let empty = self.empty_like();
        let table = mem::replace(self, empty);
        Drain {
            inner: table.into_iter(),
            orig: self,
        }
    }

    /// Removes every element for which `f` returns `true`, handing each one
    /// out as the returned iterator advances. Dropping the iterator finishes
    /// the pass.
    pub fn extract_if<F>(&mut self, f: F) -> ExtractIf<'_, T, P, F>
    where
        F: FnMut(&mut T) -> bool,
    {
        ExtractIf {
            // SAFETY: The iterator mutably borrows the table and only erases
            // slots it has already been handed.
            iter: unsafe { self.raw_iter() },
            table: self,
            f,
        }
    }

    /// Removes all elements, keeping the allocation.
    pub fn clear(&mut self) {
        struct ClearOnDrop<'a, T, P: SlotPolicy<T>>(&'a mut HashTable<T, P>);

        impl<T, P: SlotPolicy<T>> Drop for ClearOnDrop<'_, T, P> {
            fn drop(&mut self) {
                self.0.clear_no_drop();
            }
        }

        let guard = ClearOnDrop(self);
        // SAFETY: Full slots are initialized. The guard resets the control
        // bytes even if an element's destructor panics, leaking the rest
        // instead of dropping anything twice.
        unsafe {
            guard.0.drop_elements();
        }
    }

    /// Shrinks the allocation to the smallest capacity that holds the current
    /// elements, dropping all tombstones. An empty table releases its
    /// allocation entirely.
    pub fn shrink_to_fit(&mut self) {
        let target = if self.populated == 0 {
            0
        } else {
            match Self::capacity_for(self.populated, Fallibility::Infallible) {
                Ok(target) => target,
                Err(err) => unreachable!("{err}"),
            }
        };

        if target < self.capacity || (target == self.capacity && self.tombstones() > 0) {
            trace!(
                old_capacity = self.capacity,
                new_capacity = target,
                len = self.populated,
                "shrinking hash table"
            );
            infallible(self.resize(target, Fallibility::Infallible));
        }
    }

    /// Reserves room for at least `additional` more elements without
    /// further growth.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        if additional > self.growth_left {
            trace!(additional, growth_left = self.growth_left, "reserving hash table capacity");
            infallible(self.reserve_rehash(additional, Fallibility::Infallible));
        }
    }

    /// Fallible version of [`HashTable::reserve`]. On error the table is left
    /// unchanged and remains fully usable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::TryReserveError;
    /// # use swiss_table::hash_table::HashTable;
    /// let mut table: HashTable<u64> = HashTable::new();
    /// assert_eq!(
    ///     table.try_reserve(usize::MAX),
    ///     Err(TryReserveError::CapacityOverflow)
    /// );
    /// assert!(table.try_reserve(16).is_ok());
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        if additional <= self.growth_left {
            return Ok(());
        }

        self.reserve_rehash(additional, Fallibility::Fallible)
            .inspect_err(|err| {
                warn!(
                    %err,
                    additional,
                    len = self.populated,
                    "failed to reserve hash table capacity"
                )
            })
    }

    /// Finds an element by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_table::hash_table::HashTable;
    /// let mut table: HashTable<(u32, &str)> = HashTable::new();
    /// table.insert_unique(42, (1, "one"));
    ///
    /// assert_eq!(table.find(42, |e| e.0 == 1), Some(&(1, "one")));
    /// assert_eq!(table.find(42, |e| e.0 == 2), None);
    /// ```
    pub fn find(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&T> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { self.element(index) })
    }

    /// Finds an element by hash and equality predicate, returning a mutable
    /// reference.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&mut T> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { self.element_mut(index) })
    }

    /// Gets the entry for `hash` and `eq`, for in-place insertion or update.
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Entry<'_, T, P> {
        match self.find_index(hash, eq) {
            Some(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            None => Entry::Vacant(VacantEntry { table: self, hash }),
        }
    }

    /// Inserts `value` without checking whether an equal element is already
    /// present. Inserting a duplicate this way makes lookups return either
    /// copy.
    pub fn insert_unique(&mut self, hash: u64, value: T) -> &mut T {
        let slot = P::new_slot(value);
        let index = self.prepare_insert(hash);
        // SAFETY: `prepare_insert` returns a claimed, uninitialized slot.
        unsafe {
            self.slot_ptr(index).write(slot);
            self.element_mut(index)
        }
    }

    /// Removes and returns the element matching `hash` and `eq`.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<T> {
        self.extract(hash, eq).map(NodeHandle::into_value)
    }

    /// Removes the element matching `hash` and `eq` and hands out its slot
    /// storage. For [`Node`](crate::Node) tables the element keeps its heap
    /// address and can be moved into another table through
    /// [`HashTable::insert_node`].
    pub fn extract(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<NodeHandle<T, P>> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(NodeHandle::from_slot(unsafe { self.take_at(index) }))
    }

    /// Inserts a node previously extracted from a table with the same policy.
    ///
    /// If an element equal to the node's value (according to `eq`) is already
    /// present, nothing is inserted and the node is handed back in
    /// [`InsertReturn::node`], with `position` pointing at the element that
    /// blocked it.
    pub fn insert_node(
        &mut self,
        hash: u64,
        node: NodeHandle<T, P>,
        eq: impl Fn(&T, &T) -> bool,
    ) -> InsertReturn<'_, T, P> {
        if let Some(index) = self.find_index(hash, |existing| eq(existing, node.value())) {
            return InsertReturn {
                // SAFETY: `find_index` only returns full slots.
                position: unsafe { self.element_mut(index) },
                inserted: false,
                node: Some(node),
            };
        }

        let index = self.prepare_insert(hash);
        // SAFETY: `prepare_insert` returns a claimed, uninitialized slot.
        unsafe {
            self.slot_ptr(index).write(node.into_slot());
            InsertReturn {
                position: self.element_mut(index),
                inserted: true,
                node: None,
            }
        }
    }

    /// Moves every element of `other` that has no equal element in `self`
    /// into `self`. Elements whose keys are already present stay in `other`.
    ///
    /// `hasher` computes the hash `self` files an element under, so the two
    /// tables may use different hash functions. Slots are moved, so node
    /// addresses are preserved.
    pub fn merge(
        &mut self,
        other: &mut Self,
        hasher: impl Fn(&T) -> u64,
        eq: impl Fn(&T, &T) -> bool,
    ) {
        if other.populated == 0 {
            return;
        }

        // SAFETY: `other` is exclusively borrowed for the whole pass and only
        // slots already yielded are erased.
        unsafe {
            for index in other.raw_iter() {
                let candidate = other.element(index);
                let hash = hasher(candidate);
                if self.find_index(hash, |existing| eq(existing, candidate)).is_some() {
                    continue;
                }

                let slot = other.take_at(index);
                let target = self.prepare_insert(hash);
                self.slot_ptr(target).write(slot);
            }
        }
    }

    /// Keeps only the elements for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&mut T) -> bool) {
        self.erase_if(|element| !f(element));
    }

    /// Removes every element for which `pred` returns `true` and returns how
    /// many were removed. Each element is visited once.
    pub fn erase_if(&mut self, mut pred: impl FnMut(&mut T) -> bool) -> usize {
        if self.populated == 0 {
            return 0;
        }

        let mut removed = 0;
        // SAFETY: Only slots already yielded are erased, and each erased slot
        // is dropped after its control byte is cleared.
        unsafe {
            for index in self.raw_iter() {
                if pred(self.element_mut(index)) {
                    drop(self.take_at(index));
                    removed += 1;
                }
            }
        }

        removed
    }

    /// Returns a histogram of probe lengths. Bin `n` counts the elements
    /// found in the `n + 1`-th group of their probe sequence.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        let mut hist = alloc::vec::Vec::new();
        // SAFETY: Full slots have initialized stored hashes.
        unsafe {
            for index in self.raw_iter() {
                let hash = *self.hash_ptr(index);
                let probes = self
                    .probe_seq(hash)
                    .position(|pos| (index.wrapping_sub(pos) & self.capacity) < GROUP_WIDTH)
                    .unwrap_or(0);
                if hist.len() <= probes {
                    hist.resize(probes + 1, 0);
                }
                hist[probes] += 1;
            }
        }
        hist
    }

    /// Returns occupancy statistics.
    #[cfg(any(test, feature = "stats"))]
    pub fn stats(&self) -> TableStats {
        let mut tombstones = 0;
        let mut base = 0;
        while base < self.capacity {
            // SAFETY: `base < capacity`.
            let deleted = unsafe { self.group.match_deleted(self.ctrl().add(base)) };
            tombstones += deleted.truncate(self.capacity - base).count();
            base += GROUP_WIDTH;
        }
        debug_assert_eq!(tombstones, self.tombstones());

        TableStats {
            len: self.populated,
            capacity: self.capacity,
            growth_left: self.growth_left,
            tombstones,
            load_factor: if self.capacity == 0 {
                0.0
            } else {
                self.populated as f64 / self.capacity as f64
            },
            total_bytes: self.layout.layout.size(),
            max_probe_length: self.probe_histogram().len(),
        }
    }
}

/// The result of [`HashTable::insert_node`].
pub struct InsertReturn<'a, T, P: SlotPolicy<T> = Inline> {
    /// The element now in the table with the node's key: the inserted value,
    /// or the existing one that blocked the insertion.
    pub position: &'a mut T,
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

/// A view into a single entry in the table, which may be vacant or occupied.
///
/// Constructed by [`HashTable::entry`].
///
/// # Examples
///
/// ```rust
/// # use swiss_table::hash_table::Entry;
/// # use swiss_table::hash_table::HashTable;
/// let mut table: HashTable<(&str, u32)> = HashTable::new();
/// let hash = 7;
///
/// for _ in 0..3 {
///     table
///         .entry(hash, |e| e.0 == "hits")
///         .and_modify(|e| e.1 += 1)
///         .or_insert(("hits", 1));
/// }
///
/// assert_eq!(table.find(hash, |e| e.0 == "hits"), Some(&("hits", 3)));
/// ```
pub enum Entry<'a, T, P: SlotPolicy<T> = Inline> {
    /// An element matching the predicate is present.
    Occupied(OccupiedEntry<'a, T, P>),
    /// No element matches; inserting claims a slot for the hash.
    Vacant(VacantEntry<'a, T, P>),
}

impl<'a, T, P: SlotPolicy<T>> Entry<'a, T, P> {
    /// Inserts `default` if vacant and returns a mutable reference to the
    /// element either way.
    pub fn or_insert(self, default: T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if vacant and returns a mutable
    /// reference to the element either way.
    pub fn or_insert_with(self, default: impl FnOnce() -> T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert_with(default),
        }
    }

    /// Runs `f` on the element if the entry is occupied.
    pub fn and_modify(self, f: impl FnOnce(&mut T)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Inserts `T::default()` if vacant.
    pub fn or_default(self) -> &'a mut T
    where
        T: Default,
    {
        self.or_insert_with(T::default)
    }
}

/// A vacant entry, holding the hash it was looked up with.
pub struct VacantEntry<'a, T, P: SlotPolicy<T> = Inline> {
    table: &'a mut HashTable<T, P>,
    hash: u64,
}

impl<'a, T, P: SlotPolicy<T>> VacantEntry<'a, T, P> {
    /// The hash this entry was created for.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Inserts `value`. The value must match the predicate the entry was
    /// looked up with.
    pub fn insert(self, value: T) -> &'a mut T {
        self.insert_slot(P::new_slot(value))
    }

    /// Inserts the value produced by `f`.
    pub fn insert_with(self, f: impl FnOnce() -> T) -> &'a mut T {
        self.insert(f())
    }

    /// Inserts the value produced by `f`, or leaves the table untouched if
    /// `f` fails.
    pub fn try_insert_with<E>(self, f: impl FnOnce() -> Result<T, E>) -> Result<&'a mut T, E> {
        let value = f()?;
        Ok(self.insert(value))
    }

    /// Inserts a detached node.
    pub fn insert_node(self, node: NodeHandle<T, P>) -> &'a mut T {
        self.insert_slot(node.into_slot())
    }

    fn insert_slot(self, slot: P::Slot) -> &'a mut T {
        let index = self.table.prepare_insert(self.hash);
        // SAFETY: `prepare_insert` returns a claimed, uninitialized slot.
        unsafe {
            self.table.slot_ptr(index).write(slot);
            P::get_mut(&mut *self.table.slot_ptr(index))
        }
    }
}

/// An occupied entry.
pub struct OccupiedEntry<'a, T, P: SlotPolicy<T> = Inline> {
    table: &'a mut HashTable<T, P>,
    index: usize,
}

impl<'a, T, P: SlotPolicy<T>> OccupiedEntry<'a, T, P> {
    /// The element.
    pub fn get(&self) -> &T {
        // SAFETY: The entry points at a full slot.
        unsafe { self.table.element(self.index) }
    }

    /// The element, mutably.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: The entry points at a full slot.
        unsafe { self.table.element_mut(self.index) }
    }

    /// Converts the entry into a mutable reference bound to the table.
    pub fn into_mut(self) -> &'a mut T {
        // SAFETY: The entry points at a full slot.
        unsafe { P::get_mut(&mut *self.table.slot_ptr(self.index)) }
    }

    /// Removes the element and returns it.
    pub fn remove(self) -> T {
        self.remove_node().into_value()
    }

    /// Removes the element and returns its node.
    pub fn remove_node(self) -> NodeHandle<T, P> {
        // SAFETY: The entry points at a full slot.
        NodeHandle::from_slot(unsafe { self.table.take_at(self.index) })
    }
}

/// An iterator over the elements of a [`HashTable`].
pub struct Iter<'a, T, P: SlotPolicy<T> = Inline> {
    table: &'a HashTable<T, P>,
    iter: RawIter,
    remaining: usize,
}

impl<T, P: SlotPolicy<T>> Clone for Iter<'_, T, P> {
    fn clone(&self) -> Self {
        Iter {
            table: self.table,
            iter: self.iter.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, T, P: SlotPolicy<T>> Iterator for Iter<'a, T, P> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        let index = self.iter.next()?;
        self.remaining -= 1;
        // SAFETY: `RawIter` only yields full slots of the borrowed table.
        Some(unsafe { self.table.element(index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for Iter<'_, T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for Iter<'_, T, P> {}

/// A mutable iterator over the elements of a [`HashTable`].
pub struct IterMut<'a, T, P: SlotPolicy<T> = Inline> {
    slots: *mut P::Slot,
    iter: RawIter,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

// SAFETY: Equivalent to a `&mut [T]`.
unsafe impl<T: Send, P: SlotPolicy<T>> Send for IterMut<'_, T, P> {}

// SAFETY: Equivalent to a `&mut [T]`.
unsafe impl<T: Sync, P: SlotPolicy<T>> Sync for IterMut<'_, T, P> {}

impl<'a, T, P: SlotPolicy<T>> Iterator for IterMut<'a, T, P> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        let index = self.iter.next()?;
        self.remaining -= 1;
        // SAFETY: `RawIter` yields each full slot of the mutably borrowed
        // table once, so the references never alias. The element outlives
        // the temporary slot borrow for as long as the table is borrowed.
        Some(unsafe { &mut *(P::get_mut(&mut *self.slots.add(index)) as *mut T) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for IterMut<'_, T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for IterMut<'_, T, P> {}

/// An owning iterator over the elements of a [`HashTable`].
pub struct IntoIter<T, P: SlotPolicy<T> = Inline> {
    table: HashTable<T, P>,
    iter: RawIter,
}

impl<T, P: SlotPolicy<T>> Iterator for IntoIter<T, P> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let index = self.iter.next()?;
        // SAFETY: `RawIter` yields each full slot once. Clearing its control
        // byte hands ownership of the slot to this call. Tombstone accounting
        // is irrelevant for a table that is being consumed.
        unsafe {
            set_ctrl(self.table.ctrl(), self.table.capacity, index, EMPTY);
            self.table.populated -= 1;
            Some(P::into_value(self.table.slot_ptr(index).read()))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for IntoIter<T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for IntoIter<T, P> {}

impl<T, P: SlotPolicy<T>> IntoIterator for HashTable<T, P> {
    type IntoIter = IntoIter<T, P>;
    type Item = T;

    fn into_iter(self) -> IntoIter<T, P> {
        // SAFETY: The iterator owns the table, so the allocation outlives it.
        let iter = unsafe { self.raw_iter() };
        IntoIter { table: self, iter }
    }
}

impl<'a, T, P: SlotPolicy<T>> IntoIterator for &'a HashTable<T, P> {
    type IntoIter = Iter<'a, T, P>;
    type Item = &'a T;

    fn into_iter(self) -> Iter<'a, T, P> {
        self.iter()
    }
}

impl<'a, T, P: SlotPolicy<T>> IntoIterator for &'a mut HashTable<T, P> {
    type IntoIter = IterMut<'a, T, P>;
    type Item = &'a mut T;

    fn into_iter(self) -> IterMut<'a, T, P> {
        self.iter_mut()
    }
}

/// A draining iterator over the elements of a [`HashTable`].
///
/// The table is empty while the iterator exists and gets its allocation back,
/// cleared, when the iterator is dropped.
pub struct Drain<'a, T, P: SlotPolicy<T> = Inline> {
    inner: IntoIter<T, P>,
    orig: &'a mut HashTable<T, P>,
}

impl<T, P: SlotPolicy<T>> Drop for Drain<'_, T, P> {
    fn drop(&mut self) {
        for _ in &mut self.inner {}
        let table = &mut self.inner.table;
        table.clear_no_drop();
        mem::swap(self.orig, table);
    }
}

impl<T, P: SlotPolicy<T>> Iterator for Drain<'_, T, P> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, P: SlotPolicy<T>> ExactSizeIterator for Drain<'_, T, P> {}
impl<T, P: SlotPolicy<T>> FusedIterator for Drain<'_, T, P> {}

/// An iterator removing the elements matching a predicate. See
/// [`HashTable::extract_if`].
pub struct ExtractIf<'a, T, P, F>
where
    P: SlotPolicy<T>,
    F: FnMut(&mut T) -> bool,
{
    table: &'a mut HashTable<T, P>,
    iter: RawIter,
    f: F,
}

impl<T, P, F> Iterator for ExtractIf<'_, T, P, F>
where
    P: SlotPolicy<T>,
    F: FnMut(&mut T) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for index in self.iter.by_ref() {
            // SAFETY: `RawIter` yields each full slot once, and only the slot
            // just yielded is erased.
            unsafe {
                if (self.f)(self.table.element_mut(index)) {
                    return Some(P::into_value(self.table.take_at(index)));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.table.populated))
    }
}

impl<T, P, F> Drop for ExtractIf<'_, T, P, F>
where
    P: SlotPolicy<T>,
    F: FnMut(&mut T) -> bool,
{
    fn drop(&mut self) {
        self.for_each(drop);
    }
}
