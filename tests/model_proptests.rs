// Model-based property tests.
//
// Every map and set flavor is driven by a random sequence of operations and
// compared after each step against std's HashMap/HashSet.
//  - Keys come from a small range so that inserts, hits, misses and removals
//    all happen often.
//  - `Degraded` hashers keep only a few bits of the hash, forcing long probe
//    chains, shared tags and tombstones inside shared groups.
use std::collections::HashMap as StdMap;
use std::collections::HashSet as StdSet;
use std::hash::BuildHasher;
use std::hash::Hasher;

use proptest::prelude::*;
use siphasher::sip::SipHasher;
use swiss_table::HashMap;
use swiss_table::HashSet;
use swiss_table::Inline;
use swiss_table::Node;
use swiss_table::SlotPolicy;

/// Keeps the low `BITS` bits of a SipHash.
#[derive(Clone, Default)]
struct Degraded<const BITS: u32>;

struct DegradedHasher<const BITS: u32>(SipHasher);

impl<const BITS: u32> Hasher for DegradedHasher<BITS> {
    fn finish(&self) -> u64 {
        self.0.finish() & ((1u64 << BITS) - 1)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }
}

impl<const BITS: u32> BuildHasher for Degraded<BITS> {
    type Hasher = DegradedHasher<BITS>;

    fn build_hasher(&self) -> Self::Hasher {
        DegradedHasher(SipHasher::new())
    }
}

#[derive(Clone, Debug)]
enum MapOp {
    Insert(u16, u32),
    EntryOrInsert(u16, u32),
    Remove(u16),
    Get(u16),
    EraseIf(u16),
    ExtractReinsert(u16),
    Reserve(u8),
    ShrinkToFit,
    Clear,
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        8 => (0u16..256, any::<u32>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        4 => (0u16..256, any::<u32>()).prop_map(|(k, v)| MapOp::EntryOrInsert(k, v)),
        6 => (0u16..256).prop_map(MapOp::Remove),
        4 => (0u16..256).prop_map(MapOp::Get),
        1 => (1u16..16).prop_map(MapOp::EraseIf),
        2 => (0u16..256).prop_map(MapOp::ExtractReinsert),
        1 => any::<u8>().prop_map(MapOp::Reserve),
        1 => Just(MapOp::ShrinkToFit),
        1 => Just(MapOp::Clear),
    ]
}

fn run_map_model<S, P>(ops: Vec<MapOp>) -> Result<(), TestCaseError>
where
    S: BuildHasher + Default,
    P: SlotPolicy<(u16, u32)>,
{
    let mut map: HashMap<u16, u32, S, P> = HashMap::new();
    let mut model: StdMap<u16, u32> = StdMap::new();

    for op in ops {
        match op {
            MapOp::Insert(k, v) => {
                prop_assert_eq!(map.insert(k, v), model.insert(k, v));
            }
            MapOp::EntryOrInsert(k, v) => {
                let got = *map.entry(k).or_insert(v);
                let want = *model.entry(k).or_insert(v);
                prop_assert_eq!(got, want);
            }
            MapOp::Remove(k) => {
                prop_assert_eq!(map.remove(&k), model.remove(&k));
            }
            MapOp::Get(k) => {
                prop_assert_eq!(map.get(&k), model.get(&k));
            }
            MapOp::EraseIf(m) => {
                let before = model.len();
                model.retain(|k, _| k % m != 0);
                prop_assert_eq!(map.erase_if(|k, _| k % m == 0), before - model.len());
            }
            MapOp::ExtractReinsert(k) => match map.extract(&k) {
                Some(node) => {
                    prop_assert_eq!(node.key(), &k);
                    prop_assert_eq!(Some(node.mapped()), model.get(&k));
                    let ret = map.insert_node(node);
                    prop_assert!(ret.inserted);
                }
                None => {
                    prop_assert!(!model.contains_key(&k));
                }
            },
            MapOp::Reserve(n) => {
                map.reserve(n as usize);
                prop_assert!(map.capacity() >= map.len() + n as usize);
            }
            MapOp::ShrinkToFit => map.shrink_to_fit(),
            MapOp::Clear => {
                map.clear();
                model.clear();
            }
        }
        prop_assert_eq!(map.len(), model.len());
        prop_assert!(map.capacity() >= map.len());
    }

    let mut items: Vec<(u16, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    let mut expected: Vec<(u16, u32)> = model.into_iter().collect();
    items.sort_unstable();
    expected.sort_unstable();
    prop_assert_eq!(items, expected);
    Ok(())
}

#[derive(Clone, Debug)]
enum SetOp {
    Insert(u16),
    Remove(u16),
    Contains(u16),
    Retain(u16),
}

fn set_op() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        6 => (0u16..512).prop_map(SetOp::Insert),
        4 => (0u16..512).prop_map(SetOp::Remove),
        4 => (0u16..512).prop_map(SetOp::Contains),
        1 => (2u16..8).prop_map(SetOp::Retain),
    ]
}

fn run_set_model<S, P>(ops: Vec<SetOp>) -> Result<(), TestCaseError>
where
    S: BuildHasher + Default,
    P: SlotPolicy<u16>,
{
    let mut set: HashSet<u16, S, P> = HashSet::new();
    let mut model: StdSet<u16> = StdSet::new();

    for op in ops {
        match op {
            SetOp::Insert(v) => {
                prop_assert_eq!(set.insert(v), model.insert(v));
            }
            SetOp::Remove(v) => {
                prop_assert_eq!(set.remove(&v), model.remove(&v));
            }
            SetOp::Contains(v) => {
                prop_assert_eq!(set.contains(&v), model.contains(&v));
            }
            SetOp::Retain(m) => {
                set.retain(|v| v % m != 0);
                model.retain(|v| v % m != 0);
            }
        }
        prop_assert_eq!(set.len(), model.len());
    }

    let mut items: Vec<u16> = set.into_iter().collect();
    let mut expected: Vec<u16> = model.into_iter().collect();
    items.sort_unstable();
    expected.sort_unstable();
    prop_assert_eq!(items, expected);
    Ok(())
}

type Sip = std::hash::BuildHasherDefault<SipHasher>;

proptest! {
    #[test]
    fn flat_map_matches_std(ops in proptest::collection::vec(map_op(), 1..400)) {
        run_map_model::<Sip, Inline>(ops)?;
    }

    #[test]
    fn node_map_matches_std(ops in proptest::collection::vec(map_op(), 1..400)) {
        run_map_model::<Sip, Node>(ops)?;
    }

    #[test]
    fn flat_map_with_colliding_hashes(ops in proptest::collection::vec(map_op(), 1..400)) {
        run_map_model::<Degraded<10>, Inline>(ops)?;
    }

    #[test]
    fn node_map_with_constant_hash(ops in proptest::collection::vec(map_op(), 1..200)) {
        run_map_model::<Degraded<0>, Node>(ops)?;
    }

    #[test]
    fn flat_set_matches_std(ops in proptest::collection::vec(set_op(), 1..600)) {
        run_set_model::<Sip, Inline>(ops)?;
    }

    #[test]
    fn node_set_with_colliding_hashes(ops in proptest::collection::vec(set_op(), 1..600)) {
        run_set_model::<Degraded<9>, Node>(ops)?;
    }

    #[test]
    fn merge_partitions_keys(
        left in proptest::collection::hash_set(0u32..1000, 0..200),
        right in proptest::collection::hash_set(0u32..1000, 0..200),
    ) {
        let mut a: HashSet<u32, Sip> = left.iter().copied().collect();
        let mut b: HashSet<u32, Sip> = right.iter().copied().collect();
        a.merge(&mut b);

        let union: StdSet<u32> = left.union(&right).copied().collect();
        let overlap: StdSet<u32> = left.intersection(&right).copied().collect();
        prop_assert_eq!(a.iter().copied().collect::<StdSet<_>>(), union);
        prop_assert_eq!(b.iter().copied().collect::<StdSet<_>>(), overlap);
    }
}
