use std::hash::BuildHasher;

use clap::Parser;
use siphasher::sip::SipHasher;
use swiss_table::GroupKind;
use swiss_table::HashTable;
use swiss_table::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Fraction of the filled values to erase and reinsert as fresh keys.
    #[arg(short = 'r', long = "churn", default_value_t = 0.25)]
    churn: f64,

    /// Use the portable group matcher instead of the detected one.
    #[arg(long)]
    portable: bool,
}

#[derive(Default)]
struct SipBuilder;

impl BuildHasher for SipBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> SipHasher {
        SipHasher::new()
    }
}

fn insert(table: &mut HashTable<u64>, hash: u64, value: u64) {
    match table.entry(hash, |&v| v == value) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(_) => panic!("value already exists in table: {value}"),
    }
}

fn main() {
    let args = Args::parse();
    let hasher = SipBuilder;

    let mut table: HashTable<u64> = HashTable::with_capacity(args.target_capacity);
    if args.portable {
        table = table.with_group_kind(GroupKind::Portable);
    }

    println!(
        "Created table for {} values: {} slots, {} group matcher",
        args.target_capacity,
        table.capacity(),
        match table.group_kind() {
            GroupKind::Portable => "portable",
            GroupKind::Sse2 => "sse2",
        }
    );

    let fill = table.growth_left() as u64;
    for value in 0..fill {
        insert(&mut table, hasher.hash_one(value), value);
    }
    println!("Filled with {} values", table.len());
    table.stats().print();

    let churned = (fill as f64 * args.churn.clamp(0.0, 1.0)) as u64;
    let erased = table.erase_if(|v| *v < churned);
    for value in fill..fill + erased as u64 {
        insert(&mut table, hasher.hash_one(value), value);
    }
    println!("\nErased and reinserted {erased} values");
    table.stats().print();

    println!("\nProbe length histogram (groups visited):");
    for (bin, count) in table.probe_histogram().iter().enumerate() {
        if *count > 0 {
            println!("  {:>3}: {count}", bin + 1);
        }
    }
}
