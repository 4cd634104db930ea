//! CLI command implementations.

pub mod demo;
pub mod full;
pub mod run;

use rand::seq::SliceRandom;
use rand::Rng;
use recsync_store::{BusinessKey, MemoryStore, Record};
use std::sync::Arc;

/// Companies every seeded source starts with, as `(name, owner)`.
const COMPANIES: [(&str, &str); 3] = [("GE", "test"), ("Exxon", "test2"), ("Google", "test3")];

const SECTORS: [&str; 6] = ["energy", "retail", "software", "finance", "transport", "health"];

/// Creates a source holding `n` companies keyed on `key_field`: the three
/// fixed ones first, then random ones.
pub fn seed_source(key_field: &str, n: usize) -> Result<Arc<MemoryStore>, Box<dyn std::error::Error>> {
    let store = MemoryStore::with_unique_key(key_field);
    let mut rng = rand::thread_rng();

    for (name, owner) in COMPANIES.iter().take(n) {
        store.put(
            Record::new()
                .with_field(key_field, *name)
                .with_field("owner", *owner),
        )?;
    }
    for i in COMPANIES.len()..n {
        store.put(
            Record::new()
                .with_field(key_field, format!("company-{i:05}"))
                .with_field("owner", format!("owner-{}", rng.gen_range(0..1000)))
                .with_field("sector", SECTORS[rng.gen_range(0..SECTORS.len())])
                .with_field("revenue", rng.gen_range(1_000u64..10_000_000)),
        )?;
    }

    Ok(Arc::new(store))
}

/// Creates an empty target with a unique index on `key_field`.
pub fn empty_target(key_field: &str) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_unique_key(key_field))
}

/// Gives one random record a new owner and returns its key.
pub fn mutate_random(source: &MemoryStore, key_field: &str) -> Option<BusinessKey> {
    let keys = source.keys(key_field);
    let mut rng = rand::thread_rng();
    let key = keys.choose(&mut rng)?.clone();
    let owner = format!("owner-{}", rng.gen_range(0..1000));
    source
        .set_field(key_field, &key, "owner", owner)
        .then_some(key)
}
