//! Record fixtures and seeded stores.
//!
//! Every fixture keys records by [`KEY_FIELD`] and creates stores that
//! enforce uniqueness on it, like a real target collection with a unique
//! index on the business key.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recsync_store::{BusinessKey, MemoryStore, Record};
use std::sync::Arc;

/// Business key field used by every fixture.
pub const KEY_FIELD: &str = "name";

/// The three companies every demo source starts with, as `(name, owner)`.
pub const COMPANIES: [(&str, &str); 3] = [("GE", "test"), ("Exxon", "test2"), ("Google", "test3")];

const SECTORS: [&str; 6] = ["energy", "retail", "software", "finance", "transport", "health"];

/// Builds a company record.
pub fn company(name: &str, owner: &str) -> Record {
    Record::new()
        .with_field(KEY_FIELD, name)
        .with_field("owner", owner)
}

/// Name of the `i`-th generated company. Zero-padded so names sort in
/// insertion order.
pub fn generated_name(i: usize) -> String {
    format!("company-{i:05}")
}

/// Builds the `i`-th generated company.
pub fn generated_company(i: usize) -> Record {
    company(&generated_name(i), &format!("owner-{i}"))
}

/// Creates an empty store with a unique index on [`KEY_FIELD`].
pub fn empty_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_unique_key(KEY_FIELD))
}

/// Creates a store holding the [`COMPANIES`].
pub fn companies_store() -> Arc<MemoryStore> {
    let store = empty_store();
    for (name, owner) in COMPANIES {
        store.put(company(name, owner)).expect("Failed to seed company");
    }
    store
}

/// Creates a store holding `n` generated companies.
pub fn seeded_store(n: usize) -> Arc<MemoryStore> {
    let store = empty_store();
    for i in 0..n {
        store
            .put(generated_company(i))
            .expect("Failed to seed generated company");
    }
    store
}

/// Builds `n` companies with random owners, sectors and revenue.
///
/// The same `seed` always yields the same records.
pub fn random_companies(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            generated_company(i)
                .with_field("owner", format!("owner-{}", rng.gen_range(0..1000)))
                .with_field("sector", SECTORS[rng.gen_range(0..SECTORS.len())])
                .with_field("revenue", rng.gen_range(1_000u64..10_000_000))
        })
        .collect()
}

/// Returns the keys of `store` in sorted order.
pub fn sorted_keys(store: &MemoryStore) -> Vec<BusinessKey> {
    let mut keys = store.keys(KEY_FIELD);
    keys.sort();
    keys
}

/// Returns true if every record in `source` exists in `target` with the same
/// field values. Timestamps are ignored.
pub fn converged(source: &MemoryStore, target: &MemoryStore) -> bool {
    let source_records = source.records();
    source_records.len() == target.len()
        && source_records.iter().all(|record| {
            record
                .business_key(KEY_FIELD)
                .and_then(|key| target.get(KEY_FIELD, &key))
                .is_some_and(|copy| copy.fields == record.fields)
        })
}
