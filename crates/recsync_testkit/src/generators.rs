//! Property-based test generators using proptest.

use crate::fixtures::{company, KEY_FIELD};
use proptest::prelude::*;
use recsync_store::{BusinessKey, Record};
use std::collections::BTreeSet;

/// Strategy for business keys.
pub fn business_key_strategy() -> impl Strategy<Value = BusinessKey> {
    prop::string::string_regex("[A-Z][a-z]{1,8}( [A-Z][a-z]{1,8})?")
        .expect("Invalid regex")
        .prop_map(BusinessKey::new)
}

/// Strategy for valid batch sizes.
pub fn batch_size_strategy() -> impl Strategy<Value = u64> {
    1u64..=64
}

/// Strategy for up to `max` company records with distinct keys.
pub fn companies_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_set(business_key_strategy(), 0..=max).prop_map(|keys| {
        keys.into_iter()
            .enumerate()
            .map(|(i, key)| {
                company(key.as_str(), &format!("owner-{i}")).with_field("rank", i as u64)
            })
            .collect()
    })
}

/// Strategy for a touch sequence over `keys`: indices with repeats.
pub fn touches_strategy(keys: usize, max_touches: usize) -> impl Strategy<Value = Vec<usize>> {
    let upper = keys.max(1);
    prop::collection::vec(0..upper, 0..=max_touches)
}

/// Distinct keys among `records`.
pub fn distinct_keys(records: &[Record]) -> BTreeSet<BusinessKey> {
    records
        .iter()
        .filter_map(|r| r.business_key(KEY_FIELD))
        .collect()
}
