//! Filters, paginated queries and `$set` patches.

use crate::record::{BusinessKey, Record};
use serde_json::Value;
use std::collections::BTreeMap;

/// Selects records by field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record.
    All,
    /// Matches records whose `field` equals `value`.
    Eq {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Matches records whose `field` equals any of `values`.
    In {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
}

impl Filter {
    /// Matches the single record carrying `key` in `key_field`.
    pub fn key(key_field: &str, key: &BusinessKey) -> Self {
        Filter::Eq {
            field: key_field.to_string(),
            value: key.to_value(),
        }
    }

    /// Matches records carrying any of `keys` in `key_field`.
    pub fn keys<'a>(key_field: &str, keys: impl IntoIterator<Item = &'a BusinessKey>) -> Self {
        Filter::In {
            field: key_field.to_string(),
            values: keys.into_iter().map(BusinessKey::to_value).collect(),
        }
    }

    /// Returns true if `record` satisfies this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => record.get(field) == Some(value),
            Filter::In { field, values } => record
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

/// A `find` request: a filter plus `skip`/`limit` pagination modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Which records to return.
    pub filter: Filter,
    /// Number of matching records to skip.
    pub skip: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
}

impl Query {
    /// Creates a query over every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a query with the given filter.
    pub fn filter(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Skips the first `n` matching records.
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` records.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }
}

/// A partial update that overwrites the listed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Fields to set.
    pub set: BTreeMap<String, Value>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to set, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// A patch that sets every field of `record`.
    pub fn from_record(record: &Record) -> Self {
        Self {
            set: record.fields.clone(),
        }
    }

    /// Applies the patch to `record`.
    pub fn apply(&self, record: &mut Record) {
        for (field, value) in &self.set {
            record.fields.insert(field.clone(), value.clone());
        }
    }

    /// Returns true if the patch sets nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(name: &str, owner: &str) -> Record {
        Record::new().with_field("name", name).with_field("owner", owner)
    }

    #[test]
    fn filter_all_matches_everything() {
        assert!(Filter::All.matches(&company("GE", "test")));
        assert!(Filter::All.matches(&Record::new()));
    }

    #[test]
    fn filter_key_matches_only_key() {
        let filter = Filter::key("name", &BusinessKey::new("GE"));
        assert!(filter.matches(&company("GE", "test")));
        assert!(!filter.matches(&company("Exxon", "test")));
        assert!(!filter.matches(&Record::new()));
    }

    #[test]
    fn filter_keys_matches_set() {
        let keys = [BusinessKey::new("GE"), BusinessKey::new("Google")];
        let filter = Filter::keys("name", keys.iter());
        assert!(filter.matches(&company("Google", "test3")));
        assert!(!filter.matches(&company("Exxon", "test2")));
    }

    #[test]
    fn query_builder() {
        let query = Query::all().skip(5).limit(10);
        assert_eq!(query.filter, Filter::All);
        assert_eq!(query.skip, Some(5));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn patch_overwrites_listed_fields_only() {
        let mut record = company("GE", "test").with_field("amount", 1_000_000);
        Patch::new().with("owner", "test4").apply(&mut record);

        assert_eq!(record.get("owner"), Some(&Value::from("test4")));
        assert_eq!(record.get("amount"), Some(&Value::from(1_000_000)));
    }

    #[test]
    fn patch_from_record_copies_fields() {
        let record = company("GE", "test");
        let patch = Patch::from_record(&record);
        assert_eq!(patch.set, record.fields);
        assert!(!patch.is_empty());
    }
}
