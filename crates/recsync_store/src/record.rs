//! Record and business key types.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The value that identifies a record as "the same entity" in source and target.
///
/// Keys are unique within a store at any instant but may be reused after a
/// delete. A key is either a string or a number; the two never compare equal,
/// so `"42"` and `42` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessKey {
    text: String,
    numeric: bool,
}

impl BusinessKey {
    /// Creates a string key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            text: key.into(),
            numeric: false,
        }
    }

    /// Creates a numeric key.
    pub fn number(n: impl Into<Number>) -> Self {
        Self {
            text: n.into().to_string(),
            numeric: true,
        }
    }

    /// Reads a key from a JSON value. Strings and numbers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::new(s.as_str())),
            Value::Number(n) => Some(Self::number(n.clone())),
            _ => None,
        }
    }

    /// Returns the key rendered as text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the key was read from a number.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Returns the key as a JSON value, for building filters.
    pub fn to_value(&self) -> Value {
        if self.numeric {
            if let Ok(n) = self.text.parse::<Number>() {
                return Value::Number(n);
            }
        }
        Value::String(self.text.clone())
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for BusinessKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BusinessKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for BusinessKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BusinessKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| de::Error::custom("business key must be a string or a number"))
    }
}

/// A document: an opaque mapping from field name to value.
///
/// Timestamps are assigned by the store that holds the record and are not
/// part of the field map, so they never travel in a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Field values.
    pub fields: BTreeMap<String, Value>,
    /// When the holding store first saw this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the holding store last modified this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets a field in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Extracts the business key stored under `key_field`.
    ///
    /// Strings and numbers qualify; a missing field or any other JSON type
    /// yields `None`.
    pub fn business_key(&self, key_field: &str) -> Option<BusinessKey> {
        BusinessKey::from_value(self.fields.get(key_field)?)
    }
}
