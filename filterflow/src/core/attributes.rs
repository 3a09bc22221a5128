//! Attribute bags and declared attribute schemas.

use crate::errors::AttributeError;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// An open, named extension map carried by every packet.
///
/// Lookups are fail-fast: a missing name is an [`AttributeError`], never a
/// silent default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    data: HashMap<String, Value>,
}

impl AttributeBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, Value>) -> Self {
        Self { data }
    }

    /// Gets a value, failing if the name is absent.
    pub fn get(&self, name: &str) -> Result<&Value, AttributeError> {
        self.data.get(name).ok_or_else(|| AttributeError::missing(name))
    }

    /// Gets a value if present.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Checks if a name exists.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// Sets a value, overwriting any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// Sets a value only if the name is not yet present.
    pub fn set_new(&mut self, name: impl Into<String>, value: Value) -> Result<(), AttributeError> {
        let name = name.into();
        if self.data.contains_key(&name) {
            return Err(AttributeError::AlreadySet { name });
        }
        self.data.insert(name, value);
        Ok(())
    }

    /// Removes a value, returning it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.data.remove(name)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns all names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        self.data.clone()
    }
}

/// The packet attributes a filter declares it reads and writes.
///
/// Declared schemas are checked by [`crate::filter::FilterContext::read`] and
/// [`crate::filter::FilterContext::write`]; filters that do not declare one
/// keep open access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
}

impl AttributeSchema {
    /// Creates an empty schema, which rejects every name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute the filter reads.
    #[must_use]
    pub fn reads(mut self, name: impl Into<String>) -> Self {
        self.reads.insert(name.into());
        self
    }

    /// Declares an attribute the filter writes.
    #[must_use]
    pub fn writes(mut self, name: impl Into<String>) -> Self {
        self.writes.insert(name.into());
        self
    }

    /// Returns true if reading `name` is allowed.
    ///
    /// Written attributes may also be read back.
    #[must_use]
    pub fn may_read(&self, name: &str) -> bool {
        self.reads.contains(name) || self.writes.contains(name)
    }

    /// Returns true if writing `name` is allowed.
    #[must_use]
    pub fn may_write(&self, name: &str) -> bool {
        self.writes.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bag_set_and_get() {
        let mut bag = AttributeBag::new();
        bag.set("seq_num", json!(3));

        assert_eq!(bag.get("seq_num").unwrap(), &json!(3));
        assert!(bag.contains_key("seq_num"));
        assert_eq!(
            bag.get("other").unwrap_err(),
            AttributeError::missing("other")
        );
    }

    #[test]
    fn test_bag_set_new_conflict() {
        let mut bag = AttributeBag::new();
        bag.set_new("result", json!(1)).unwrap();

        let err = bag.set_new("result", json!(2)).unwrap_err();
        assert!(matches!(err, AttributeError::AlreadySet { .. }));
        assert_eq!(bag.get("result").unwrap(), &json!(1));
    }

    #[test]
    fn test_bag_keys_sorted() {
        let mut bag = AttributeBag::new();
        bag.set("b", json!(1));
        bag.set("a", json!(2));

        assert_eq!(bag.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(bag.remove("a"), Some(json!(2)));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_schema_access() {
        let schema = AttributeSchema::new().reads("seq_num").writes("loop_num");

        assert!(schema.may_read("seq_num"));
        assert!(schema.may_read("loop_num"));
        assert!(!schema.may_write("seq_num"));
        assert!(schema.may_write("loop_num"));
        assert!(!schema.may_read("peek"));
    }
}
