//! In-memory resource store
//!
//! Maps resource id to value for one object instance. The store implements
//! the Replace/Update write semantics and is only ever touched under the
//! instance lock; it performs no model validation itself — the enabler
//! rejects unknown ids and type mismatches before calling in.

use std::collections::BTreeMap;

use crate::error::{AccessError, Result};
use crate::value::{ResourceValue, ScalarValue, WriteMode};

/// Per-instance value storage
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    values: BTreeMap<u16, ResourceValue>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a default value at construction time.
    pub fn seed(&mut self, id: u16, value: ResourceValue) {
        self.values.insert(id, value);
    }

    /// Current value of a resource, if present.
    pub fn get(&self, id: u16) -> Option<&ResourceValue> {
        self.values.get(&id)
    }

    /// One index of a multi-instance resource.
    pub fn get_instance(&self, id: u16, index: u16) -> Option<&ScalarValue> {
        match self.values.get(&id) {
            Some(ResourceValue::Multiple(map)) => map.get(&index),
            _ => None,
        }
    }

    /// Apply a write according to the mode.
    ///
    /// Single values overwrite regardless of mode. For multi-instance
    /// payloads, Replace discards every existing index first; Update merges,
    /// creating indices absent from the store and never removing untouched
    /// ones.
    pub fn apply(&mut self, id: u16, mode: WriteMode, value: ResourceValue) {
        match (mode, value) {
            (_, ResourceValue::Single(scalar)) => {
                self.values.insert(id, ResourceValue::Single(scalar));
            }
            (WriteMode::Replace, ResourceValue::Multiple(map)) => {
                self.values.insert(id, ResourceValue::Multiple(map));
            }
            (WriteMode::Update, ResourceValue::Multiple(map)) => {
                match self.values.get_mut(&id) {
                    Some(ResourceValue::Multiple(existing)) => {
                        existing.extend(map);
                    }
                    _ => {
                        self.values.insert(id, ResourceValue::Multiple(map));
                    }
                }
            }
        }
    }

    /// Write one index of a multi-instance resource.
    ///
    /// A missing index is only created when `add_if_absent` is set.
    pub fn apply_instance(
        &mut self,
        id: u16,
        index: u16,
        scalar: ScalarValue,
        add_if_absent: bool,
    ) -> Result<()> {
        if !add_if_absent {
            return match self.values.get_mut(&id) {
                Some(ResourceValue::Multiple(map)) if map.contains_key(&index) => {
                    map.insert(index, scalar);
                    Ok(())
                }
                _ => Err(AccessError::NotFound(id)),
            };
        }
        let entry = self
            .values
            .entry(id)
            .or_insert_with(|| ResourceValue::Multiple(BTreeMap::new()));
        match entry {
            ResourceValue::Multiple(map) => {
                map.insert(index, scalar);
                Ok(())
            }
            ResourceValue::Single(_) => {
                Err(AccessError::bad_request("resource is single-valued"))
            }
        }
    }

    /// Snapshot of every stored value.
    pub fn snapshot(&self) -> BTreeMap<u16, ResourceValue> {
        self.values.clone()
    }

    /// Ids currently holding a value, ascending.
    pub fn ids(&self) -> Vec<u16> {
        self.values.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi(entries: &[(u16, i64)]) -> ResourceValue {
        ResourceValue::multiple(
            entries
                .iter()
                .map(|(i, v)| (*i, ScalarValue::Integer(*v))),
        )
    }

    #[test]
    fn test_replace_discards_existing_indices() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Replace, multi(&[(0, 10), (1, 11)]));
        store.apply(6, WriteMode::Replace, multi(&[(2, 22)]));

        let map = store.get(6).unwrap().as_multiple().unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_update_merges_and_keeps_untouched_indices() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Replace, multi(&[(0, 10), (1, 11)]));
        store.apply(6, WriteMode::Update, multi(&[(2, 22)]));

        let map = store.get(6).unwrap().as_multiple().unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(map[&0], ScalarValue::Integer(10));
    }

    #[test]
    fn test_update_overwrites_touched_index() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Replace, multi(&[(0, 10)]));
        store.apply(6, WriteMode::Update, multi(&[(0, 99)]));

        let map = store.get(6).unwrap().as_multiple().unwrap();
        assert_eq!(map[&0], ScalarValue::Integer(99));
    }

    #[test]
    fn test_update_on_absent_resource_creates_it() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Update, multi(&[(0, 10)]));
        assert!(store.get(6).is_some());
    }

    #[test]
    fn test_single_write_ignores_mode() {
        let mut store = ResourceStore::new();
        store.apply(5700, WriteMode::Update, ResourceValue::float(21.0));
        store.apply(5700, WriteMode::Replace, ResourceValue::float(22.0));
        assert_eq!(
            store.get(5700).unwrap().as_single().and_then(ScalarValue::as_f64),
            Some(22.0)
        );
    }

    #[test]
    fn test_apply_instance_requires_presence_without_flag() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Replace, multi(&[(0, 10)]));

        let err = store
            .apply_instance(6, 1, ScalarValue::Integer(1), false)
            .unwrap_err();
        assert_eq!(err, AccessError::NotFound(6));

        store
            .apply_instance(6, 1, ScalarValue::Integer(1), true)
            .unwrap();
        assert_eq!(store.get_instance(6, 1), Some(&ScalarValue::Integer(1)));
    }

    #[test]
    fn test_apply_instance_overwrites_existing() {
        let mut store = ResourceStore::new();
        store.apply(6, WriteMode::Replace, multi(&[(0, 10)]));
        store
            .apply_instance(6, 0, ScalarValue::Integer(77), false)
            .unwrap();
        assert_eq!(store.get_instance(6, 0), Some(&ScalarValue::Integer(77)));
    }

    #[test]
    fn test_seed_and_ids() {
        let mut store = ResourceStore::new();
        store.seed(5700, ResourceValue::float(20.0));
        store.seed(5701, ResourceValue::text("cel"));
        assert_eq!(store.ids(), vec![5700, 5701]);
    }
}
