mod bptree;

pub use bptree::BPlusTree;

use std::collections::BTreeMap;

/// The key type for table stores: the auto-assigned integer primary key.
pub type Key = i64;

/// A key/value store holding the records of a single database table. There
/// is one store per table; record values are opaque byte slices.
pub trait Store {
    /// Gets the value for a key, if it exists.
    fn get(&self, key: Key) -> Option<Vec<u8>>;

    /// Adds a new record, returning true on success. Inserting a key that is
    /// already present fails and leaves the store unmodified.
    fn insert(&mut self, key: Key, value: Vec<u8>) -> bool;

    /// Replaces the value of an existing record with f(old), returning true
    /// on success or false if the key is not present.
    fn update(&mut self, key: Key, f: &dyn Fn(&[u8]) -> Vec<u8>) -> bool;

    /// Removes a record, returning true on success or false if the key is
    /// not present.
    fn delete(&mut self, key: Key) -> bool;

    /// Returns all records with keys in the inclusive range [lo, hi].
    fn range(&self, lo: Key, hi: Key) -> BTreeMap<Key, Vec<u8>>;

    /// Returns all records for which the predicate holds, in key order.
    fn scan_where(&self, pred: &dyn Fn(Key, &[u8]) -> bool) -> BTreeMap<Key, Vec<u8>>;
}
