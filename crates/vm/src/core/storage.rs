use std::collections::HashMap;

use alloy::primitives::U256;

use super::taint::Taint;

/// The [`Storage`] struct represents the persistent and transient storage of a
/// contract. Every slot remembers the provenance of the value written to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    storage: HashMap<U256, (U256, Taint)>,
    transient: HashMap<U256, (U256, Taint)>,
}

impl Storage {
    /// Creates a new, empty [`Storage`].
    ///
    /// ```
    /// use argus_vm::core::storage::Storage;
    ///
    /// let storage = Storage::new();
    /// assert!(storage.is_empty());
    /// ```
    pub fn new() -> Storage {
        Storage::default()
    }

    /// Store a value in persistent storage.
    pub fn store(&mut self, key: U256, value: U256, taint: Taint) {
        self.storage.insert(key, (value, taint));
    }

    /// Store a value in transient storage.
    pub fn tstore(&mut self, key: U256, value: U256, taint: Taint) {
        self.transient.insert(key, (value, taint));
    }

    /// Load a value from persistent storage. Every loaded value carries
    /// [`Taint::STORAGE`] on top of whatever was written.
    ///
    /// ```
    /// use argus_vm::core::{storage::Storage, taint::Taint};
    /// use alloy::primitives::U256;
    ///
    /// let mut storage = Storage::new();
    /// storage.store(U256::from(1), U256::from(2), Taint::CALLER);
    ///
    /// let (value, taint) = storage.load(U256::from(1));
    /// assert_eq!(value, U256::from(2));
    /// assert!(taint.contains(Taint::STORAGE | Taint::CALLER));
    /// ```
    pub fn load(&self, key: U256) -> (U256, Taint) {
        let (value, taint) = self.storage.get(&key).copied().unwrap_or_default();
        (value, taint | Taint::STORAGE)
    }

    /// Load a value from transient storage.
    pub fn tload(&self, key: U256) -> (U256, Taint) {
        let (value, taint) = self.transient.get(&key).copied().unwrap_or_default();
        (value, taint | Taint::STORAGE)
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty() && self.transient.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_slot_is_zero() {
        let storage = Storage::new();
        let (value, taint) = storage.load(U256::from(7));
        assert_eq!(value, U256::ZERO);
        assert_eq!(taint, Taint::STORAGE);
    }

    #[test]
    fn test_transient_is_separate() {
        let mut storage = Storage::new();
        storage.tstore(U256::from(1), U256::from(9), Taint::NONE);
        assert_eq!(storage.load(U256::from(1)).0, U256::ZERO);
        assert_eq!(storage.tload(U256::from(1)).0, U256::from(9));
    }
}
