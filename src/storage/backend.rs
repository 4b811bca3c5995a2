use crate::errors::StorageError;

/// In-memory backend implementation.
pub mod in_memory;
/// SQLite-backed persistent backend implementation.
#[cfg(feature = "sqlite_backend")]
pub mod sqlite_store;

/// Object-safe key/value port the resilient engine writes through
/// (localStorage's shape).
///
/// Implementations must report quota exhaustion from [`set`](Self::set) as
/// [`StorageError::QuotaExceeded`] so the engine can tell "storage is full"
/// apart from "storage is broken" without inspecting messages.
pub trait StorageBackend: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get(&self, key: &str) -> Option<String>;

    /// Sets the value for the given key, overwriting any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the item with the given key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Clears all items in the backend.
    fn clear(&self) -> Result<(), StorageError>;

    /// Returns the number of items in the backend.
    fn len(&self) -> usize;

    /// Returns a vector of all keys in the backend.
    fn keys(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::sync::Arc;

    #[test]
    fn backend_trait_object_contract() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());

        // starts empty
        assert_eq!(backend.len(), 0);
        assert!(backend.get("missing").is_none());

        // set + get
        backend.set("a", "1").unwrap();
        backend.set("b", "2").unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("a").as_deref(), Some("1"));
        assert_eq!(backend.get("b").as_deref(), Some("2"));

        // overwrite keeps len
        backend.set("a", "ONE").unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("a").as_deref(), Some("ONE"));

        // remove
        backend.remove("b").unwrap();
        assert_eq!(backend.len(), 1);
        assert!(backend.get("b").is_none());

        // clear
        backend.clear().unwrap();
        assert_eq!(backend.len(), 0);
        assert!(backend.keys().is_empty());
    }
}
