/// All errors that can be returned by a LedgerStorage implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: a key in the snapshot's read
    /// set was rewritten by a transaction that committed first.
    #[error("concurrent conflict on key {key}: read version {expected_version} is no longer current")]
    ConcurrentConflict { key: String, expected_version: u64 },

    /// A backend-specific storage error (lock poisoning, I/O, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
