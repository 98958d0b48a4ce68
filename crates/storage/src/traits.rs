use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ChaincodeEvent, CommitReceipt, KeyModification, TxContext};

/// The storage trait for DPP ledger backends.
///
/// A `LedgerStorage` implementation provides a key/value world state with
/// per-key version history and transaction-scoped notifications.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot` carrying
///    the transaction id and consensus timestamp
/// 2. Call `get_state` / `put_state` / `delete_state` / `set_event` with
///    `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: validate and apply, consuming the snapshot
///    OR `abort_snapshot(snapshot)`: discard, consuming the snapshot
///
/// A `Snapshot` dropped without committing MUST leave no trace: no writes, no
/// history entries, no published event.
///
/// ## OCC Conflict Detection
///
/// Every `get_state` records the committed version of the key it observed
/// (0 for a key that was never written). `commit_snapshot` rejects the whole
/// transaction with `StorageError::ConcurrentConflict` if any recorded
/// version is no longer current. Reads of keys the snapshot itself wrote
/// return the pending value and do not enter the read set.
///
/// ## History
///
/// `history_for_key` reads committed data only and never blocks writers. The
/// returned cursor is finite and owns whatever backend resource backs it;
/// dropping it releases that resource on every exit path.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single instance can be
/// shared across async tasks.
#[async_trait]
pub trait LedgerStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    /// Cursor over the committed versions of one key, oldest first.
    type HistoryCursor: Iterator<Item = Result<KeyModification, StorageError>> + Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Transaction id and consensus timestamp assigned to a snapshot.
    fn tx_context<'s>(&self, snapshot: &'s Self::Snapshot) -> &'s TxContext;

    /// Validate the snapshot's read set and apply its writes and event atomically.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot)
        -> Result<CommitReceipt, StorageError>;

    /// Abort (roll back) a snapshot, discarding all pending mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── World state (within snapshot) ────────────────────────────────────────

    /// Read a key. `Ok(None)` when the key is absent or deleted.
    async fn get_state(
        &self,
        snapshot: &mut Self::Snapshot,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stage a full overwrite of a key.
    async fn put_state(
        &self,
        snapshot: &mut Self::Snapshot,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Stage a deletion of a key. The deletion is recorded in the key's history.
    async fn delete_state(&self, snapshot: &mut Self::Snapshot, key: &str)
        -> Result<(), StorageError>;

    /// Attach a notification to the transaction. A later call replaces an
    /// earlier one: a transaction carries at most one event.
    async fn set_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: ChaincodeEvent,
    ) -> Result<(), StorageError>;

    // ── Query operations (outside snapshot, committed data only) ──────────────

    /// Read the committed value of a key without entering any read set.
    async fn get_committed_state(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Open a cursor over every committed version of a key, in commit order.
    async fn history_for_key(&self, key: &str) -> Result<Self::HistoryCursor, StorageError>;
}
