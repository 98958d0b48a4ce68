use time::OffsetDateTime;

/// Identity of the transaction a snapshot belongs to.
///
/// The timestamp is assigned by the ledger when the snapshot begins and is
/// the only clock the engine may read: every replica executing the same
/// transaction sees the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub tx_id: String,
    pub timestamp: OffsetDateTime,
}

/// One committed version of a key, as returned by a history cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyModification {
    pub tx_id: String,
    /// Commit timestamp of the writing transaction.
    pub timestamp: OffsetDateTime,
    pub is_delete: bool,
    /// `None` when the version is a deletion.
    pub value: Option<Vec<u8>>,
}

/// A named notification attached to a transaction.
///
/// Delivered to subscribers only if the transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeEvent {
    pub name: String,
    pub payload: Vec<u8>,
}

/// A chaincode event as seen by subscribers, after its transaction committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent {
    pub tx_id: String,
    pub block_number: u64,
    pub event: ChaincodeEvent,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub tx_id: String,
    /// Ledger height after the commit. Read-only transactions do not advance it.
    pub block_number: u64,
    pub timestamp: OffsetDateTime,
}
