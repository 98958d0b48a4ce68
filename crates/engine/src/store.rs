//! Product records on top of a ledger snapshot.
//!
//! A record lives under its product identifier as one JSON value. All access
//! goes through the snapshot of the current call, so every read enters the
//! snapshot's read set and is validated again at commit.

use dpp_storage::{ChaincodeEvent, KeyModification, LedgerStorage, StorageError};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::PassportError;
use crate::event::iso_timestamp;
use crate::record::ProductRecord;

/// Record access scoped to one snapshot.
pub struct ProductStore<'a, S: LedgerStorage> {
    ledger: &'a S,
    snapshot: &'a mut S::Snapshot,
}

impl<'a, S: LedgerStorage> ProductStore<'a, S> {
    pub fn new(ledger: &'a S, snapshot: &'a mut S::Snapshot) -> Self {
        ProductStore { ledger, snapshot }
    }

    /// Consensus timestamp of the current snapshot.
    pub fn tx_timestamp(&self) -> OffsetDateTime {
        self.ledger.tx_context(&*self.snapshot).timestamp
    }

    pub async fn get(&mut self, id: &str) -> Result<ProductRecord, PassportError> {
        match self.ledger.get_state(self.snapshot, id).await? {
            Some(bytes) => decode_record(id, &bytes),
            None => Err(PassportError::NotFound(id.to_string())),
        }
    }

    /// Create a record in stage `NEW` with no events.
    ///
    /// The existence probe registers the key as absent in the read set, so a
    /// concurrent create of the same id makes one of the two commits fail.
    pub async fn create(
        &mut self,
        id: &str,
        meta: Value,
        creator: &str,
        timestamp: OffsetDateTime,
    ) -> Result<ProductRecord, PassportError> {
        if self.ledger.get_state(self.snapshot, id).await?.is_some() {
            return Err(PassportError::AlreadyExists(id.to_string()));
        }
        let record = ProductRecord::new(id, meta, creator, iso_timestamp(timestamp)?);
        self.put(&record).await?;
        Ok(record)
    }

    /// Overwrite the full record.
    pub async fn put(&mut self, record: &ProductRecord) -> Result<(), PassportError> {
        let bytes = serde_json::to_vec(record).map_err(|e| PassportError::Corrupt {
            key: record.id.clone(),
            reason: e.to_string(),
        })?;
        self.ledger.put_state(self.snapshot, &record.id, bytes).await?;
        Ok(())
    }

    /// Attach the call's notification. Delivered only if the snapshot commits.
    pub async fn notify(&mut self, topic: &str, payload: &impl Serialize) -> Result<(), PassportError> {
        let payload = serde_json::to_vec(payload)
            .map_err(|e| PassportError::Storage(format!("cannot encode notification: {e}")))?;
        self.ledger
            .set_event(
                self.snapshot,
                ChaincodeEvent {
                    name: topic.to_string(),
                    payload,
                },
            )
            .await?;
        Ok(())
    }

    /// Every committed version of the record, oldest first.
    ///
    /// Versions are decoded lazily; the ledger cursor is released when the
    /// returned iterator is dropped, whether or not it was drained.
    pub async fn history(&mut self, id: &str) -> Result<History<S::HistoryCursor>, PassportError> {
        let cursor = self.ledger.history_for_key(id).await?;
        Ok(History {
            key: id.to_string(),
            cursor,
        })
    }
}

fn decode_record(id: &str, bytes: &[u8]) -> Result<ProductRecord, PassportError> {
    serde_json::from_slice(bytes).map_err(|e| PassportError::Corrupt {
        key: id.to_string(),
        reason: e.to_string(),
    })
}

/// One committed version of a product key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub tx_id: String,
    pub timestamp: String,
    pub is_delete: bool,
    /// Decoded JSON of the version; `null` for deletions.
    pub value: Option<Value>,
}

/// Decoding iterator over a ledger history cursor.
pub struct History<C> {
    key: String,
    cursor: C,
}

impl<C> History<C> {
    fn decode(&self, m: KeyModification) -> Result<HistoryEntry, PassportError> {
        let value = match m.value {
            Some(bytes) if !m.is_delete => Some(serde_json::from_slice(&bytes).map_err(|e| {
                PassportError::Corrupt {
                    key: self.key.clone(),
                    reason: format!("version written by {}: {e}", m.tx_id),
                }
            })?),
            _ => None,
        };
        Ok(HistoryEntry {
            timestamp: iso_timestamp(m.timestamp)?,
            tx_id: m.tx_id,
            is_delete: m.is_delete,
            value,
        })
    }
}

impl<C> Iterator for History<C>
where
    C: Iterator<Item = Result<KeyModification, StorageError>>,
{
    type Item = Result<HistoryEntry, PassportError>;

    fn next(&mut self) -> Option<Self::Item> {
        let modification = self.cursor.next()?;
        Some(modification.map_err(PassportError::from).and_then(|m| self.decode(m)))
    }
}
