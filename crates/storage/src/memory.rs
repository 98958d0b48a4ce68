//! In-process MVCC ledger.
//!
//! World state, per-key history and the ledger height live behind one mutex.
//! Snapshots never hold the lock across an await point: each read takes it
//! briefly, and the commit takes it once to validate and apply.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StorageError;
use crate::record::{ChaincodeEvent, CommitReceipt, CommittedEvent, KeyModification, TxContext};
use crate::traits::LedgerStorage;

/// Buffered committed events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Source of consensus timestamps for new transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerClock {
    /// Current UTC time when the snapshot begins.
    System,
    /// Every transaction gets the same instant. Used for reproducible output.
    Fixed(OffsetDateTime),
}

impl LedgerClock {
    fn now(&self) -> OffsetDateTime {
        match self {
            LedgerClock::System => OffsetDateTime::now_utc(),
            LedgerClock::Fixed(t) => *t,
        }
    }
}

#[derive(Debug, Clone)]
struct VersionedValue {
    /// Height of the block that last wrote the key.
    version: u64,
    /// `None` once deleted; the version is kept so stale readers still conflict.
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<String, VersionedValue>,
    history: HashMap<String, Vec<KeyModification>>,
    height: u64,
}

/// An in-progress transaction against a [`MemoryLedger`].
#[derive(Debug)]
pub struct MemorySnapshot {
    ctx: TxContext,
    /// key -> committed version observed by the first read.
    reads: BTreeMap<String, u64>,
    /// key -> pending value (`None` = delete).
    writes: BTreeMap<String, Option<Vec<u8>>>,
    event: Option<ChaincodeEvent>,
}

/// Cursor over a copy of one key's history.
///
/// Holds a slot in the ledger's open-cursor count until dropped.
#[derive(Debug)]
pub struct MemoryHistoryCursor {
    entries: std::vec::IntoIter<KeyModification>,
    open: Arc<AtomicUsize>,
}

impl Iterator for MemoryHistoryCursor {
    type Item = Result<KeyModification, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

impl Drop for MemoryHistoryCursor {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mutex-guarded in-memory implementation of [`LedgerStorage`].
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    clock: LedgerClock,
    nonce: AtomicU64,
    events: broadcast::Sender<CommittedEvent>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryLedger {
    /// Empty ledger stamping transactions with the system clock.
    pub fn new() -> Self {
        Self::with_clock(LedgerClock::System)
    }

    pub fn with_clock(clock: LedgerClock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(LedgerState::default()),
            clock,
            nonce: AtomicU64::new(0),
            events,
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Receive every event committed from now on, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<CommittedEvent> {
        self.events.subscribe()
    }

    /// Number of committed blocks that wrote at least one key or event.
    pub fn height(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.height)
    }

    /// History cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Backend("ledger state lock poisoned".to_string()))
    }

    fn next_tx_id(&self, timestamp: OffsetDateTime) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let seed = format!("{}:{}", nonce, timestamp.unix_timestamp_nanos());
        format!("{:x}", Sha256::digest(seed.as_bytes()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStorage for MemoryLedger {
    type Snapshot = MemorySnapshot;
    type HistoryCursor = MemoryHistoryCursor;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let timestamp = self.clock.now();
        let tx_id = self.next_tx_id(timestamp);
        Ok(MemorySnapshot {
            ctx: TxContext { tx_id, timestamp },
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            event: None,
        })
    }

    fn tx_context<'s>(&self, snapshot: &'s MemorySnapshot) -> &'s TxContext {
        &snapshot.ctx
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<CommitReceipt, StorageError> {
        let MemorySnapshot {
            ctx,
            reads,
            writes,
            event,
        } = snapshot;

        let mut state = self.lock()?;

        for (key, seen) in &reads {
            let current = state.entries.get(key).map_or(0, |e| e.version);
            if current != *seen {
                debug!(tx_id = %ctx.tx_id, key = %key, seen, current, "read set invalidated");
                return Err(StorageError::ConcurrentConflict {
                    key: key.clone(),
                    expected_version: *seen,
                });
            }
        }

        if writes.is_empty() && event.is_none() {
            return Ok(CommitReceipt {
                tx_id: ctx.tx_id,
                block_number: state.height,
                timestamp: ctx.timestamp,
            });
        }

        state.height += 1;
        let block_number = state.height;

        for (key, value) in writes {
            state.history.entry(key.clone()).or_default().push(KeyModification {
                tx_id: ctx.tx_id.clone(),
                timestamp: ctx.timestamp,
                is_delete: value.is_none(),
                value: value.clone(),
            });
            state.entries.insert(
                key,
                VersionedValue {
                    version: block_number,
                    value,
                },
            );
        }

        // Published under the lock so subscribers observe commit order.
        if let Some(event) = event {
            // A send error only means nobody is subscribed.
            let _ = self.events.send(CommittedEvent {
                tx_id: ctx.tx_id.clone(),
                block_number,
                event,
            });
        }

        debug!(tx_id = %ctx.tx_id, block_number, "transaction committed");
        Ok(CommitReceipt {
            tx_id: ctx.tx_id,
            block_number,
            timestamp: ctx.timestamp,
        })
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        debug!(tx_id = %snapshot.ctx.tx_id, "transaction aborted");
        Ok(())
    }

    async fn get_state(
        &self,
        snapshot: &mut MemorySnapshot,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(pending) = snapshot.writes.get(key) {
            return Ok(pending.clone());
        }
        let state = self.lock()?;
        let (version, value) = match state.entries.get(key) {
            Some(entry) => (entry.version, entry.value.clone()),
            None => (0, None),
        };
        snapshot.reads.entry(key.to_string()).or_insert(version);
        Ok(value)
    }

    async fn put_state(
        &self,
        snapshot: &mut MemorySnapshot,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError> {
        snapshot.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    async fn delete_state(&self, snapshot: &mut MemorySnapshot, key: &str) -> Result<(), StorageError> {
        snapshot.writes.insert(key.to_string(), None);
        Ok(())
    }

    async fn set_event(
        &self,
        snapshot: &mut MemorySnapshot,
        event: ChaincodeEvent,
    ) -> Result<(), StorageError> {
        snapshot.event = Some(event);
        Ok(())
    }

    async fn get_committed_state(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let state = self.lock()?;
        Ok(state.entries.get(key).and_then(|e| e.value.clone()))
    }

    async fn history_for_key(&self, key: &str) -> Result<MemoryHistoryCursor, StorageError> {
        let entries = {
            let state = self.lock()?;
            state.history.get(key).cloned().unwrap_or_default()
        };
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHistoryCursor {
            entries: entries.into_iter(),
            open: Arc::clone(&self.open_cursors),
        })
    }
}
