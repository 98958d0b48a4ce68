//! Ledger collaborator for the Digital Product Passport engine.
//!
//! The engine never talks to a concrete ledger. It drives a [`LedgerStorage`]
//! implementation through snapshots: reads and writes accumulate in a
//! snapshot, and the commit validates the snapshot's read set against the
//! committed key versions before applying anything (optimistic MVCC).
//!
//! [`MemoryLedger`] is the in-process backend used by tests and the CLI. Other
//! backends can prove themselves against [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{LedgerClock, MemoryHistoryCursor, MemoryLedger, MemorySnapshot};
pub use record::{ChaincodeEvent, CommitReceipt, CommittedEvent, KeyModification, TxContext};
pub use traits::LedgerStorage;
