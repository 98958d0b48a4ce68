//! Digital Product Passport ledger-state transition engine.
//!
//! A product's passport is one JSON record on a shared ledger. Organizations
//! append lifecycle events to it through named transitions; each call is
//! gated by the [`AccessPolicy`], checked against the [`StageGraph`], and
//! persisted inside a single ledger snapshot together with its notification.
//!
//! Entry points:
//!
//! - [`PassportService`] owns a ledger and runs one snapshot per call,
//!   committing mutations and discarding queries.
//! - [`PassportContract::invoke`] dispatches a function name against a
//!   caller-managed snapshot.
//! - [`compliance::evaluate`] checks a record against a rule set without
//!   touching the ledger.

pub mod access;
pub mod action;
pub mod compliance;
pub mod config;
pub mod contract;
mod error;
pub mod event;
pub mod lifecycle;
pub mod record;
pub mod service;
pub mod store;
pub mod transition;

pub use access::{AccessPolicy, AllowedRoles, Caller, Role};
pub use action::Action;
pub use compliance::{CheckResult, ComplianceReport, Rule};
pub use config::DeploymentConfig;
pub use contract::{PassportContract, Response};
pub use error::{ConfigError, PassportError};
pub use event::{Event, EventPayload, EventType, InputRef};
pub use lifecycle::{Stage, StageGraph};
pub use record::{ProductRecord, StatusView};
pub use service::{PassportService, Submitted};
pub use store::{HistoryEntry, ProductStore};
pub use transition::{Notification, Transition, TransitionOutcome, DPP_EVENT_TOPIC};
