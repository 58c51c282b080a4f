//! # Call List Core
//!
//! Core business logic for the shared clinic call list.
//!
//! This crate contains the line-scoped worklist domain:
//! - Worklist entry and call record stores (in-memory, sharded per line)
//! - The pure expiry policy that lazily moves completed calls back onto the
//!   active worklist once the grace window elapses
//! - The `CallListService` orchestrator answering the active/completed queries
//!
//! **No API concerns**: HTTP servers, serialisation formats for the wire, and
//! display formatting belong in `api-rest`.

pub mod call_records;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod expiry;
mod locking;
pub mod service;
pub mod worklist;

pub use call_records::{CallRecord, CallRecordStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{grace_window_from_env_value, CoreConfig};
pub use directory::{InMemoryDirectory, Patient, PatientDirectory};
pub use error::{CallListError, CallListResult};
pub use expiry::{Bucket, ExpiryPolicy};
pub use service::{CallListService, PatientSummary};
pub use worklist::{EntrySnapshot, WorklistEntry, WorklistEntryStore};
