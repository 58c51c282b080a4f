//! Call record store.
//!
//! Append-only ledger of call attempts: who called, when, and the recorded
//! outcome. Records are never mutated or deleted; removing a patient from
//! the worklist clears membership but retains their call history. Each
//! record carries a store-wide monotonic sequence number so "most recently
//! created" stays well defined even when two calls share a timestamp.
//!
//! Sharded per line like the worklist entry store.

use crate::directory::Patient;
use crate::locking::{read_within, write_within};
use crate::{CallListResult, CoreConfig};
use calllist_types::{CallOutcome, Line, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// One call attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub patient_id: Uuid,
    pub line: Line,
    pub called_at: DateTime<Utc>,
    pub called_by: NonEmptyText,
    pub outcome: CallOutcome,
    /// Creation order across the whole store; later records have larger values.
    pub sequence: u64,
}

#[derive(Default)]
struct RecordShard {
    records: RwLock<HashMap<Uuid, Vec<CallRecord>>>,
}

/// Line-sharded, append-only store of call records.
pub struct CallRecordStore {
    shards: RwLock<HashMap<Line, Arc<RecordShard>>>,
    next_sequence: AtomicU64,
    lock_timeout: std::time::Duration,
}

impl CallRecordStore {
    pub fn new(cfg: &CoreConfig) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(1),
            lock_timeout: cfg.store_timeout(),
        }
    }

    fn shard(&self, line: &Line) -> CallListResult<Arc<RecordShard>> {
        {
            let shards = read_within(&self.shards, self.lock_timeout)?;
            if let Some(shard) = shards.get(line) {
                return Ok(Arc::clone(shard));
            }
        }

        let mut shards = write_within(&self.shards, self.lock_timeout)?;
        Ok(Arc::clone(shards.entry(line.clone()).or_default()))
    }

    fn existing_shard(&self, line: &Line) -> CallListResult<Option<Arc<RecordShard>>> {
        let shards = read_within(&self.shards, self.lock_timeout)?;
        Ok(shards.get(line).cloned())
    }

    /// Appends a call record for `patient` stamped `now`.
    pub fn record(
        &self,
        patient: &Patient,
        called_by: NonEmptyText,
        outcome: CallOutcome,
        now: DateTime<Utc>,
    ) -> CallListResult<CallRecord> {
        let shard = self.shard(&patient.line)?;
        let mut records = write_within(&shard.records, self.lock_timeout)?;

        // Sequence assignment happens under the shard write lock so creation
        // order and sequence order agree per key.
        let record = CallRecord {
            patient_id: patient.id,
            line: patient.line.clone(),
            called_at: now,
            called_by,
            outcome,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        records.entry(patient.id).or_default().push(record.clone());
        Ok(record)
    }

    /// The most recently created record for (patient, line), or `None`.
    pub fn latest_for(&self, patient_id: Uuid, line: &Line) -> CallListResult<Option<CallRecord>> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(None);
        };
        let records = read_within(&shard.records, self.lock_timeout)?;
        Ok(records
            .get(&patient_id)
            .and_then(|history| history.last().cloned()))
    }

    /// The most recently created record per patient on `line`.
    pub fn latest_by_patient(&self, line: &Line) -> CallListResult<HashMap<Uuid, CallRecord>> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(HashMap::new());
        };
        let records = read_within(&shard.records, self.lock_timeout)?;
        Ok(records
            .iter()
            .filter_map(|(patient_id, history)| {
                history.last().map(|record| (*patient_id, record.clone()))
            })
            .collect())
    }

    /// Full call history for (patient, line), in creation order.
    pub fn history(&self, patient_id: Uuid, line: &Line) -> CallListResult<Vec<CallRecord>> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(Vec::new());
        };
        let records = read_within(&shard.records, self.lock_timeout)?;
        Ok(records.get(&patient_id).cloned().unwrap_or_default())
    }
}
