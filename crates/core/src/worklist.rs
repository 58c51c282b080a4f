//! Worklist entry store.
//!
//! Holds the set of patients currently flagged as needing a call, keyed by
//! (patient, line) with at most one live entry per key. Entries are sharded
//! per line: mutations serialize on the owning line's lock only, so traffic
//! on one line never blocks another.
//!
//! Removal leaves a `removed_at` tombstone alongside the deleted entry. A
//! patient whose only membership comes from a call record (no surviving
//! entry) must stay off both views once removed, until a newer add or a
//! newer call record supersedes the tombstone.

use crate::call_records::CallRecord;
use crate::directory::Patient;
use crate::expiry::{Bucket, ExpiryPolicy};
use crate::locking::{read_within, write_within};
use crate::{CallListError, CallListResult, CoreConfig};
use calllist_types::{Line, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// A live "this patient needs a call" flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorklistEntry {
    pub patient_id: Uuid,
    pub line: Line,
    pub added_at: DateTime<Utc>,
    pub added_by: NonEmptyText,
}

/// Point-in-time view of one (patient, line) key, for query-side scans.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub patient_id: Uuid,
    pub entry: Option<WorklistEntry>,
    pub removed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct EntrySlot {
    entry: Option<WorklistEntry>,
    removed_at: Option<DateTime<Utc>>,
    /// Bumped on every mutation; `add` re-validates it under the write lock.
    version: u64,
}

#[derive(Default)]
struct LineShard {
    slots: RwLock<HashMap<Uuid, EntrySlot>>,
}

/// Line-sharded, in-memory store of worklist entries.
pub struct WorklistEntryStore {
    shards: RwLock<HashMap<Line, Arc<LineShard>>>,
    lock_timeout: std::time::Duration,
}

impl WorklistEntryStore {
    pub fn new(cfg: &CoreConfig) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            lock_timeout: cfg.store_timeout(),
        }
    }

    /// Shard for `line`, creating it on first use.
    fn shard(&self, line: &Line) -> CallListResult<Arc<LineShard>> {
        {
            let shards = read_within(&self.shards, self.lock_timeout)?;
            if let Some(shard) = shards.get(line) {
                return Ok(Arc::clone(shard));
            }
        }

        let mut shards = write_within(&self.shards, self.lock_timeout)?;
        Ok(Arc::clone(shards.entry(line.clone()).or_default()))
    }

    /// Shard for `line` if one exists; queries on untouched lines see nothing.
    fn existing_shard(&self, line: &Line) -> CallListResult<Option<Arc<LineShard>>> {
        let shards = read_within(&self.shards, self.lock_timeout)?;
        Ok(shards.get(line).cloned())
    }

    /// Adds `patient` to the worklist, idempotently.
    ///
    /// If a live entry already exists and no call record postdates it, it is
    /// returned unchanged. Otherwise a fresh entry stamped `now` is written,
    /// clearing any removal tombstone: this covers both a re-add during the
    /// grace window (the patient surfaces as active again immediately) and a
    /// re-add after an expired call (the fresh `added_at` puts them back at
    /// the top of the active ordering). A record stamped exactly at
    /// `added_at` counts as postdating the entry.
    ///
    /// The decision is made against a snapshot and re-validated under the
    /// write lock via the slot version; a lost race returns
    /// [`CallListError::Conflict`] with nothing written.
    pub fn add(
        &self,
        patient: &Patient,
        added_by: NonEmptyText,
        latest_record: Option<&CallRecord>,
        now: DateTime<Utc>,
    ) -> CallListResult<WorklistEntry> {
        let shard = self.shard(&patient.line)?;

        // Decision phase against a read snapshot.
        let (observed_version, existing) = {
            let slots = read_within(&shard.slots, self.lock_timeout)?;
            match slots.get(&patient.id) {
                Some(slot) => (slot.version, slot.entry.clone()),
                None => (0, None),
            }
        };

        if let Some(entry) = existing {
            let shadowed = latest_record.map_or(false, |r| r.called_at >= entry.added_at);
            if !shadowed {
                return Ok(entry);
            }
        }

        let fresh = WorklistEntry {
            patient_id: patient.id,
            line: patient.line.clone(),
            added_at: now,
            added_by,
        };

        self.commit_entry(&shard, observed_version, fresh)
    }

    /// Commit phase of [`add`](Self::add): the slot must not have moved since
    /// the decision was taken against `observed_version`.
    fn commit_entry(
        &self,
        shard: &LineShard,
        observed_version: u64,
        fresh: WorklistEntry,
    ) -> CallListResult<WorklistEntry> {
        let mut slots = write_within(&shard.slots, self.lock_timeout)?;
        let slot = slots.entry(fresh.patient_id).or_default();
        if slot.version != observed_version {
            return Err(CallListError::Conflict);
        }
        slot.entry = Some(fresh.clone());
        slot.removed_at = None;
        slot.version += 1;

        Ok(fresh)
    }

    /// Removes the entry for (patient, line) and stamps a tombstone.
    ///
    /// Returns whether a slot existed. Keys the store has never seen are
    /// left unwritten, so repeated removes of bogus ids cannot grow the
    /// shard; callers who need to suppress record-granted membership for an
    /// entry-less patient use [`suppress`](Self::suppress) instead.
    pub fn remove(&self, patient_id: Uuid, line: &Line, now: DateTime<Utc>) -> CallListResult<bool> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(false);
        };
        let mut slots = write_within(&shard.slots, self.lock_timeout)?;
        match slots.get_mut(&patient_id) {
            Some(slot) => {
                slot.entry = None;
                slot.removed_at = Some(now);
                slot.version += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stamps a tombstone for a patient with no slot.
    ///
    /// Used when a remove must suppress membership granted purely by call
    /// records (the patient was never added, or their slot was superseded).
    pub fn suppress(&self, patient_id: Uuid, line: &Line, now: DateTime<Utc>) -> CallListResult<()> {
        let shard = self.shard(line)?;
        let mut slots = write_within(&shard.slots, self.lock_timeout)?;
        let slot = slots.entry(patient_id).or_default();
        slot.entry = None;
        slot.removed_at = Some(now);
        slot.version += 1;
        Ok(())
    }

    /// Current entry for (patient, line), if any.
    pub fn get(&self, patient_id: Uuid, line: &Line) -> CallListResult<Option<WorklistEntry>> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(None);
        };
        let slots = read_within(&shard.slots, self.lock_timeout)?;
        Ok(slots.get(&patient_id).and_then(|slot| slot.entry.clone()))
    }

    /// All keys ever touched on `line`, with their current entry and tombstone.
    pub fn snapshot_line(&self, line: &Line) -> CallListResult<Vec<EntrySnapshot>> {
        let Some(shard) = self.existing_shard(line)? else {
            return Ok(Vec::new());
        };
        let slots = read_within(&shard.slots, self.lock_timeout)?;
        Ok(slots
            .iter()
            .map(|(patient_id, slot)| EntrySnapshot {
                patient_id: *patient_id,
                entry: slot.entry.clone(),
                removed_at: slot.removed_at,
            })
            .collect())
    }

    /// Live entries on `line` not shadowed by an unexpired call record,
    /// most recently added first (ties broken by patient id).
    pub fn list_active(
        &self,
        line: &Line,
        latest_records: &HashMap<Uuid, CallRecord>,
        policy: &ExpiryPolicy,
        now: DateTime<Utc>,
    ) -> CallListResult<Vec<WorklistEntry>> {
        let mut active: Vec<WorklistEntry> = self
            .snapshot_line(line)?
            .into_iter()
            .filter_map(|snapshot| snapshot.entry)
            .filter(|entry| {
                policy.classify(Some(entry), latest_records.get(&entry.patient_id), now)
                    == Bucket::Active
            })
            .collect();

        active.sort_by(|a, b| {
            b.added_at
                .cmp(&a.added_at)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });
        Ok(active)
    }
}
