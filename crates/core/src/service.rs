//! Call list orchestration.
//!
//! `CallListService` combines the worklist entry store, the call record
//! store, and the expiry policy to answer "who still needs a call on line L"
//! and "whose calls were completed recently". The service itself is
//! stateless: every query re-derives membership from the stores against a
//! single clock sample, so completed calls expire back onto the active
//! worklist without any background process.

use crate::call_records::{CallRecord, CallRecordStore};
use crate::clock::Clock;
use crate::directory::{expect_on_line, PatientDirectory};
use crate::expiry::{Bucket, ExpiryPolicy};
use crate::worklist::{WorklistEntry, WorklistEntryStore};
use crate::{CallListResult, CoreConfig};
use calllist_types::{CallOutcome, Line, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A worklist query result row: patient identity plus their current call
/// state, ready for the rendering collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub patient_id: Uuid,
    pub name: NonEmptyText,
    pub line: Line,
    pub primary_phone: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub added_by: Option<NonEmptyText>,
    pub last_called_at: Option<DateTime<Utc>>,
    pub last_called_by: Option<NonEmptyText>,
    pub last_outcome: Option<CallOutcome>,
}

/// One (patient, line) key with its classified membership at query time.
struct Candidate {
    patient_id: Uuid,
    entry: Option<WorklistEntry>,
    record: Option<CallRecord>,
    bucket: Bucket,
}

impl Candidate {
    /// When the patient (re)joined the active worklist: the entry stamp, or
    /// the expired call that logically re-created the entry.
    fn effective_added_at(&self) -> Option<DateTime<Utc>> {
        self.entry
            .as_ref()
            .map(|e| e.added_at)
            .or_else(|| self.record.as_ref().map(|r| r.called_at))
    }
}

/// Orchestrator for the shared, line-scoped call list.
///
/// Safe to share across request workers behind an `Arc`; the stores carry
/// all mutable state and serialize their own mutations per line.
pub struct CallListService {
    clock: Arc<dyn Clock>,
    directory: Arc<dyn PatientDirectory>,
    entries: Arc<WorklistEntryStore>,
    records: Arc<CallRecordStore>,
    policy: ExpiryPolicy,
}

impl CallListService {
    pub fn new(
        cfg: &CoreConfig,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn PatientDirectory>,
        entries: Arc<WorklistEntryStore>,
        records: Arc<CallRecordStore>,
    ) -> Self {
        Self {
            clock,
            directory,
            entries,
            records,
            policy: ExpiryPolicy::new(cfg.grace_window()),
        }
    }

    /// Puts a patient on the shared worklist for `line`.
    ///
    /// Idempotent for a patient whose entry is the newest event on their key;
    /// a patient whose latest call postdates their entry gets a fresh entry,
    /// whether that call is still inside the grace window (they surface as
    /// active immediately) or long expired (they move back to the top of the
    /// list with a current stamp).
    ///
    /// # Errors
    ///
    /// [`CallListError::NotFound`](crate::CallListError::NotFound) for an
    /// unknown patient,
    /// [`CallListError::LineMismatch`](crate::CallListError::LineMismatch) if
    /// the patient belongs to a different line, plus the store-level
    /// `Timeout`/`Conflict` failures, both retryable.
    pub fn add_to_worklist(
        &self,
        patient_id: Uuid,
        line: &Line,
        actor: NonEmptyText,
    ) -> CallListResult<WorklistEntry> {
        let patient = expect_on_line(self.directory.as_ref(), patient_id, line)?;
        let now = self.clock.now();
        let latest = self.records.latest_for(patient_id, line)?;

        let entry = self.entries.add(&patient, actor, latest.as_ref(), now)?;
        tracing::info!(patient_id = %patient_id, line = %line, "added to call list");
        Ok(entry)
    }

    /// Takes a patient off the worklist for every viewer of `line`.
    ///
    /// A no-op if the patient is not a member. Call history is retained. A
    /// patient with no entry but a call history gets a tombstone so their
    /// records stop granting membership; a patient with neither leaves no
    /// trace in the stores.
    pub fn remove_from_worklist(&self, patient_id: Uuid, line: &Line) -> CallListResult<()> {
        let now = self.clock.now();
        let removed = self.entries.remove(patient_id, line, now)?;
        if !removed && self.records.latest_for(patient_id, line)?.is_some() {
            self.entries.suppress(patient_id, line, now)?;
        }
        tracing::info!(patient_id = %patient_id, line = %line, "removed from call list");
        Ok(())
    }

    /// Records a call attempt and its outcome.
    ///
    /// This is the only transition that moves a patient from active to
    /// completed. The worklist entry is left in place; suppression is
    /// computed lazily by the expiry policy until the grace window elapses.
    pub fn record_outcome(
        &self,
        patient_id: Uuid,
        line: &Line,
        actor: NonEmptyText,
        outcome: CallOutcome,
    ) -> CallListResult<CallRecord> {
        let patient = expect_on_line(self.directory.as_ref(), patient_id, line)?;
        let now = self.clock.now();

        let record = self.records.record(&patient, actor, outcome, now)?;
        tracing::info!(patient_id = %patient_id, line = %line, outcome = %outcome, "call outcome recorded");
        Ok(record)
    }

    /// Patients on `line` who currently need a call, most recently added
    /// first. Samples the clock once.
    pub fn active_worklist(&self, line: &Line) -> CallListResult<Vec<PatientSummary>> {
        self.active_worklist_at(line, self.clock.now())
    }

    /// [`active_worklist`](Self::active_worklist) evaluated at an explicit instant.
    pub fn active_worklist_at(
        &self,
        line: &Line,
        now: DateTime<Utc>,
    ) -> CallListResult<Vec<PatientSummary>> {
        let mut active: Vec<Candidate> = self
            .candidates(line, now)?
            .into_iter()
            .filter(|c| c.bucket == Bucket::Active)
            .collect();

        active.sort_by(|a, b| {
            b.effective_added_at()
                .cmp(&a.effective_added_at())
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });

        Ok(self.summarise(active))
    }

    /// Patients on `line` whose latest call is still inside the grace
    /// window, most recently called first. Samples the clock once.
    pub fn completed_calls(&self, line: &Line) -> CallListResult<Vec<PatientSummary>> {
        self.completed_calls_at(line, self.clock.now())
    }

    /// [`completed_calls`](Self::completed_calls) evaluated at an explicit instant.
    pub fn completed_calls_at(
        &self,
        line: &Line,
        now: DateTime<Utc>,
    ) -> CallListResult<Vec<PatientSummary>> {
        let mut completed: Vec<Candidate> = self
            .candidates(line, now)?
            .into_iter()
            .filter(|c| c.bucket == Bucket::Completed)
            .collect();

        completed.sort_by(|a, b| {
            let a_called = a.record.as_ref().map(|r| r.called_at);
            let b_called = b.record.as_ref().map(|r| r.called_at);
            b_called
                .cmp(&a_called)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });

        Ok(self.summarise(completed))
    }

    /// Every (patient, line) key with any membership claim, classified
    /// against a single `now`.
    ///
    /// Candidates are the union of worklist entry keys and call record keys:
    /// an expired record re-creates membership logically even after its entry
    /// was superseded. A record at or before the removal tombstone grants no
    /// membership, so removed patients stay gone until a newer event.
    fn candidates(&self, line: &Line, now: DateTime<Utc>) -> CallListResult<Vec<Candidate>> {
        let snapshots = self.entries.snapshot_line(line)?;
        let latest = self.records.latest_by_patient(line)?;

        let mut slots = HashMap::with_capacity(snapshots.len());
        let mut ids: HashSet<Uuid> = latest.keys().copied().collect();
        for snapshot in snapshots {
            ids.insert(snapshot.patient_id);
            slots.insert(snapshot.patient_id, (snapshot.entry, snapshot.removed_at));
        }

        let mut candidates = Vec::with_capacity(ids.len());
        for patient_id in ids {
            let (entry, removed_at) = slots.remove(&patient_id).unwrap_or((None, None));
            let record = latest.get(&patient_id).cloned();

            let record = match (&entry, removed_at) {
                (None, Some(removed_at)) => record.filter(|r| r.called_at > removed_at),
                _ => record,
            };

            if entry.is_none() && record.is_none() {
                continue;
            }

            let bucket = self.policy.classify(entry.as_ref(), record.as_ref(), now);
            candidates.push(Candidate {
                patient_id,
                entry,
                record,
                bucket,
            });
        }

        Ok(candidates)
    }

    fn summarise(&self, candidates: Vec<Candidate>) -> Vec<PatientSummary> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let Some(patient) = self.directory.find(candidate.patient_id) else {
                    // Commands validate against the directory, so a store key
                    // without a directory record means the directory shrank
                    // underneath us. Skip rather than fail the whole query.
                    tracing::warn!(
                        patient_id = %candidate.patient_id,
                        "store references a patient the directory no longer knows; skipping"
                    );
                    return None;
                };

                Some(PatientSummary {
                    patient_id: patient.id,
                    name: patient.name,
                    line: patient.line,
                    primary_phone: patient.primary_phone,
                    added_at: candidate.entry.as_ref().map(|e| e.added_at),
                    added_by: candidate.entry.map(|e| e.added_by),
                    last_called_at: candidate.record.as_ref().map(|r| r.called_at),
                    last_called_by: candidate.record.as_ref().map(|r| r.called_by.clone()),
                    last_outcome: candidate.record.map(|r| r.outcome),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::{InMemoryDirectory, Patient};
    use crate::CallListError;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    struct Harness {
        clock: Arc<ManualClock>,
        directory: Arc<InMemoryDirectory>,
        service: CallListService,
    }

    fn harness() -> Harness {
        let cfg = CoreConfig::default();
        let clock = Arc::new(ManualClock::new(t0()));
        let directory = Arc::new(InMemoryDirectory::new());
        let service = CallListService::new(
            &cfg,
            clock.clone(),
            directory.clone(),
            Arc::new(WorklistEntryStore::new(&cfg)),
            Arc::new(CallRecordStore::new(&cfg)),
        );
        Harness {
            clock,
            directory,
            service,
        }
    }

    impl Harness {
        fn add_patient(&self, name: &str, line: &str) -> Uuid {
            let patient = Patient {
                id: Uuid::new_v4(),
                name: NonEmptyText::new(name).expect("valid name"),
                line: Line::new(line).expect("valid line"),
                primary_phone: Some("5551234567".into()),
            };
            let id = patient.id;
            self.directory.register(patient);
            id
        }

        fn active_ids(&self, line: &Line) -> Vec<Uuid> {
            self.service
                .active_worklist(line)
                .expect("active query should succeed")
                .iter()
                .map(|s| s.patient_id)
                .collect()
        }

        fn completed_ids(&self, line: &Line) -> Vec<Uuid> {
            self.service
                .completed_calls(line)
                .expect("completed query should succeed")
                .iter()
                .map(|s| s.patient_id)
                .collect()
        }
    }

    fn actor(name: &str) -> NonEmptyText {
        NonEmptyText::new(name).expect("valid actor")
    }

    fn main_line() -> Line {
        Line::new("main").expect("valid line")
    }

    #[test]
    fn voicemail_cycle_end_to_end() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        assert_eq!(h.active_ids(&line), vec![susan]);
        assert!(h.completed_ids(&line).is_empty());

        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");

        h.clock.advance(Duration::minutes(1));
        assert!(h.active_ids(&line).is_empty(), "suppressed after the call");
        assert_eq!(h.completed_ids(&line), vec![susan]);

        // Nine hours after t0 the grace window has elapsed; no action needed.
        h.clock.set(t0() + Duration::hours(9));
        assert_eq!(h.active_ids(&line), vec![susan]);
        assert!(h.completed_ids(&line).is_empty());
    }

    #[test]
    fn patient_is_in_exactly_one_bucket_at_every_instant() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Reached)
            .expect("outcome should record");

        for minutes in [0i64, 1, 59, 8 * 60 - 1, 8 * 60, 12 * 60] {
            let at = h.clock.now() + Duration::minutes(minutes);
            let active = h
                .service
                .active_worklist_at(&line, at)
                .expect("active query should succeed");
            let completed = h
                .service
                .completed_calls_at(&line, at)
                .expect("completed query should succeed");

            let in_active = active.iter().any(|s| s.patient_id == susan);
            let in_completed = completed.iter().any(|s| s.patient_id == susan);
            assert!(
                in_active ^ in_completed,
                "exactly one bucket at +{minutes}m (active={in_active}, completed={in_completed})"
            );
        }
    }

    #[test]
    fn call_list_is_scoped_to_its_line() {
        let h = harness();
        let main = main_line();
        let va = Line::new("VA").expect("valid line");

        let susan = h.add_patient("Susan Everyteen", "main");
        let james = h.add_patient("James Hetfield", "VA");

        h.service
            .add_to_worklist(susan, &main, actor("nurse1"))
            .expect("add should succeed");
        h.service
            .add_to_worklist(james, &va, actor("nurse1"))
            .expect("add should succeed");
        h.service
            .record_outcome(james, &va, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");

        assert_eq!(h.active_ids(&main), vec![susan]);
        assert!(h.completed_ids(&main).is_empty());
        assert_eq!(h.completed_ids(&va), vec![james]);
    }

    #[test]
    fn commands_reject_cross_line_patients() {
        let h = harness();
        let main = main_line();
        let james = h.add_patient("James Hetfield", "VA");

        let err = h
            .service
            .add_to_worklist(james, &main, actor("nurse1"))
            .expect_err("cross-line add should fail");
        assert!(matches!(err, CallListError::LineMismatch { .. }));

        let err = h
            .service
            .record_outcome(james, &main, actor("nurse1"), CallOutcome::Reached)
            .expect_err("cross-line outcome should fail");
        assert!(matches!(err, CallListError::LineMismatch { .. }));

        let err = h
            .service
            .add_to_worklist(Uuid::new_v4(), &main, actor("nurse1"))
            .expect_err("unknown patient should fail");
        assert!(matches!(err, CallListError::NotFound(_)));
    }

    #[test]
    fn worklist_is_shared_between_viewers() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        // U1 adds; U2 issues the query and sees the same shared list.
        h.service
            .add_to_worklist(susan, &line, actor("user1"))
            .expect("add should succeed");
        assert_eq!(h.active_ids(&line), vec![susan]);

        // A second add by another viewer does not duplicate or restamp.
        h.clock.advance(Duration::minutes(10));
        let entry = h
            .service
            .add_to_worklist(susan, &line, actor("user2"))
            .expect("re-add should succeed");
        assert_eq!(entry.added_at, t0(), "added_at unchanged by the re-add");
        assert_eq!(entry.added_by.as_str(), "user1");
        assert_eq!(h.active_ids(&line), vec![susan]);

        // One remove clears the patient for every viewer at once.
        h.service
            .remove_from_worklist(susan, &line)
            .expect("remove should succeed");
        assert!(h.active_ids(&line).is_empty());
    }

    #[test]
    fn readd_during_grace_window_surfaces_patient_as_active() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");
        assert_eq!(h.completed_ids(&line), vec![susan]);

        // Manual re-add two hours into the window: the newest event wins.
        h.clock.advance(Duration::hours(2));
        let entry = h
            .service
            .add_to_worklist(susan, &line, actor("nurse2"))
            .expect("re-add should succeed");
        assert_eq!(entry.added_at, h.clock.now(), "fresh stamp on re-add");
        assert_eq!(h.active_ids(&line), vec![susan]);
        assert!(h.completed_ids(&line).is_empty());
    }

    #[test]
    fn readd_after_expiry_restamps_added_at() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");

        // The call has long expired and Susan is already back on the active
        // list; an explicit re-add must still move her stamp to now, not
        // hand back the entry from this morning.
        h.clock.set(t0() + Duration::hours(9) + Duration::minutes(1));
        let entry = h
            .service
            .add_to_worklist(susan, &line, actor("nurse2"))
            .expect("re-add should succeed");
        assert_eq!(entry.added_at, h.clock.now(), "fresh stamp after expiry");
        assert_eq!(entry.added_by.as_str(), "nurse2");
        assert_eq!(h.active_ids(&line), vec![susan]);
    }

    #[test]
    fn remove_clears_membership_but_keeps_history() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(1));
        let record = h
            .service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");

        h.clock.advance(Duration::minutes(1));
        h.service
            .remove_from_worklist(susan, &line)
            .expect("remove should succeed");

        assert!(h.active_ids(&line).is_empty());
        assert!(h.completed_ids(&line).is_empty());

        // The ledger never forgets, even past the grace window.
        h.clock.advance(Duration::hours(12));
        assert!(h.active_ids(&line).is_empty());
        assert_eq!(record.outcome, CallOutcome::Voicemail);
    }

    #[test]
    fn entry_less_outcome_completes_then_resurfaces() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        // Outcome recorded for a patient who was never added to the list.
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::NotReached)
            .expect("outcome should record");
        assert_eq!(h.completed_ids(&line), vec![susan]);
        assert!(h.active_ids(&line).is_empty());

        // Expiry re-creates membership with no entry ever written.
        h.clock.advance(Duration::hours(9));
        assert_eq!(h.active_ids(&line), vec![susan]);
        assert!(h.completed_ids(&line).is_empty());

        // Removing the resurfaced patient clears both views for good.
        h.service
            .remove_from_worklist(susan, &line)
            .expect("remove should succeed");
        assert!(h.active_ids(&line).is_empty());
        assert!(h.completed_ids(&line).is_empty());
    }

    #[test]
    fn active_worklist_orders_most_recently_added_first() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");
        let thorny = h.add_patient("Thorny", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(5));
        h.service
            .add_to_worklist(thorny, &line, actor("nurse1"))
            .expect("add should succeed");

        assert_eq!(h.active_ids(&line), vec![thorny, susan]);
    }

    #[test]
    fn completed_calls_order_most_recently_called_first() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");
        let thorny = h.add_patient("Thorny", "main");

        for id in [susan, thorny] {
            h.service
                .add_to_worklist(id, &line, actor("nurse1"))
                .expect("add should succeed");
        }

        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse1"), CallOutcome::Voicemail)
            .expect("outcome should record");
        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(thorny, &line, actor("nurse1"), CallOutcome::Reached)
            .expect("outcome should record");

        assert_eq!(h.completed_ids(&line), vec![thorny, susan]);
    }

    #[test]
    fn summaries_carry_contact_and_call_details() {
        let h = harness();
        let line = main_line();
        let susan = h.add_patient("Susan Everyteen", "main");

        h.service
            .add_to_worklist(susan, &line, actor("nurse1"))
            .expect("add should succeed");
        h.clock.advance(Duration::minutes(1));
        h.service
            .record_outcome(susan, &line, actor("nurse2"), CallOutcome::Voicemail)
            .expect("outcome should record");

        let completed = h
            .service
            .completed_calls(&line)
            .expect("completed query should succeed");
        assert_eq!(completed.len(), 1);
        let summary = &completed[0];
        assert_eq!(summary.name.as_str(), "Susan Everyteen");
        assert_eq!(summary.primary_phone.as_deref(), Some("5551234567"));
        assert_eq!(summary.added_by.as_ref().map(|a| a.as_str()), Some("nurse1"));
        assert_eq!(
            summary.last_called_by.as_ref().map(|a| a.as_str()),
            Some("nurse2")
        );
        assert_eq!(summary.last_outcome, Some(CallOutcome::Voicemail));
        assert_eq!(summary.last_called_at, Some(t0() + Duration::minutes(1)));
    }
}
