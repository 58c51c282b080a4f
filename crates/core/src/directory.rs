//! Patient directory collaborator.
//!
//! The directory is a read-only lookup of patient identity, line membership,
//! and contact details. It is owned by the surrounding record system; the
//! worklist core only consults it to validate commands and to project
//! summaries. Nothing here is versioned or mutated by call-list operations.

use crate::{CallListError, CallListResult};
use calllist_types::{Line, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// A patient as known to the directory. Immutable from the worklist's
/// point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: NonEmptyText,
    pub line: Line,
    /// Primary contact identifier, usually a phone number. Display
    /// formatting is the rendering collaborator's concern.
    pub primary_phone: Option<String>,
}

/// Read-only lookup of patients.
pub trait PatientDirectory: Send + Sync {
    /// Returns the patient with the given id, or `None` if unknown.
    fn find(&self, patient_id: Uuid) -> Option<Patient>;
}

/// Resolves a patient and checks they belong to the requested line.
///
/// # Errors
///
/// Returns [`CallListError::NotFound`] for an unknown patient and
/// [`CallListError::LineMismatch`] if the patient's recorded line differs
/// from `line`.
pub fn expect_on_line(
    directory: &dyn PatientDirectory,
    patient_id: Uuid,
    line: &Line,
) -> CallListResult<Patient> {
    let patient = directory
        .find(patient_id)
        .ok_or(CallListError::NotFound(patient_id))?;

    if patient.line != *line {
        return Err(CallListError::LineMismatch {
            patient_id,
            requested: line.clone(),
            actual: patient.line,
        });
    }

    Ok(patient)
}

/// In-memory directory, for single-process deployments and tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a patient record.
    pub fn register(&self, patient: Patient) {
        let mut patients = self.patients.write().unwrap_or_else(|e| e.into_inner());
        patients.insert(patient.id, patient);
    }
}

impl PatientDirectory for InMemoryDirectory {
    fn find(&self, patient_id: Uuid) -> Option<Patient> {
        let patients = self.patients.read().unwrap_or_else(|e| e.into_inner());
        patients.get(&patient_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(line: &str) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            name: NonEmptyText::new("Susan Everyteen").expect("valid name"),
            line: Line::new(line).expect("valid line"),
            primary_phone: Some("5551234567".into()),
        }
    }

    #[test]
    fn find_returns_registered_patients() {
        let directory = InMemoryDirectory::new();
        let susan = patient("main");
        directory.register(susan.clone());

        let found = directory.find(susan.id).expect("should find patient");
        assert_eq!(found.name.as_str(), "Susan Everyteen");
        assert!(directory.find(Uuid::new_v4()).is_none());
    }

    #[test]
    fn expect_on_line_rejects_unknown_patient() {
        let directory = InMemoryDirectory::new();
        let line = Line::new("main").expect("valid line");

        let err = expect_on_line(&directory, Uuid::new_v4(), &line)
            .expect_err("unknown patient should fail");
        assert!(matches!(err, CallListError::NotFound(_)));
    }

    #[test]
    fn expect_on_line_rejects_cross_line_access() {
        let directory = InMemoryDirectory::new();
        let james = patient("VA");
        directory.register(james.clone());

        let main = Line::new("main").expect("valid line");
        let err =
            expect_on_line(&directory, james.id, &main).expect_err("cross-line access should fail");
        assert!(matches!(err, CallListError::LineMismatch { .. }));

        let va = Line::new("VA").expect("valid line");
        let found = expect_on_line(&directory, james.id, &va).expect("same-line access succeeds");
        assert_eq!(found.id, james.id);
    }
}
