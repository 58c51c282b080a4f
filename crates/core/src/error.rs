use calllist_types::Line;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CallListError {
    #[error("unknown patient: {0}")]
    NotFound(Uuid),
    #[error("patient {patient_id} is on line '{actual}', not '{requested}'")]
    LineMismatch {
        patient_id: Uuid,
        requested: Line,
        actual: Line,
    },
    #[error("store operation exceeded its deadline of {0:?}")]
    Timeout(std::time::Duration),
    #[error("concurrent mutation lost the linearization race; retry the operation")]
    Conflict,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type CallListResult<T> = std::result::Result<T, CallListError>;
