use sled::transaction::ConflictableTransactionError;

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("invalid state transition: {0}")]
    InvalidState(String),
    #[error("employee capacity exceeded: {active} of {limit} seats in use")]
    CapacityExceeded { active: u32, limit: u32 },
    #[error("asset has no available units: {0}")]
    AssetUnavailable(String),
    #[error("a pending request for this asset and employee already exists")]
    DuplicateRequest,
    #[error("caller is not permitted to act on this record")]
    Unauthorized,
    #[error("stored record failed to decode at {0}")]
    CorruptRecord(String),
}

// Shorthand for failing a sled transaction with a business error.
pub(crate) fn abort(err: WorkflowError) -> ConflictableTransactionError<WorkflowError> {
    ConflictableTransactionError::Abort(err)
}
