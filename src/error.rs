use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Errors surfaced by the four public engine operations.
///
/// Internal invariant violations (a read referencing a missing gallery,
/// a counter that is already gone) are not errors: they are logged as
/// warnings and the operation continues best-effort.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The referenced read event does not exist. Safe no-op for the caller.
    #[error("read event {read_id} not found")]
    NotFound { read_id: String },

    /// The underlying transaction failed to commit. Nothing was written;
    /// the caller may retry the whole operation.
    #[error(transparent)]
    Storage(#[from] AnyhowError),
}

impl HistoryError {
    /// Recover a typed error smuggled through an `anyhow` chain from inside
    /// a database task; anything else is a storage fault.
    pub(crate) fn from_internal(err: AnyhowError) -> Self {
        match err.downcast::<HistoryError>() {
            Ok(typed) => typed,
            Err(other) => HistoryError::Storage(other),
        }
    }
}
