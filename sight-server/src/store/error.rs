//! Store errors.

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No record with the given key
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// A writer panicked while holding a table lock
    #[error("store lock poisoned")]
    Poisoned,

    /// A batch write task failed to complete
    #[error("batch write failed: {0}")]
    WriteFailed(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            key: key.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}
