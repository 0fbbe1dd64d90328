/// Failures raised by a [`crate::store::KeyValueStore`] backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sled storage failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("concurrent update lost the race on key `{0}`")]
    Conflict(String),
    #[error("store backend poisoned")]
    Poisoned,
}

/// An object patch was applied over a value that is not an object.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("cannot merge an object into the non-object value at `{path}`")]
pub struct MergeConflict {
    pub path: String,
}

/// The caller's role may not perform the requested action.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{0}")]
pub struct AuthorizationError(pub String);

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("validation failure: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("stored value under `{key}` is malformed")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("gave up after repeated write conflicts on `{0}`")]
    Conflict(String),
    #[error(transparent)]
    Merge(#[from] MergeConflict),
    #[error("identifier `{id}` already present in `{key}`")]
    DuplicateId { key: String, id: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<AuthorizationError> for LedgerError {
    fn from(value: AuthorizationError) -> Self {
        LedgerError::Unauthorized(value.0)
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(key) => LedgerError::Conflict(key),
            other => LedgerError::Store(other),
        }
    }
}

impl LedgerError {
    /// Failures caused by the request itself rather than by the ledger; these
    /// are reported to the caller as data.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::Unauthorized(_)
                | LedgerError::InvalidArgument(_)
                | LedgerError::DuplicateId { .. }
        )
    }

    /// Human-readable messages for a rejection report.
    pub fn messages(&self) -> Vec<String> {
        match self {
            LedgerError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
