/// Database error classification
///
/// Every failure coming out of sqlx is sorted into one of two buckets before
/// it reaches the executor:
///
/// - **Non-retryable**: the statement itself is wrong for the data it touched
///   (constraint violations, malformed values, references to columns that do
///   not exist). Running it again cannot succeed.
/// - **Transient**: anything else (connection resets, pool timeouts,
///   deadlocks, serialization failures). Worth another attempt.
///
/// # SQLSTATE codes treated as non-retryable
///
/// | Code    | Condition                   |
/// |---------|-----------------------------|
/// | `23505` | unique_violation            |
/// | `23503` | foreign_key_violation       |
/// | `22P02` | invalid_text_representation |
/// | `42703` | undefined_column            |

use std::fmt;
use std::time::Duration;

/// Errors raised by the data layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected the statement in a way retrying cannot fix
    #[error("{kind}: {source}")]
    NonRetryable {
        kind: NonRetryableKind,
        #[source]
        source: sqlx::Error,
    },

    /// Connection, timeout, deadlock and other failures that may clear up
    #[error("transient database error: {0}")]
    Transient(#[source] sqlx::Error),

    /// The unit of work did not finish within its total time budget
    #[error("unit of work exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// COMMIT was sent but its reply never arrived, so the transaction may or
    /// may not have been applied. Never retried.
    #[error("commit outcome unknown: {0}")]
    CommitOutcomeUnknown(#[source] sqlx::Error),

    /// The retry loop ended without capturing an error to report
    #[error("unit of work failed after {0} attempts")]
    RetriesExhausted(u32),
}

/// Failure classes that propagate on first occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonRetryableKind {
    /// SQLSTATE 23505
    UniqueViolation,

    /// SQLSTATE 23503
    ForeignKeyViolation,

    /// SQLSTATE 22P02, or a value the driver could not decode
    MalformedValue,

    /// SQLSTATE 42703, or a column missing from a result row
    UndefinedColumn,
}

impl NonRetryableKind {
    /// Maps a Postgres SQLSTATE code to its non-retryable class, if any
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "23505" => Some(Self::UniqueViolation),
            "23503" => Some(Self::ForeignKeyViolation),
            "22P02" => Some(Self::MalformedValue),
            "42703" => Some(Self::UndefinedColumn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniqueViolation => "unique constraint violation",
            Self::ForeignKeyViolation => "foreign key violation",
            Self::MalformedValue => "malformed value",
            Self::UndefinedColumn => "undefined column",
        }
    }
}

impl fmt::Display for NonRetryableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a failed unit of work may be attempted again
///
/// Implemented by every error type the executor runs, so business failures
/// (user missing, insufficient funds) can opt out of retries while store
/// failures keep their classification.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl StoreError {
    /// Returns the non-retryable class, if this is one
    pub fn non_retryable_kind(&self) -> Option<NonRetryableKind> {
        match self {
            StoreError::NonRetryable { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl StoreError {
    /// Classifies a failed COMMIT
    ///
    /// A database error reply means the server rolled the transaction back,
    /// so the usual classification applies. Any other failure leaves the
    /// outcome unknown.
    pub fn from_commit(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(_) => StoreError::from(err),
            other => StoreError::CommitOutcomeUnknown(other),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db_err) => db_err
                .code()
                .and_then(|code| NonRetryableKind::from_sqlstate(&code)),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::TypeNotFound { .. } => {
                Some(NonRetryableKind::MalformedValue)
            }
            sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
                Some(NonRetryableKind::UndefinedColumn)
            }
            _ => None,
        };

        match kind {
            Some(kind) => StoreError::NonRetryable { kind, source: err },
            None => StoreError::Transient(err),
        }
    }
}
