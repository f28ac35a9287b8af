use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Error types of the cash engine.
#[derive(Error, Debug)]
pub enum CashError {
    /// Date string not in the canonical `YYYY-MM-DD` shape
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Invalid month {0}, expected 1-12")]
    InvalidMonth(u32),

    /// Ledger amounts must be strictly positive and fit a `(16, 4)` column
    #[error("Amount must be greater than zero with at most 12 integer digits and 4 decimals, got {0}")]
    InvalidAmount(Decimal),

    #[error("Opening balance must not be negative and needs at most 12 integer digits and 4 decimals, got {0}")]
    InvalidOpeningBalance(Decimal),

    #[error("Unknown entry kind '{0}', expected Income or Expense")]
    InvalidKind(String),

    #[error("Unknown payment method '{0}'")]
    InvalidPaymentMethod(String),

    #[error("Description must not be empty")]
    InvalidDescription,

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// A session already exists for the tenant on that business date
    #[error("A cash session already exists for {0}")]
    SessionAlreadyOpenToday(String),

    /// Another session of the tenant, dated `{0}`, is still open
    #[error("The cash session of {0} is still open")]
    SessionStillOpen(String),

    #[error("No open cash session for {0}")]
    NoOpenSession(String),

    /// The session owning the entry is closed or belongs to another day
    #[error("The cash session of entry {0} is closed")]
    SessionClosed(i32),

    #[error("Ledger entry {0} not found")]
    EntryNotFound(i32),

    #[error("Principal {actor} may not modify ledger entry {entry_id}")]
    Forbidden { actor: i32, entry_id: i32 },

    /// First creation of a monthly aggregate needs a principal to attribute it to
    #[error("Creating the monthly aggregate for {year}-{month:02} requires an actor")]
    ActorRequired { year: i32, month: u32 },

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Coarse grouping of errors, used by callers to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Dependency,
    Storage,
}

impl CashError {
    /// Stable machine-readable code of the error.
    pub fn code(&self) -> &'static str {
        match self {
            CashError::InvalidDateFormat(_) => "INVALID_DATE_FORMAT",
            CashError::InvalidMonth(_) => "INVALID_MONTH",
            CashError::InvalidAmount(_) => "INVALID_AMOUNT",
            CashError::InvalidOpeningBalance(_) => "INVALID_OPENING_BALANCE",
            CashError::InvalidKind(_) => "INVALID_KIND",
            CashError::InvalidPaymentMethod(_) => "INVALID_PAYMENT_METHOD",
            CashError::InvalidDescription => "INVALID_DESCRIPTION",
            CashError::UnknownTimezone(_) => "UNKNOWN_TIMEZONE",
            CashError::SessionAlreadyOpenToday(_) => "SESSION_ALREADY_OPEN_TODAY",
            CashError::SessionStillOpen(_) => "SESSION_STILL_OPEN",
            CashError::NoOpenSession(_) => "NO_OPEN_SESSION",
            CashError::SessionClosed(_) => "SESSION_CLOSED",
            CashError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            CashError::Forbidden { .. } => "FORBIDDEN",
            CashError::ActorRequired { .. } => "ACTOR_REQUIRED",
            CashError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CashError::InvalidDateFormat(_)
            | CashError::InvalidMonth(_)
            | CashError::InvalidAmount(_)
            | CashError::InvalidOpeningBalance(_)
            | CashError::InvalidKind(_)
            | CashError::InvalidPaymentMethod(_)
            | CashError::InvalidDescription
            | CashError::UnknownTimezone(_) => ErrorCategory::Validation,
            CashError::SessionAlreadyOpenToday(_)
            | CashError::SessionStillOpen(_)
            | CashError::NoOpenSession(_)
            | CashError::SessionClosed(_) => ErrorCategory::Conflict,
            CashError::EntryNotFound(_) => ErrorCategory::NotFound,
            CashError::Forbidden { .. } => ErrorCategory::Forbidden,
            CashError::ActorRequired { .. } => ErrorCategory::Dependency,
            CashError::Database(_) => ErrorCategory::Storage,
        }
    }
}

/// True when the database rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Type alias for Result with CashError
pub type Result<T> = std::result::Result<T, CashError>;
