use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Tabula operations.
///
/// Each kind describes one category of failure so callers can match on it
/// instead of parsing messages.
///
/// # Examples
///
/// ```rust
/// use tabula::errors::{ErrorKind, TabulaError, TabulaResult};
///
/// fn lookup() -> TabulaResult<()> {
///     Err(TabulaError::new("users is missing", ErrorKind::TableNotFound))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::TableNotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Migration errors
    /// No migration is registered for the exact `(from, to)` version pair
    MigrationNotFound { from: i32, to: i32 },
    /// Generic migration failure raised by migration code
    MigrationError,

    // Schema errors
    /// The table does not exist in the store or in the storage schema
    TableNotFound,
    /// A storage's table definition does not match the physical table
    SchemaMismatch,
    /// A table definition is malformed
    InvalidSchema,

    // Row errors
    /// A primary key value is already taken
    UniqueConstraintViolation,
    /// The requested row was not found
    NotFound,
    /// A `NOT NULL` column received no value
    MissingRequiredField,
    /// Error mapping a record to/from a row
    ObjectMappingError,
    /// A value does not fit the column or the requested Rust type
    InvalidDataType,

    // Operation errors
    /// The operation is not valid in the current state
    InvalidOperation,
    /// Generic validation error
    ValidationError,

    // Connection errors
    /// The physical connection is not open
    StoreNotOpened,
    /// Every strong handle to the storage has been dropped
    StoreAlreadyClosed,

    // IO errors
    /// Generic IO error
    IOError,
    /// The file was not found
    FileNotFound,
    /// Permission denied for file operation
    PermissionDenied,
    /// The database file could not be decoded
    FileCorrupted,
    /// Error encoding the database file
    EncodingError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MigrationNotFound { from, to } => {
                write!(f, "Migration from version {} to {} not found", from, to)
            }
            ErrorKind::MigrationError => write!(f, "Migration error"),
            ErrorKind::TableNotFound => write!(f, "Table not found"),
            ErrorKind::SchemaMismatch => write!(f, "Schema mismatch"),
            ErrorKind::InvalidSchema => write!(f, "Invalid schema"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::MissingRequiredField => write!(f, "Missing required field"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::StoreNotOpened => write!(f, "Store not opened"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::FileNotFound => write!(f, "File not found"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::FileCorrupted => write!(f, "File corrupted"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Tabula error type.
///
/// `TabulaError` carries a message, an [`ErrorKind`], an optional cause and the
/// backtrace captured when it was created.
///
/// # Examples
///
/// ```rust
/// use tabula::errors::{ErrorKind, TabulaError};
///
/// let cause = TabulaError::new("disk unplugged", ErrorKind::IOError);
/// let err = TabulaError::new_with_cause("Failed to open", ErrorKind::StoreNotOpened, cause);
/// assert_eq!(err.cause().unwrap().kind(), &ErrorKind::IOError);
/// ```
#[derive(Clone)]
pub struct TabulaError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<TabulaError>>,
    backtrace: Atomic<Backtrace>,
}

impl TabulaError {
    /// Creates a new `TabulaError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        TabulaError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `TabulaError` that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: TabulaError) -> Self {
        TabulaError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&TabulaError> {
        self.cause.as_deref()
    }
}

impl Display for TabulaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for TabulaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => write!(f, "{} ({})\n{:?}", self.message, self.error_kind, self.backtrace.read()),
        }
    }
}

impl Error for TabulaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, TabulaError>`, returned by every fallible operation.
pub type TabulaResult<T> = Result<T, TabulaError>;

impl From<std::io::Error> for TabulaError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IOError,
        };
        TabulaError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<bincode::error::EncodeError> for TabulaError {
    fn from(err: bincode::error::EncodeError) -> Self {
        TabulaError::new(
            &format!("Failed to encode database: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<bincode::error::DecodeError> for TabulaError {
    fn from(err: bincode::error::DecodeError) -> Self {
        TabulaError::new(
            &format!("Failed to decode database: {}", err),
            ErrorKind::FileCorrupted,
        )
    }
}

impl From<String> for TabulaError {
    fn from(msg: String) -> Self {
        TabulaError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for TabulaError {
    fn from(msg: &str) -> Self {
        TabulaError::new(msg, ErrorKind::InternalError)
    }
}
