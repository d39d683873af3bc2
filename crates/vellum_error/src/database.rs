//! Persistence error types.

/// Persistence failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DatabaseErrorKind {
    /// Could not reach the database
    #[display("Database unreachable: {_0}")]
    Connection(String),
    /// Pool timed out handing out a connection
    #[display("No pooled connection available: {_0}")]
    Pool(String),
    /// Statement failed for a reason not covered below
    #[display("Statement failed: {_0}")]
    Query(String),
    /// A unique index rejected the write, e.g. a duplicate version number or
    /// a second selected version
    #[display("Unique constraint violated: {_0}")]
    UniqueViolation(String),
    /// A referenced row (proposal, parent version) does not exist
    #[display("Foreign key violated: {_0}")]
    ForeignKeyViolation(String),
    /// Concurrent transactions could not be serialized
    #[display("Transaction conflict: {_0}")]
    SerializationFailure(String),
    /// JSON column could not be encoded or decoded
    #[display("JSON column error: {_0}")]
    Serialization(String),
    /// Embedded migrations failed
    #[display("Migration failed: {_0}")]
    Migration(String),
    /// Query returned no row
    #[display("Row not found")]
    NotFound,
    /// Stored value does not map onto a domain type
    #[display("Column {column} holds unexpected value '{value}'")]
    InvalidValue {
        /// Column holding the value
        column: &'static str,
        /// Raw stored value
        value: String,
    },
}

/// Persistence error with source location.
///
/// # Examples
///
/// ```
/// use vellum_error::{DatabaseError, DatabaseErrorKind};
///
/// let err = DatabaseError::new(DatabaseErrorKind::NotFound);
/// assert!(format!("{}", err).contains("Row not found"));
/// assert!(!err.is_constraint_violation());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Database Error: {} at line {} in {}", kind, line, file)]
pub struct DatabaseError {
    /// The kind of error that occurred
    pub kind: DatabaseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DatabaseError {
    /// Create a new DatabaseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Returns true when an integrity constraint rejected the write.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::UniqueViolation(_) | DatabaseErrorKind::ForeignKeyViolation(_)
        )
    }
}

#[cfg(feature = "database")]
impl From<diesel::result::Error> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind as Pg, Error};

        let kind = match err {
            Error::NotFound => DatabaseErrorKind::NotFound,
            Error::DatabaseError(Pg::UniqueViolation, info) => {
                DatabaseErrorKind::UniqueViolation(info.message().to_string())
            }
            Error::DatabaseError(Pg::ForeignKeyViolation, info) => {
                DatabaseErrorKind::ForeignKeyViolation(info.message().to_string())
            }
            Error::DatabaseError(Pg::SerializationFailure, info) => {
                DatabaseErrorKind::SerializationFailure(info.message().to_string())
            }
            Error::DatabaseError(Pg::ClosedConnection, info) => {
                DatabaseErrorKind::Connection(info.message().to_string())
            }
            other => DatabaseErrorKind::Query(other.to_string()),
        };
        DatabaseError::new(kind)
    }
}

#[cfg(feature = "database")]
impl From<diesel::ConnectionError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<diesel::r2d2::PoolError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::r2d2::PoolError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Pool(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<serde_json::Error> for DatabaseError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::new(DatabaseErrorKind::Serialization(err.to_string()))
    }
}
