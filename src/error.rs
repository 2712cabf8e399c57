//! Error types.

use derive_more::{Display, From};

use crate::models::{PostId, ThreadId, ThreadRef};

/// The broad class of an error, for callers that map errors onto a transport
/// (e.g. HTTP status codes).
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum ErrorKind {
    #[display(fmt = "not found")]
    NotFound,
    #[display(fmt = "conflict")]
    Conflict,
    #[display(fmt = "bad request")]
    BadRequest,
    #[display(fmt = "internal error")]
    Internal,
}

/// Our error type.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display(fmt = "User '{}' not found", nickname)]
    UserNotFound { nickname: String },
    #[display(fmt = "Forum '{}' not found", slug)]
    ForumNotFound { slug: String },
    #[display(fmt = "Thread {} not found", thread)]
    ThreadNotFound { thread: ThreadRef },
    #[display(fmt = "Post #{} not found", post_id)]
    PostNotFound { post_id: PostId },
    #[display(fmt = "Referenced row is missing ({})", constraint)]
    MissingReference { constraint: String },
    #[display(
        fmt = "Parent post #{} is not in thread #{}",
        parent_id,
        thread_id
    )]
    ParentNotInThread {
        parent_id: PostId,
        thread_id: ThreadId,
    },
    #[display(fmt = "Email '{}' belongs to user '{}'", email, owner)]
    EmailTaken { email: String, owner: String },
    #[display(fmt = "Unique key already exists ({})", constraint)]
    UniqueViolation { constraint: String },
    #[display(fmt = "Voice must be 1 or -1, got {}", voice)]
    InvalidVoice { voice: i32 },
    #[display(fmt = "Logger was already initialized: {}", _0)]
    #[from]
    LogError(log::SetLoggerError),
    #[display(fmt = "Database connection pool error: {}", _0)]
    #[from]
    R2d2Error(r2d2::Error),
    #[display(fmt = "Database error: {}", _0)]
    DatabaseError(diesel::result::Error),
    #[display(fmt = "Database migration error: {}", _0)]
    #[from]
    DatabaseMigrationError(Box<dyn std::error::Error + Send + Sync>),
    #[display(fmt = "YAML error: {}", _0)]
    #[from]
    YamlError(serde_yaml::Error),
    #[display(fmt = "JSON error: {}", _0)]
    #[from]
    JsonError(serde_json::Error),
    #[display(fmt = "I/O error: {}", _0)]
    #[from]
    IoError(std::io::Error),
    #[display(fmt = "I/O error: {}: {}", msg, cause)]
    IoErrorMsg { cause: std::io::Error, msg: String },
}

impl Error {
    pub fn from_io_error<S>(cause: std::io::Error, msg: S) -> Error
    where
        S: Into<String>,
    {
        Error::IoErrorMsg {
            cause,
            msg: msg.into(),
        }
    }

    /// Classify a diesel error that isn't a plain "no rows" result.
    ///
    /// Unique and foreign key violations become conflicts and missing
    /// references; everything else stays an internal database error.
    pub fn from_diesel(err: diesel::result::Error) -> Error {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::UniqueViolation {
                    constraint: info.constraint_name().unwrap_or("unknown").to_string(),
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Error::MissingReference {
                    constraint: info.constraint_name().unwrap_or("unknown").to_string(),
                }
            }
            other => Error::DatabaseError(other),
        }
    }

    /// The broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UserNotFound { .. }
            | Error::ForumNotFound { .. }
            | Error::ThreadNotFound { .. }
            | Error::PostNotFound { .. }
            | Error::MissingReference { .. } => ErrorKind::NotFound,

            Error::ParentNotInThread { .. }
            | Error::EmailTaken { .. }
            | Error::UniqueViolation { .. } => ErrorKind::Conflict,

            Error::InvalidVoice { .. } => ErrorKind::BadRequest,

            _ => ErrorKind::Internal,
        }
    }

    /// Whether this error is a unique-key collision.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Error {
        Error::from_diesel(err)
    }
}

impl std::error::Error for Error {}

/// Our result type.
pub type Result<T> = std::result::Result<T, Error>;
