//! Types for working with errors produced by sqlite3ent.

use std::io;
use std::num::{ParseIntError, TryFromIntError};

use crate::engine::error::SqliteError;

/// A specialized `Result` type for sqlite3ent.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("value is {found}, expected {expected}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
    #[error("decoding conversion error: {0}")]
    Conversion(String),
}

impl From<TryFromIntError> for DecodeError {
    fn from(err: TryFromIntError) -> Self {
        DecodeError::Conversion(err.to_string())
    }
}

/// Represents all the ways a method can fail within sqlite3ent.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The query part of a connection string could not be parsed.
    #[error("malformed connection string query: {0}")]
    MalformedQuery(String),

    /// A connection option was given a literal outside its accepted set.
    #[error("invalid {key}: {value}, expecting value of '{expected}'")]
    InvalidOption {
        key: String,
        value: String,
        expected: String,
    },

    /// An integer connection option could not be parsed.
    #[error("invalid {key}: {value}: {source}")]
    InvalidInteger {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// Error returned from the database.
    #[error("error returned from database: {0}")]
    Sqlite(#[source] SqliteError),

    /// Error communicating with the database backend.
    #[error("error communicating with database: {0}")]
    Io(#[from] io::Error),

    /// Unexpected or invalid data encountered while communicating with the database.
    #[error("encountered unexpected or invalid data: {0}")]
    Protocol(String),

    /// The connection was used after [`Conn::close`](crate::Conn::close).
    #[error("attempted to use a closed connection")]
    ConnectionClosed,

    /// A statement was executed with the wrong number of arguments.
    #[error("expected {expected} arguments, got {given}")]
    ArgumentCount { expected: usize, given: usize },

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[from] DecodeError),

    /// No driver has been registered under the requested name.
    #[error("unknown driver {0:?} (forgotten import?)")]
    UnknownDriver(String),

    /// A driver was registered twice under the same name.
    #[error("register called twice for driver {0:?}")]
    DuplicateDriver(String),

    /// Error reported by a third-party [`Driver`](crate::Driver) implementation.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// [`sqlite3_unlock_notify`] kept returning `SQLITE_LOCKED` even after
    /// resetting the blocking statement.
    #[error("unlock_notify failed after multiple attempts")]
    UnlockNotify,
}

impl Error {
    pub fn into_sqlite_error(self) -> Option<SqliteError> {
        match self {
            Error::Sqlite(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if this error was raised while validating connection options.
    pub fn is_invalid_option(&self) -> bool {
        matches!(
            self,
            Error::InvalidOption { .. } | Error::InvalidInteger { .. }
        )
    }

    /// Wrap an error produced by a third-party driver.
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Driver(Box::new(err))
    }
}

impl From<SqliteError> for Error {
    fn from(error: SqliteError) -> Self {
        Error::Sqlite(error)
    }
}
