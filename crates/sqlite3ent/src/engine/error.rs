use std::ffi::CStr;

use libsqlite3_sys::{self as ffi_sys, sqlite3};

use super::ffi;

// Result and Error Codes
// https://www.sqlite.org/rescode.html

/// Primary SQLite result codes, the low byte of every error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PrimaryErrCode {
    Error,
    Internal,
    Perm,
    Abort,
    Busy,
    Locked,
    NoMem,
    ReadOnly,
    Interrupt,
    IoErr,
    Corrupt,
    NotFound,
    Full,
    CantOpen,
    Protocol,
    Empty,
    Schema,
    TooBig,
    Constraint,
    Mismatch,
    Misuse,
    NoLfs,
    Auth,
    Format,
    Range,
    NotADb,
    Notice,
    Warning,
    Unknown(i32),
}

impl PrimaryErrCode {
    fn from_code(code: i32) -> Self {
        match code & 0xff {
            ffi_sys::SQLITE_ERROR => Self::Error,
            ffi_sys::SQLITE_INTERNAL => Self::Internal,
            ffi_sys::SQLITE_PERM => Self::Perm,
            ffi_sys::SQLITE_ABORT => Self::Abort,
            ffi_sys::SQLITE_BUSY => Self::Busy,
            ffi_sys::SQLITE_LOCKED => Self::Locked,
            ffi_sys::SQLITE_NOMEM => Self::NoMem,
            ffi_sys::SQLITE_READONLY => Self::ReadOnly,
            ffi_sys::SQLITE_INTERRUPT => Self::Interrupt,
            ffi_sys::SQLITE_IOERR => Self::IoErr,
            ffi_sys::SQLITE_CORRUPT => Self::Corrupt,
            ffi_sys::SQLITE_NOTFOUND => Self::NotFound,
            ffi_sys::SQLITE_FULL => Self::Full,
            ffi_sys::SQLITE_CANTOPEN => Self::CantOpen,
            ffi_sys::SQLITE_PROTOCOL => Self::Protocol,
            ffi_sys::SQLITE_EMPTY => Self::Empty,
            ffi_sys::SQLITE_SCHEMA => Self::Schema,
            ffi_sys::SQLITE_TOOBIG => Self::TooBig,
            ffi_sys::SQLITE_CONSTRAINT => Self::Constraint,
            ffi_sys::SQLITE_MISMATCH => Self::Mismatch,
            ffi_sys::SQLITE_MISUSE => Self::Misuse,
            ffi_sys::SQLITE_NOLFS => Self::NoLfs,
            ffi_sys::SQLITE_AUTH => Self::Auth,
            ffi_sys::SQLITE_FORMAT => Self::Format,
            ffi_sys::SQLITE_RANGE => Self::Range,
            ffi_sys::SQLITE_NOTADB => Self::NotADb,
            ffi_sys::SQLITE_NOTICE => Self::Notice,
            ffi_sys::SQLITE_WARNING => Self::Warning,
            _ => Self::Unknown(code),
        }
    }
}

/// An error returned from SQLite.
///
/// The primary code is decoded; the extended code is kept as SQLite's raw
/// integer so that callers can compare it with the `libsqlite3_sys` constants.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (code {extended})")]
pub struct SqliteError {
    primary: PrimaryErrCode,
    extended: i32,
    message: String,
}

impl SqliteError {
    /// Capture the most recent error recorded on a database handle.
    pub(crate) fn from_handle(db: *mut sqlite3) -> Self {
        let code = ffi::extended_errcode(db);
        let message = unsafe {
            let msg = ffi::errmsg(db);
            debug_assert!(!msg.is_null());
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        };

        Self::with_message(code, message)
    }

    /// Build an error from a bare result code, using SQLite's generic text for it.
    pub(crate) fn from_code(code: i32) -> Self {
        let message = unsafe {
            let msg = ffi::errstr(code);
            if msg.is_null() {
                format!("unknown error {code}")
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        };

        Self::with_message(code, message)
    }

    pub(crate) fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self {
            primary: PrimaryErrCode::from_code(code),
            extended: code,
            message: message.into(),
        }
    }

    pub fn primary_code(&self) -> PrimaryErrCode {
        self.primary
    }

    /// The extended result code, e.g. `SQLITE_CONSTRAINT_UNIQUE`.
    pub fn extended_code(&self) -> i32 {
        self.extended
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn is_locked_sharedcache(&self) -> bool {
        self.extended == ffi_sys::SQLITE_LOCKED_SHAREDCACHE
    }

    pub(crate) fn should_retry(&self) -> bool {
        matches!(self.primary, PrimaryErrCode::Locked | PrimaryErrCode::Busy)
    }
}
