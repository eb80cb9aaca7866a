use std::ffi::CString;
use std::ptr::NonNull;

use libsqlite3_sys::sqlite3;

use super::{ffi, unlock_notify};
use crate::{Error, Result};

/// Managed handle to the raw SQLite3 database handle.
/// The database handle is closed when this is dropped.
#[derive(Debug)]
pub(crate) struct ConnectionHandle(NonNull<sqlite3>);

// A SQLite3 handle is safe to send between threads, provided not more than
// one is accessing it at the same time. The engine opens every handle with
// SQLITE_OPEN_FULLMUTEX and the owning connection is not `Sync`.

// <https://www.sqlite.org/c3ref/threadsafe.html>

unsafe impl Send for ConnectionHandle {}

impl ConnectionHandle {
    pub(super) fn new(ptr: NonNull<sqlite3>) -> Self {
        Self(ptr)
    }

    pub(crate) fn as_ptr(&self) -> *mut sqlite3 {
        self.0.as_ptr()
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        ffi::last_insert_rowid(self.as_ptr())
    }

    pub(crate) fn changes(&self) -> i64 {
        ffi::changes(self.as_ptr())
    }

    pub(crate) fn total_changes(&self) -> i64 {
        ffi::total_changes(self.as_ptr())
    }

    pub(crate) fn in_transaction(&self) -> bool {
        !ffi::get_autocommit(self.as_ptr())
    }

    /// Run one or more statements without arguments.
    pub(crate) fn exec(&self, query: &str) -> Result<()> {
        let query =
            CString::new(query).map_err(|_| Error::Protocol("query contains nul bytes".into()))?;

        loop {
            match ffi::exec(self.as_ptr(), &query) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_locked_sharedcache() => {
                    unlock_notify::wait(self.as_ptr(), None)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the handle, reporting SQLite's error instead of logging it.
    pub(crate) fn close(self) -> Result<()> {
        let ptr = self.as_ptr();
        std::mem::forget(self);
        ffi::close(ptr).map_err(Error::from)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        // https://sqlite.org/c3ref/close.html
        // Statements, rows and backups borrow the connection, so all of them
        // are finalized by the time the handle drops.
        if let Err(e) = ffi::close(self.as_ptr()) {
            tracing::error!("sqlite3_close failed: {}", e);
        }
    }
}
