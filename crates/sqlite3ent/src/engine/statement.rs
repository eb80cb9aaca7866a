use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr::{NonNull, null, null_mut};

use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_DONE, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_LOCKED_SHAREDCACHE, SQLITE_NULL,
    SQLITE_OK, SQLITE_ROW, sqlite3, sqlite3_stmt,
};

use super::error::SqliteError;
use super::{ffi, unlock_notify};
use crate::{Error, Result, Value};

#[derive(Debug)]
pub(crate) struct StatementHandle(NonNull<sqlite3_stmt>);

// access to SQLite3 statement handles is safe to send between threads
// as long as the `sqlite3_step` call is serialized.

unsafe impl Send for StatementHandle {}

impl StatementHandle {
    fn as_ptr(&self) -> *mut sqlite3_stmt {
        self.0.as_ptr()
    }

    fn db_handle(&self) -> *mut sqlite3 {
        // https://sqlite.org/c3ref/db_handle.html
        ffi::db_handle(self.as_ptr())
    }

    pub(crate) fn column_count(&self) -> usize {
        ffi::column_count(self.as_ptr()) as usize
    }

    pub(crate) fn column_names(&self) -> Result<Vec<String>> {
        (0..self.column_count())
            .map(|index| {
                let name = ffi::column_name(self.as_ptr(), index as i32);
                if name.is_null() {
                    // only happens when SQLite fails to allocate the name
                    return Err(Error::Sqlite(SqliteError::from_handle(self.db_handle())));
                }
                let name = unsafe { CStr::from_ptr(name) };
                name.to_str()
                    .map(str::to_owned)
                    .map_err(|e| Error::Protocol(format!("column name is not UTF-8: {e}")))
            })
            .collect()
    }

    // Number Of SQL Parameters
    // https://www.sqlite.org/c3ref/bind_parameter_count.html

    pub(crate) fn bind_parameter_count(&self) -> usize {
        ffi::bind_parameter_count(self.as_ptr()) as usize
    }

    /// Bind `args` to parameters `1..=args.len()`.
    pub(crate) fn bind_all(&mut self, args: &[Value]) -> Result<()> {
        for (i, value) in args.iter().enumerate() {
            // NOTE: The first host parameter has an index of 1, not 0.
            let index = i as i32 + 1;
            let stmt = self.as_ptr();
            match value {
                Value::Null => ffi::bind_null(stmt, index),
                Value::Integer(v) => ffi::bind_int64(stmt, index, *v),
                Value::Real(v) => ffi::bind_double(stmt, index, *v),
                Value::Text(v) => ffi::bind_text64(stmt, index, v),
                Value::Blob(v) => ffi::bind_blob64(stmt, index, v),
            }?;
        }
        Ok(())
    }

    // result values from the query
    // https://www.sqlite.org/c3ref/column_blob.html

    fn column_value(&self, index: usize) -> Result<Value> {
        let stmt = self.as_ptr();
        let index = index as i32;

        Ok(match ffi::column_type(stmt, index) {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => Value::Integer(ffi::column_int64(stmt, index)),
            SQLITE_FLOAT => Value::Real(ffi::column_double(stmt, index)),
            SQLITE_BLOB => {
                let ptr = ffi::column_blob(stmt, index) as *const u8;
                let len = ffi::column_bytes(stmt, index) as usize;
                if ptr.is_null() {
                    Value::Blob(Vec::new())
                } else {
                    Value::Blob(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
                }
            }
            _ => {
                let ptr = ffi::column_text(stmt, index);
                let len = ffi::column_bytes(stmt, index) as usize;
                if ptr.is_null() {
                    Value::Text(String::new())
                } else {
                    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
        })
    }

    /// Read every column of the current row.
    pub(crate) fn row(&self) -> Result<Vec<Value>> {
        (0..self.column_count())
            .map(|i| self.column_value(i))
            .collect()
    }

    pub(crate) fn clear_bindings(&mut self) {
        ffi::clear_bindings(self.as_ptr());
    }

    pub(crate) fn reset(&mut self) -> Result<()> {
        ffi::reset(self.as_ptr())?;
        Ok(())
    }

    /// Advance to the next row. Returns `false` once the statement is done.
    pub(crate) fn step(&mut self) -> Result<bool> {
        loop {
            match ffi::step(self.as_ptr())? {
                SQLITE_ROW => return Ok(true),
                SQLITE_DONE => return Ok(false),
                SQLITE_LOCKED_SHAREDCACHE => {
                    // The shared cache is locked by another connection. Wait for unlock
                    // notification and try again.
                    unlock_notify::wait(self.db_handle(), Some(self.as_ptr()))?;
                    // https://www.sqlite.org/unlock_notify.html
                    let _ = ffi::reset(self.as_ptr());
                }
                rc => {
                    return Err(Error::Protocol(format!(
                        "unexpected sqlite3_step result {rc}"
                    )));
                }
            }
        }
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        let db = self.db_handle();

        // Reset before finalizing so that sqlite3_finalize does not report
        // the error of the last step a second time.
        let _ = ffi::reset(self.as_ptr());

        // https://sqlite.org/c3ref/finalize.html
        let status = ffi::finalize(self.as_ptr());
        if status != SQLITE_OK {
            tracing::error!("sqlite3_finalize failed: {}", SqliteError::from_handle(db));
        }
    }
}

/// Prepare the next statement of `query`, advancing it past the compiled text.
///
/// Returns `None` when only whitespace or comments remain.
pub(crate) fn prepare_next(conn: *mut sqlite3, query: &mut &str) -> Result<Option<StatementHandle>> {
    if query.len() > i32::MAX as usize {
        return Err(Error::Protocol(format!(
            "query string must be smaller than {} bytes",
            i32::MAX
        )));
    }

    while !query.trim().is_empty() {
        let mut statement_handle: *mut sqlite3_stmt = null_mut();
        let mut tail: *const c_char = null();

        let query_ptr = query.as_ptr() as *const c_char;
        let query_len = query.len() as i32;

        // <https://www.sqlite.org/c3ref/prepare.html>
        loop {
            match ffi::prepare_v3(
                conn,
                query_ptr,
                query_len,
                0,
                &mut statement_handle,
                &mut tail,
            ) {
                Ok(()) => break,
                Err(e) if e.should_retry() => {
                    unlock_notify::wait(conn, None)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // tail points to the first byte past the end of the statement that
        // was just compiled.
        let n = (tail as usize) - (query_ptr as usize);
        if n == 0 {
            return Ok(None);
        }

        *query = query
            .get(n..)
            .ok_or_else(|| Error::Protocol("statement tail is not a char boundary".into()))?;

        if let Some(handle) = NonNull::new(statement_handle) {
            return Ok(Some(StatementHandle(handle)));
        }
    }

    Ok(None)
}
