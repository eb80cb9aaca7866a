// Safe wrappers around the libsqlite3_sys functions used by the engine.
// These wrappers centralize the `unsafe` blocks needed when calling into
// the SQLite C API so that the rest of the engine can remain safe.

use std::ffi::{CStr, c_void};
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use libsqlite3_sys::{self as ffi_sys, sqlite3, sqlite3_backup, sqlite3_stmt};

use super::error::SqliteError;

// A compile-time assertion to ensure that `c_int` is 32 bits.
const _ASSERT_C_INT_32BIT: () = assert!(std::mem::size_of::<c_int>() == 4);

fn check(db: *mut sqlite3, rc: c_int) -> Result<(), SqliteError> {
    if rc == ffi_sys::SQLITE_OK {
        Ok(())
    } else {
        Err(SqliteError::from_handle(db))
    }
}

fn check_stmt(stmt: *mut sqlite3_stmt, rc: c_int) -> Result<(), SqliteError> {
    check(db_handle(stmt), rc)
}

/// Wrapper around [`sqlite3_open_v2`].
///
/// On failure any partially opened handle is closed after its error message
/// has been captured. A null handle means SQLite could not allocate memory.
pub(crate) fn open_v2(
    filename: &CStr,
    flags: i32,
    vfs: Option<&CStr>,
) -> Result<NonNull<sqlite3>, SqliteError> {
    let mut db: *mut sqlite3 = ptr::null_mut();
    let vfs = vfs.map_or(ptr::null(), CStr::as_ptr);
    let rc = unsafe { ffi_sys::sqlite3_open_v2(filename.as_ptr(), &mut db, flags, vfs) };

    match NonNull::new(db) {
        Some(handle) if rc == ffi_sys::SQLITE_OK => Ok(handle),
        Some(handle) => {
            let err = SqliteError::from_handle(handle.as_ptr());
            unsafe {
                ffi_sys::sqlite3_close(handle.as_ptr());
            }
            Err(err)
        }
        None => Err(SqliteError::from_code(ffi_sys::SQLITE_NOMEM)),
    }
}

/// Wrapper around [`sqlite3_close`].
pub(crate) fn close(db: *mut sqlite3) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_close(db) };
    check(db, rc)
}

/// Wrapper around [`sqlite3_extended_result_codes`].
pub(crate) fn extended_result_codes(db: *mut sqlite3, onoff: bool) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_extended_result_codes(db, c_int::from(onoff)) };
    check(db, rc)
}

/// Wrapper around [`sqlite3_prepare_v3`].
pub(crate) fn prepare_v3(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: i32,
    flags: u32,
    stmt: *mut *mut sqlite3_stmt,
    tail: *mut *const c_char,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_prepare_v3(db, sql, n_byte, flags, stmt, tail) };
    check(db, rc)
}

/// Wrapper around [`sqlite3_unlock_notify`].
pub(crate) fn unlock_notify(
    db: *mut sqlite3,
    callback: Option<unsafe extern "C" fn(*mut *mut c_void, c_int)>,
    arg: *mut c_void,
) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_unlock_notify(db, callback, arg) };
    check(db, rc)
}

/// Wrapper around [`sqlite3_exec`] with no callback.
pub(crate) fn exec(db: *mut sqlite3, sql: &CStr) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_exec(db, sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
    };
    check(db, rc)
}

/// Wrapper around [`sqlite3_extended_errcode`].
pub(crate) fn extended_errcode(db: *mut sqlite3) -> i32 {
    unsafe { ffi_sys::sqlite3_extended_errcode(db) }
}

/// Wrapper around [`sqlite3_errmsg`].
pub(crate) fn errmsg(db: *mut sqlite3) -> *const c_char {
    unsafe { ffi_sys::sqlite3_errmsg(db) }
}

/// Wrapper around [`sqlite3_errstr`].
pub(crate) fn errstr(code: i32) -> *const c_char {
    unsafe { ffi_sys::sqlite3_errstr(code) }
}

/// Wrapper around [`sqlite3_last_insert_rowid`].
pub(crate) fn last_insert_rowid(db: *mut sqlite3) -> i64 {
    unsafe { ffi_sys::sqlite3_last_insert_rowid(db) }
}

/// Wrapper around [`sqlite3_changes64`].
pub(crate) fn changes(db: *mut sqlite3) -> i64 {
    unsafe { ffi_sys::sqlite3_changes64(db) }
}

/// Wrapper around [`sqlite3_total_changes64`].
pub(crate) fn total_changes(db: *mut sqlite3) -> i64 {
    unsafe { ffi_sys::sqlite3_total_changes64(db) }
}

/// Wrapper around [`sqlite3_get_autocommit`].
pub(crate) fn get_autocommit(db: *mut sqlite3) -> bool {
    unsafe { ffi_sys::sqlite3_get_autocommit(db) != 0 }
}

/// Wrapper around [`sqlite3_db_handle`].
pub(crate) fn db_handle(stmt: *mut sqlite3_stmt) -> *mut sqlite3 {
    unsafe { ffi_sys::sqlite3_db_handle(stmt) }
}

/// Wrapper around [`sqlite3_column_count`].
pub(crate) fn column_count(stmt: *mut sqlite3_stmt) -> i32 {
    unsafe { ffi_sys::sqlite3_column_count(stmt) }
}

/// Wrapper around [`sqlite3_column_name`]. Returns a pointer to a null terminated string.
pub(crate) fn column_name(stmt: *mut sqlite3_stmt, index: i32) -> *const c_char {
    unsafe { ffi_sys::sqlite3_column_name(stmt, index) }
}

/// Wrapper around [`sqlite3_bind_parameter_count`].
pub(crate) fn bind_parameter_count(stmt: *mut sqlite3_stmt) -> i32 {
    unsafe { ffi_sys::sqlite3_bind_parameter_count(stmt) }
}

/// Wrapper around [`sqlite3_bind_blob64`].
pub(crate) fn bind_blob64(stmt: *mut sqlite3_stmt, index: i32, v: &[u8]) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_bind_blob64(
            stmt,
            index,
            v.as_ptr() as *const c_void,
            v.len() as u64,
            ffi_sys::SQLITE_TRANSIENT(),
        )
    };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_bind_text64`].
pub(crate) fn bind_text64(stmt: *mut sqlite3_stmt, index: i32, v: &str) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_bind_text64(
            stmt,
            index,
            v.as_ptr() as *const c_char,
            v.len() as u64,
            ffi_sys::SQLITE_TRANSIENT(),
            ffi_sys::SQLITE_UTF8 as u8,
        )
    };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_bind_int64`].
pub(crate) fn bind_int64(stmt: *mut sqlite3_stmt, index: i32, v: i64) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_int64(stmt, index, v) };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_bind_double`].
pub(crate) fn bind_double(stmt: *mut sqlite3_stmt, index: i32, v: f64) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_double(stmt, index, v) };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_bind_null`].
pub(crate) fn bind_null(stmt: *mut sqlite3_stmt, index: i32) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_bind_null(stmt, index) };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_column_type`].
pub(crate) fn column_type(stmt: *mut sqlite3_stmt, index: i32) -> i32 {
    unsafe { ffi_sys::sqlite3_column_type(stmt, index) }
}

/// Wrapper around [`sqlite3_column_int64`].
pub(crate) fn column_int64(stmt: *mut sqlite3_stmt, index: i32) -> i64 {
    unsafe { ffi_sys::sqlite3_column_int64(stmt, index) }
}

/// Wrapper around [`sqlite3_column_double`].
pub(crate) fn column_double(stmt: *mut sqlite3_stmt, index: i32) -> f64 {
    unsafe { ffi_sys::sqlite3_column_double(stmt, index) }
}

/// Wrapper around [`sqlite3_column_blob`].
pub(crate) fn column_blob(stmt: *mut sqlite3_stmt, index: i32) -> *const c_void {
    unsafe { ffi_sys::sqlite3_column_blob(stmt, index) }
}

/// Wrapper around [`sqlite3_column_text`].
pub(crate) fn column_text(stmt: *mut sqlite3_stmt, index: i32) -> *const u8 {
    unsafe { ffi_sys::sqlite3_column_text(stmt, index) }
}

/// Wrapper around [`sqlite3_column_bytes`].
pub(crate) fn column_bytes(stmt: *mut sqlite3_stmt, index: i32) -> i32 {
    unsafe { ffi_sys::sqlite3_column_bytes(stmt, index) }
}

/// Wrapper around [`sqlite3_clear_bindings`].
pub(crate) fn clear_bindings(stmt: *mut sqlite3_stmt) {
    unsafe { ffi_sys::sqlite3_clear_bindings(stmt) };
}

/// Wrapper around [`sqlite3_reset`].
pub(crate) fn reset(stmt: *mut sqlite3_stmt) -> Result<(), SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_reset(stmt) };
    check_stmt(stmt, rc)
}

/// Wrapper around [`sqlite3_step`]. A shared-cache lock is returned to the
/// caller so that it can wait on an unlock notification.
pub(crate) fn step(stmt: *mut sqlite3_stmt) -> Result<i32, SqliteError> {
    let rc = unsafe { ffi_sys::sqlite3_step(stmt) };
    match rc {
        ffi_sys::SQLITE_ROW | ffi_sys::SQLITE_DONE | ffi_sys::SQLITE_LOCKED_SHAREDCACHE => Ok(rc),
        _ => Err(SqliteError::from_handle(db_handle(stmt))),
    }
}

/// Wrapper around [`sqlite3_finalize`]. Returns the raw result code.
pub(crate) fn finalize(stmt: *mut sqlite3_stmt) -> i32 {
    unsafe { ffi_sys::sqlite3_finalize(stmt) }
}

/// Wrapper around [`sqlite3_backup_init`]. Errors are reported on `dest`.
pub(crate) fn backup_init(
    dest: *mut sqlite3,
    dest_name: &CStr,
    source: *mut sqlite3,
    source_name: &CStr,
) -> Result<NonNull<sqlite3_backup>, SqliteError> {
    let backup = unsafe {
        ffi_sys::sqlite3_backup_init(dest, dest_name.as_ptr(), source, source_name.as_ptr())
    };
    NonNull::new(backup).ok_or_else(|| SqliteError::from_handle(dest))
}

/// Wrapper around [`sqlite3_backup_step`]. Returns the raw result code.
pub(crate) fn backup_step(backup: *mut sqlite3_backup, pages: i32) -> i32 {
    unsafe { ffi_sys::sqlite3_backup_step(backup, pages) }
}

/// Wrapper around [`sqlite3_backup_finish`]. Returns the raw result code.
pub(crate) fn backup_finish(backup: *mut sqlite3_backup) -> i32 {
    unsafe { ffi_sys::sqlite3_backup_finish(backup) }
}

/// Wrapper around [`sqlite3_backup_remaining`].
pub(crate) fn backup_remaining(backup: *mut sqlite3_backup) -> i32 {
    unsafe { ffi_sys::sqlite3_backup_remaining(backup) }
}

/// Wrapper around [`sqlite3_backup_pagecount`].
pub(crate) fn backup_pagecount(backup: *mut sqlite3_backup) -> i32 {
    unsafe { ffi_sys::sqlite3_backup_pagecount(backup) }
}

/// Wrapper around [`sqlite3_serialize`]. Copies the image of `schema` into a
/// Rust-owned buffer and releases the SQLite allocation.
pub(crate) fn serialize(db: *mut sqlite3, schema: &CStr) -> Option<Vec<u8>> {
    let mut size: ffi_sys::sqlite3_int64 = 0;
    let data = unsafe { ffi_sys::sqlite3_serialize(db, schema.as_ptr(), &mut size, 0) };
    if data.is_null() {
        return None;
    }

    let bytes = unsafe { std::slice::from_raw_parts(data, size as usize).to_vec() };
    unsafe { ffi_sys::sqlite3_free(data as *mut c_void) };
    Some(bytes)
}

/// Wrapper around [`sqlite3_deserialize`]. The image is copied into memory
/// obtained from `sqlite3_malloc64`, which SQLite takes ownership of.
pub(crate) fn deserialize(db: *mut sqlite3, schema: &CStr, image: &[u8]) -> Result<(), SqliteError> {
    let len = image.len();
    let buf = unsafe { ffi_sys::sqlite3_malloc64(len.max(1) as u64) } as *mut u8;
    if buf.is_null() {
        return Err(SqliteError::from_code(ffi_sys::SQLITE_NOMEM));
    }
    unsafe { ptr::copy_nonoverlapping(image.as_ptr(), buf, len) };

    let flags =
        ffi_sys::SQLITE_DESERIALIZE_FREEONCLOSE | ffi_sys::SQLITE_DESERIALIZE_RESIZEABLE;
    let rc = unsafe {
        ffi_sys::sqlite3_deserialize(
            db,
            schema.as_ptr(),
            buf,
            len as ffi_sys::sqlite3_int64,
            len as ffi_sys::sqlite3_int64,
            flags as u32,
        )
    };
    // SQLite frees the buffer itself on failure when FREEONCLOSE is set.
    check(db, rc)
}

/// Wrapper around [`sqlite3_file_control`] for operations taking an `int` argument.
pub(crate) fn file_control_int(
    db: *mut sqlite3,
    schema: &CStr,
    op: i32,
    value: &mut c_int,
) -> Result<(), SqliteError> {
    let rc = unsafe {
        ffi_sys::sqlite3_file_control(db, schema.as_ptr(), op, value as *mut c_int as *mut c_void)
    };
    if rc == ffi_sys::SQLITE_OK {
        Ok(())
    } else {
        // file_control does not record its result code on the handle
        Err(SqliteError::from_code(rc))
    }
}
