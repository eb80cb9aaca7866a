use std::ffi::c_void;
use std::slice;
use std::sync::{Condvar, Mutex, PoisonError};

use libsqlite3_sys::{SQLITE_LOCKED, sqlite3, sqlite3_stmt};

use super::error::{PrimaryErrCode, SqliteError};
use super::ffi;
use crate::error::{Error, Result};

/// Number of times [`wait`] resets a blocking statement before giving up.
pub(crate) const MAX_RETRIES: usize = 5;

// Wait for unlock notification (https://www.sqlite.org/unlock_notify.html)
// If `stmt` is provided it is reset and the registration retried when SQLite
// reports a deadlock.
pub(crate) fn wait(conn: *mut sqlite3, stmt: Option<*mut sqlite3_stmt>) -> Result<()> {
    let notify = Notify::new();
    let mut attempts = 0;

    loop {
        match ffi::unlock_notify(
            conn,
            Some(unlock_notify_cb),
            &notify as *const Notify as *mut c_void,
        ) {
            Ok(()) => break,
            Err(e) if e.primary_code() == PrimaryErrCode::Locked => {
                let Some(stmt) = stmt else {
                    return Err(Error::Sqlite(SqliteError::with_message(
                        SQLITE_LOCKED,
                        "sqlite3_unlock_notify detected a deadlock",
                    )));
                };

                let _ = ffi::reset(stmt);
                attempts += 1;
                if attempts > MAX_RETRIES {
                    return Err(Error::UnlockNotify);
                }
            }
            Err(e) => return Err(Error::Sqlite(e)),
        }
    }

    notify.wait();

    Ok(())
}

unsafe extern "C" fn unlock_notify_cb(ptr: *mut *mut c_void, len: i32) {
    let ptr = ptr as *mut *mut Notify;
    let slice = unsafe { slice::from_raw_parts(ptr, len as usize) };

    for &notify_ptr in slice {
        unsafe { (*notify_ptr).fire() };
    }
}

struct Notify {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl Notify {
    fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let guard = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        drop(
            self.condvar
                .wait_while(guard, |fired| !*fired)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    fn fire(&self) {
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        *fired = true;
        self.condvar.notify_one();
    }
}
