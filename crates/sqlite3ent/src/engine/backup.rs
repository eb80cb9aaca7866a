use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::ptr::NonNull;

use libsqlite3_sys::{SQLITE_BUSY, SQLITE_DONE, SQLITE_LOCKED, SQLITE_OK, sqlite3_backup};

use super::connection::EngineConnection;
use super::error::SqliteError;
use super::ffi;
use crate::{Conn, Error, Result};

/// An online copy between this connection's `main` database and the `main`
/// database of a second connection opened from a URI.
///
/// Created by [`EngineConn::new_backup`](crate::EngineConn::new_backup) and
/// [`EngineConn::new_restore`](crate::EngineConn::new_restore). Dropping an
/// unfinished backup releases it.
///
/// <https://www.sqlite.org/backup.html>
pub struct Backup<'c> {
    raw: Option<NonNull<sqlite3_backup>>,
    other: Option<EngineConnection>,
    _conn: PhantomData<&'c EngineConnection>,
}

impl<'c> Backup<'c> {
    pub(super) fn backup(conn: &'c EngineConnection, dst_uri: &str) -> Result<Self> {
        let other = conn.sibling_driver().open_engine(dst_uri)?;
        let raw = ffi::backup_init(
            other.handle()?.as_ptr(),
            c"main",
            conn.handle()?.as_ptr(),
            c"main",
        )?;
        Ok(Self::new(raw, other))
    }

    pub(super) fn restore(conn: &'c EngineConnection, src_uri: &str) -> Result<Self> {
        let other = conn.sibling_driver().open_engine(src_uri)?;
        let raw = ffi::backup_init(
            conn.handle()?.as_ptr(),
            c"main",
            other.handle()?.as_ptr(),
            c"main",
        )?;
        Ok(Self::new(raw, other))
    }

    fn new(raw: NonNull<sqlite3_backup>, other: EngineConnection) -> Self {
        Self {
            raw: Some(raw),
            other: Some(other),
            _conn: PhantomData,
        }
    }

    /// Copy up to `pages` pages; a negative count copies everything that is
    /// left. Returns `true` while pages remain.
    ///
    /// A busy or locked source is not an error: nothing is copied and the
    /// call reports that pages remain.
    pub fn step(&mut self, pages: i32) -> Result<bool> {
        let Some(raw) = self.raw else {
            return Ok(false);
        };

        match ffi::backup_step(raw.as_ptr(), pages) {
            SQLITE_OK => Ok(true),
            SQLITE_DONE => Ok(false),
            rc if rc & 0xff == SQLITE_BUSY || rc & 0xff == SQLITE_LOCKED => Ok(true),
            rc => Err(SqliteError::from_code(rc).into()),
        }
    }

    /// Pages still to be copied, as of the last [`step`](Self::step).
    pub fn remaining(&self) -> i32 {
        self.raw.map_or(0, |raw| ffi::backup_remaining(raw.as_ptr()))
    }

    /// Total pages in the source database, as of the last [`step`](Self::step).
    pub fn page_count(&self) -> i32 {
        self.raw.map_or(0, |raw| ffi::backup_pagecount(raw.as_ptr()))
    }

    /// Release the backup. The error of a failed step is reported again here.
    pub fn finish(mut self) -> Result<()> {
        self.release()
    }

    /// Finish the backup and hand back the second connection: the copy for
    /// a backup, the source for a restore.
    pub fn commit(mut self) -> Result<Box<dyn Conn>> {
        self.release()?;
        let other = self
            .other
            .take()
            .ok_or(Error::ConnectionClosed)?;
        Ok(Box::new(other))
    }

    fn release(&mut self) -> Result<()> {
        let Some(raw) = self.raw.take() else {
            return Ok(());
        };

        match ffi::backup_finish(raw.as_ptr()) {
            SQLITE_OK => Ok(()),
            rc => Err(SqliteError::from_code(rc).into()),
        }
    }
}

impl Debug for Backup<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backup")
            .field("finished", &self.raw.is_none())
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl Drop for Backup<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("releasing abandoned backup failed: {}", e);
        }
    }
}
