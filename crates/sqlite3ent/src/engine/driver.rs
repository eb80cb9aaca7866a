use std::ffi::CString;
use std::io;
use std::time::Duration;

use libsqlite3_sys::{
    SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
};
use log::LevelFilter;

use super::connection::EngineConnection;
use super::error::PrimaryErrCode;
use super::ffi;
use super::handle::ConnectionHandle;
use super::transaction::TxLock;
use crate::driver::{Conn, Driver};
use crate::dsn::{self, QueryParams};
use crate::logger::LogSettings;
use crate::{Error, Result};

/// The embedded SQLite engine as a [`Driver`].
///
/// Besides SQLite's own URI parameters (for `file:` names), the engine reads
/// these connection-string keys itself:
///
/// * `vfs`: name of the VFS to open the database with.
/// * `_pragma`: repeatable, each value `name(value)` runs as `PRAGMA name(value)`
///   right after the database opens.
/// * `_txlock`: `deferred` (default), `immediate` or `exclusive`, the `BEGIN`
///   form used for transactions.
///
/// Other keys are ignored.
#[derive(Clone, Debug, Default)]
pub struct EngineDriver {
    log_settings: LogSettings,
}

impl EngineDriver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn log_statements(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_statements(level);
        self
    }

    #[must_use]
    pub fn log_slow_statements(mut self, level: LevelFilter, duration: Duration) -> Self {
        self.log_settings.log_slow_statements(level, duration);
        self
    }

    #[must_use]
    pub fn log_settings(mut self, settings: LogSettings) -> Self {
        self.log_settings = settings;
        self
    }

    /// Open a connection and return it as the concrete engine type.
    pub fn open_engine(&self, dsn: &str) -> Result<EngineConnection> {
        let params = OpenParams::from_dsn(dsn)?;
        let handle = params.establish()?;
        tracing::trace!(filename = ?params.filename, "opened engine connection");
        Ok(EngineConnection::new(
            handle,
            params.tx_lock,
            self.log_settings.clone(),
        ))
    }
}

impl Driver for EngineDriver {
    fn open(&self, dsn: &str) -> Result<Box<dyn Conn>> {
        Ok(Box::new(self.open_engine(dsn)?))
    }
}

/// Everything needed to call `sqlite3_open_v2`, derived from a DSN.
#[derive(Debug)]
struct OpenParams {
    filename: CString,
    flags: i32,
    vfs: Option<CString>,
    pragmas: Vec<String>,
    tx_lock: TxLock,
}

impl OpenParams {
    fn from_dsn(dsn: &str) -> Result<Self> {
        let (path, query) = dsn::split_dsn(dsn);
        let params = match query {
            Some(query) => QueryParams::parse(query)?,
            None => QueryParams::default(),
        };

        // `file:` URIs carry their query to SQLite, which reads its own
        // parameters from it. Plain paths lose the query.
        let filename = if dsn.starts_with("file:") { dsn } else { path };
        let filename = nul_free(filename, "filename")?;

        let vfs = match params.get("vfs") {
            "" => None,
            name => Some(nul_free(name, "vfs name")?),
        };

        let pragmas = params
            .get_all("_pragma")
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| format!("PRAGMA {v}"))
            .collect();

        let tx_lock = match params.get("_txlock") {
            "" => TxLock::default(),
            value => dsn::parse_enum("_txlock", value)?,
        };

        Ok(Self {
            filename,
            flags: SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_FULLMUTEX | SQLITE_OPEN_URI,
            vfs,
            pragmas,
            tx_lock,
        })
    }

    /// Establish a new SQLite connection.
    fn establish(&self) -> Result<ConnectionHandle> {
        // <https://www.sqlite.org/c3ref/open.html>
        let handle = match ffi::open_v2(&self.filename, self.flags, self.vfs.as_deref()) {
            Ok(ptr) => ConnectionHandle::new(ptr),
            Err(e) if e.primary_code() == PrimaryErrCode::NoMem => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    "SQLite is unable to allocate memory to hold the sqlite3 object",
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // Enable extended result codes
        // https://www.sqlite.org/c3ref/extended_result_codes.html
        ffi::extended_result_codes(handle.as_ptr(), true)?;

        for pragma in &self.pragmas {
            handle.exec(pragma)?;
        }

        Ok(handle)
    }
}

fn nul_free(s: &str, what: &str) -> Result<CString> {
    CString::new(s).map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{what} passed to SQLite must not contain nul bytes"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_lose_their_query() -> anyhow::Result<()> {
        let params = OpenParams::from_dsn("test.db?_fk=1&cache=shared")?;
        assert_eq!(params.filename.to_str()?, "test.db");

        let params = OpenParams::from_dsn("file:test.db?mode=memory&_fk=1")?;
        assert_eq!(params.filename.to_str()?, "file:test.db?mode=memory&_fk=1");

        let params = OpenParams::from_dsn("?odd.db")?;
        assert_eq!(params.filename.to_str()?, "?odd.db");
        Ok(())
    }

    #[test]
    fn engine_parameters() -> anyhow::Result<()> {
        let params = OpenParams::from_dsn(
            "x.db?vfs=unix-none&_pragma=cache_size(-200)&_pragma=&_pragma=foreign_keys(1)&_txlock=immediate",
        )?;
        assert_eq!(params.vfs.as_deref().map(|v| v.to_str()), Some(Ok("unix-none")));
        assert_eq!(
            params.pragmas,
            ["PRAGMA cache_size(-200)", "PRAGMA foreign_keys(1)"]
        );
        assert_eq!(params.tx_lock, TxLock::Immediate);

        let params = OpenParams::from_dsn("x.db")?;
        assert_eq!(params.vfs, None);
        assert!(params.pragmas.is_empty());
        assert_eq!(params.tx_lock, TxLock::Deferred);
        Ok(())
    }

    #[test]
    fn invalid_txlock() {
        let err = OpenParams::from_dsn("x.db?_txlock=eventually").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid _txlock: eventually, expecting value of 'DEFERRED IMMEDIATE EXCLUSIVE'"
        );
    }
}
