//! A SQLite driver that configures each connection from its connection string.
//!
//! Query parameters such as `_journal_mode=WAL` or `_fk=1` are validated when
//! a connection opens and applied as `PRAGMA` statements, in a fixed order,
//! before the connection is handed out.
//!
//! ```rust,no_run
//! use sqlite3ent::{Value, registry};
//!
//! sqlite3ent::init();
//! let conn = registry::open(sqlite3ent::DRIVER_NAME, "app.db?_journal=WAL&_fk=1")?;
//! conn.exec("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)", &[])?;
//! conn.exec("INSERT INTO kv VALUES (?, ?)", &["a".into(), Value::Null])?;
//! # Ok::<(), sqlite3ent::Error>(())
//! ```

#[macro_use]
mod enum_mode;

pub mod driver;
mod dsn;
pub mod engine;
mod error;
mod logger;
mod options;
mod sqlite3;
mod value;

pub use crate::{
    driver::{Conn, Driver, EngineConn, ExecResult, Rows, Stmt, Tx, registry},
    dsn::QueryParams,
    engine::{Backup, EngineConnection, EngineDriver, PrimaryErrCode, SqliteError, TxLock},
    error::{DecodeError, Error, Result},
    logger::{LogSettings, QUERY_TARGET},
    options::{
        AutoVacuum, ConnectionOptions, JournalMode, LockingMode, Pragma, SecureDelete,
        Synchronous,
    },
    sqlite3::{DRIVER_NAME, Sqlite3Driver, VERSION, init},
    value::Value,
};
