//! The driver contract shared by every backend.
//!
//! A [`Driver`] opens [`Conn`]ections from a connection string. Statements,
//! row cursors and transactions borrow their connection, so the borrow checker
//! guarantees they are gone before [`Conn::close`] runs.
//!
//! Connections backed by the embedded engine additionally expose
//! [`EngineConn`] through [`Conn::as_engine`]. Generic code can check for it
//! and fall back gracefully when a driver does not provide it.

pub mod registry;

use crate::{Result, Value, engine::Backup};

/// Opens connections from a connection string.
pub trait Driver: Send + Sync {
    fn open(&self, dsn: &str) -> Result<Box<dyn Conn>>;
}

/// An open database connection.
pub trait Conn: Send {
    /// Prepare `sql`, which may hold several `;`-separated statements.
    fn prepare(&self, sql: &str) -> Result<Box<dyn Stmt + '_>>;

    /// Run every statement in `sql`, distributing `args` across their
    /// positional parameters in order.
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    /// Run `sql` up to its first statement that returns columns, and stream
    /// that statement's rows. Statements before it run to completion.
    fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Rows + '_>>;

    /// Start a transaction.
    fn begin(&self) -> Result<Box<dyn Tx + '_>>;

    /// Close the connection. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// The engine extension interface, if this connection provides one.
    fn as_engine(&self) -> Option<&dyn EngineConn> {
        None
    }
}

/// A prepared statement.
pub trait Stmt {
    /// Number of positional parameters the statement expects, or `None` when
    /// it cannot be known before the statement runs.
    fn num_input(&self) -> Option<usize>;

    fn exec(&mut self, args: &[Value]) -> Result<ExecResult>;

    fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows + '_>>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// A forward-only cursor over a result set.
pub trait Rows {
    fn columns(&self) -> &[String];

    /// The next row, or `None` once the result set is exhausted.
    fn next(&mut self) -> Result<Option<Vec<Value>>>;
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Tx {
    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub(crate) rows_affected: u64,
    pub(crate) last_insert_id: i64,
}

impl ExecResult {
    pub fn new(rows_affected: u64, last_insert_id: i64) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }
}

/// Extensions only the embedded engine provides.
pub trait EngineConn: Conn {
    /// Check that the connection is still usable by running a trivial statement.
    fn ping(&self) -> Result<()>;

    /// `false` once the connection has been closed.
    fn is_valid(&self) -> bool;

    /// Prepare the connection for reuse by a new session.
    fn reset_session(&self) -> Result<()>;

    /// Image of the `main` database.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Replace the `main` database with `image`.
    fn deserialize(&self, image: &[u8]) -> Result<()>;

    /// Start copying this database into the database at `dst_uri`.
    fn new_backup(&self, dst_uri: &str) -> Result<Backup<'_>>;

    /// Start copying the database at `src_uri` into this one.
    fn new_restore(&self, src_uri: &str) -> Result<Backup<'_>>;

    /// Query (`mode < 0`) or set the persistent WAL flag of `schema`,
    /// returning the flag's value afterwards.
    fn file_control_persist_wal(&self, schema: &str, mode: i32) -> Result<i32>;
}
