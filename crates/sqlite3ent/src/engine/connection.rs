use std::ffi::CString;
use std::fmt::{self, Debug, Formatter};

use libsqlite3_sys::SQLITE_FCNTL_PERSIST_WAL;

use super::backup::Backup;
use super::handle::ConnectionHandle;
use super::statement::{self, StatementHandle};
use super::transaction::{EngineTx, TxLock};
use super::{EngineDriver, ffi};
use crate::driver::{Conn, EngineConn, ExecResult, Rows, Stmt, Tx};
use crate::logger::{LogSettings, QueryLogger};
use crate::{Error, Result, Value};

/// A connection to the embedded engine.
///
/// Dropping a connection that was never closed closes it.
pub struct EngineConnection {
    handle: Option<ConnectionHandle>,
    tx_lock: TxLock,
    log_settings: LogSettings,
}

impl EngineConnection {
    pub(super) fn new(handle: ConnectionHandle, tx_lock: TxLock, log_settings: LogSettings) -> Self {
        Self {
            handle: Some(handle),
            tx_lock,
            log_settings,
        }
    }

    pub(super) fn handle(&self) -> Result<&ConnectionHandle> {
        self.handle.as_ref().ok_or(Error::ConnectionClosed)
    }

    /// The `BEGIN` form used by [`Conn::begin`].
    pub fn tx_lock(&self) -> TxLock {
        self.tx_lock
    }

    /// A driver that opens further connections with the same logging settings.
    pub(super) fn sibling_driver(&self) -> EngineDriver {
        EngineDriver::new().log_settings(self.log_settings.clone())
    }

    fn statement(&self, sql: &str) -> Result<EngineStmt<'_>> {
        EngineStmt::new(self.handle()?, &self.log_settings, sql)
    }
}

impl Debug for EngineConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConnection")
            .field("open", &self.handle.is_some())
            .field("tx_lock", &self.tx_lock)
            .finish()
    }
}

impl Drop for EngineConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!("closing engine connection dropped while open");
            if let Err(e) = handle.close() {
                tracing::warn!("closing dropped connection failed: {}", e);
            }
        }
    }
}

impl Conn for EngineConnection {
    fn prepare(&self, sql: &str) -> Result<Box<dyn Stmt + '_>> {
        Ok(Box::new(self.statement(sql)?))
    }

    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.statement(sql)?.exec(args)
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Rows + '_>> {
        let mut stmt = self.statement(sql)?;
        let (index, logger) = stmt.start_query(args)?;
        let cursor = index.map(|i| Cursor::Owned(stmt.statements.swap_remove(i)));
        Ok(Box::new(EngineRows::new(cursor, logger)?))
    }

    fn begin(&self) -> Result<Box<dyn Tx + '_>> {
        Ok(Box::new(EngineTx::begin(self.handle()?, self.tx_lock)?))
    }

    fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }

    fn as_engine(&self) -> Option<&dyn EngineConn> {
        Some(self)
    }
}

impl EngineConn for EngineConnection {
    fn ping(&self) -> Result<()> {
        self.handle()?.exec("SELECT 1")
    }

    fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    fn reset_session(&self) -> Result<()> {
        self.handle().map(|_| ())
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        ffi::serialize(self.handle()?.as_ptr(), c"main")
            .ok_or_else(|| Error::Protocol("sqlite3_serialize returned no image".into()))
    }

    fn deserialize(&self, image: &[u8]) -> Result<()> {
        ffi::deserialize(self.handle()?.as_ptr(), c"main", image)?;
        Ok(())
    }

    fn new_backup(&self, dst_uri: &str) -> Result<Backup<'_>> {
        Backup::backup(self, dst_uri)
    }

    fn new_restore(&self, src_uri: &str) -> Result<Backup<'_>> {
        Backup::restore(self, src_uri)
    }

    fn file_control_persist_wal(&self, schema: &str, mode: i32) -> Result<i32> {
        let schema = CString::new(schema)
            .map_err(|_| Error::Protocol("schema name contains nul bytes".into()))?;
        let mut value = mode;
        ffi::file_control_int(
            self.handle()?.as_ptr(),
            &schema,
            SQLITE_FCNTL_PERSIST_WAL,
            &mut value,
        )?;
        Ok(value)
    }
}

/// A SQL string of zero or more statements.
///
/// Statements are prepared lazily as execution reaches them, because earlier
/// statements may create the tables later ones refer to. Once prepared they
/// are kept for reuse.
pub(crate) struct EngineStmt<'c> {
    handle: &'c ConnectionHandle,
    log_settings: &'c LogSettings,
    sql: String,
    statements: Vec<StatementHandle>,
    /// Byte offset of the text not yet prepared.
    unprepared: usize,
}

impl<'c> EngineStmt<'c> {
    fn new(handle: &'c ConnectionHandle, log_settings: &'c LogSettings, sql: &str) -> Result<Self> {
        let mut stmt = Self {
            handle,
            log_settings,
            sql: sql.to_owned(),
            statements: Vec::new(),
            unprepared: 0,
        };
        // Syntax errors in the first statement surface at prepare time.
        stmt.prepare_to(0)?;
        Ok(stmt)
    }

    /// Make sure statement `index` is prepared. Returns `false` when the SQL
    /// holds fewer statements.
    fn prepare_to(&mut self, index: usize) -> Result<bool> {
        while self.statements.len() <= index {
            let mut rest = &self.sql[self.unprepared..];
            let before = rest.len();
            let next = statement::prepare_next(self.handle.as_ptr(), &mut rest)?;
            self.unprepared += before - rest.len();

            match next {
                Some(stmt) => self.statements.push(stmt),
                None => {
                    self.unprepared = self.sql.len();
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn fully_prepared(&self) -> bool {
        self.sql[self.unprepared..].trim().is_empty()
    }

    fn logger(&self) -> Option<QueryLogger> {
        self.log_settings
            .is_enabled()
            .then(|| QueryLogger::new(self.sql.as_str(), self.log_settings.clone()))
    }

    /// Reset statement `index` and bind its share of `args`, starting at `*used`.
    fn bind(&mut self, index: usize, args: &[Value], used: &mut usize) -> Result<()> {
        let stmt = &mut self.statements[index];

        // reset reports the error of the previous run, which was already returned
        let _ = stmt.reset();
        stmt.clear_bindings();

        let end = *used + stmt.bind_parameter_count();
        let slice = args.get(*used..end).ok_or(Error::ArgumentCount {
            expected: end,
            given: args.len(),
        })?;
        stmt.bind_all(slice)?;
        *used = end;
        Ok(())
    }

    /// Step statement `index` until done and return the rows it changed.
    fn run_to_completion(
        &mut self,
        index: usize,
        logger: &mut Option<QueryLogger>,
    ) -> Result<u64> {
        let before = self.handle.total_changes();
        while self.statements[index].step()? {
            if let Some(logger) = logger.as_mut() {
                logger.inc_rows_returned();
            }
        }
        // sqlite3_changes keeps the count of the last INSERT, UPDATE or DELETE
        // through statements that change nothing, such as SELECT, PRAGMA or DDL.
        let affected = if self.handle.total_changes() == before {
            0
        } else {
            u64::try_from(self.handle.changes()).unwrap_or(0)
        };
        if let Some(logger) = logger.as_mut() {
            logger.inc_rows_affected(affected);
        }
        Ok(affected)
    }

    /// Run the statements that return no columns and bind the first one that
    /// does, returning its index. Text after that statement is not executed.
    fn start_query(&mut self, args: &[Value]) -> Result<(Option<usize>, Option<QueryLogger>)> {
        let mut logger = self.logger();
        let mut used = 0;
        let mut index = 0;
        let mut streamed = None;

        while self.prepare_to(index)? {
            self.bind(index, args, &mut used)?;
            if self.statements[index].column_count() > 0 {
                streamed = Some(index);
                break;
            }
            self.run_to_completion(index, &mut logger)?;
            index += 1;
        }

        if used != args.len() {
            return Err(Error::ArgumentCount {
                expected: used,
                given: args.len(),
            });
        }
        Ok((streamed, logger))
    }
}

impl Stmt for EngineStmt<'_> {
    /// `None` until every statement of a multi-statement string has been
    /// prepared, which happens on first execution.
    fn num_input(&self) -> Option<usize> {
        self.fully_prepared().then(|| {
            self.statements
                .iter()
                .map(StatementHandle::bind_parameter_count)
                .sum()
        })
    }

    fn exec(&mut self, args: &[Value]) -> Result<ExecResult> {
        let mut logger = self.logger();
        let mut used = 0;
        let mut index = 0;
        let mut result = ExecResult::default();

        while self.prepare_to(index)? {
            self.bind(index, args, &mut used)?;
            let affected = self.run_to_completion(index, &mut logger)?;
            result = ExecResult::new(affected, self.handle.last_insert_rowid());
            index += 1;
        }

        if used != args.len() {
            return Err(Error::ArgumentCount {
                expected: used,
                given: args.len(),
            });
        }
        Ok(result)
    }

    fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows + '_>> {
        let (index, logger) = self.start_query(args)?;
        let cursor = index.map(|i| Cursor::Borrowed(&mut self.statements[i]));
        Ok(Box::new(EngineRows::new(cursor, logger)?))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

enum Cursor<'s> {
    Owned(StatementHandle),
    Borrowed(&'s mut StatementHandle),
}

impl Cursor<'_> {
    fn get(&mut self) -> &mut StatementHandle {
        match self {
            Cursor::Owned(stmt) => stmt,
            Cursor::Borrowed(stmt) => stmt,
        }
    }
}

/// Rows of a bound statement, stepped on demand.
pub(crate) struct EngineRows<'s> {
    cursor: Option<Cursor<'s>>,
    columns: Vec<String>,
    logger: Option<QueryLogger>,
}

impl<'s> EngineRows<'s> {
    fn new(mut cursor: Option<Cursor<'s>>, logger: Option<QueryLogger>) -> Result<Self> {
        let columns = match cursor.as_mut() {
            Some(cursor) => cursor.get().column_names()?,
            None => Vec::new(),
        };
        Ok(Self {
            cursor,
            columns,
            logger,
        })
    }
}

impl Rows for EngineRows<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let stmt = cursor.get();
        match stmt.step() {
            Ok(true) => {
                if let Some(logger) = self.logger.as_mut() {
                    logger.inc_rows_returned();
                }
                stmt.row().map(Some)
            }
            Ok(false) => {
                // Stepping a finished statement again would restart it.
                self.release();
                Ok(None)
            }
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }
}

impl EngineRows<'_> {
    fn release(&mut self) {
        if let Some(Cursor::Borrowed(stmt)) = self.cursor.take() {
            let _ = stmt.reset();
        }
    }
}

impl Drop for EngineRows<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
