use std::fmt::{self, Debug, Formatter};

use super::handle::ConnectionHandle;
use crate::{Result, driver::Tx};

enum_mode! {
    /// Locking behaviour of the `BEGIN` statement issued by [`Conn::begin`](crate::Conn::begin),
    /// selected with the `_txlock` connection-string parameter.
    pub TxLock {
        Deferred => "DEFERRED",
        Immediate => "IMMEDIATE",
        Exclusive => "EXCLUSIVE",
    }
    default Deferred
}

impl TxLock {
    pub(crate) fn begin_sql(&self) -> String {
        format!("BEGIN {}", self.as_str())
    }
}

/// An in-progress engine transaction.
///
/// A transaction should end with a call to [`Tx::commit`] or [`Tx::rollback`].
/// If neither is called before the transaction goes out of scope, it is
/// rolled back on `drop`.
pub(crate) struct EngineTx<'c> {
    handle: &'c ConnectionHandle,
    open: bool,
}

impl<'c> EngineTx<'c> {
    pub(crate) fn begin(handle: &'c ConnectionHandle, lock: TxLock) -> Result<Self> {
        handle.exec(&lock.begin_sql())?;
        Ok(Self { handle, open: true })
    }

    fn finish(mut self, sql: &str) -> Result<()> {
        self.open = false;
        // A failed COMMIT can leave the transaction open, in which case it
        // must still be rolled back.
        if let Err(e) = self.handle.exec(sql) {
            self.open = self.handle.in_transaction();
            return Err(e);
        }
        Ok(())
    }
}

impl Tx for EngineTx<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK")
    }
}

impl Debug for EngineTx<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineTx").field("open", &self.open).finish()
    }
}

impl Drop for EngineTx<'_> {
    fn drop(&mut self) {
        if self.open
            && self.handle.in_transaction()
            && let Err(e) = self.handle.exec("ROLLBACK")
        {
            tracing::warn!("rollback of abandoned transaction failed: {}", e);
        }
    }
}
