//! The embedded SQLite engine, bound through `libsqlite3-sys`.

mod backup;
mod connection;
mod driver;
pub mod error;
mod ffi;
mod handle;
mod statement;
mod transaction;
mod unlock_notify;

pub use backup::Backup;
pub use connection::EngineConnection;
pub use driver::EngineDriver;
pub use error::{PrimaryErrCode, SqliteError};
pub use transaction::TxLock;
