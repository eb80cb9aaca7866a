use std::path::PathBuf;

use sqlite3ent::{Conn, Driver, Sqlite3Driver, Value};
use tempdir::TempDir;

const TEST_SCHEMA: &str = include_str!("setup.sql");

pub fn setup_if_needed() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open an in-memory database through [`Sqlite3Driver`], with `query` as the
/// connection-string query.
pub fn connection(query: &str) -> anyhow::Result<Box<dyn Conn>> {
    setup_if_needed();
    Ok(Sqlite3Driver::new().open(&memory_dsn(query))?)
}

/// Return a connection to a database pre-configured with our test schema.
pub fn tdb() -> anyhow::Result<Box<dyn Conn>> {
    let conn = connection("_fk=1")?;
    conn.exec(TEST_SCHEMA, &[])?;
    Ok(conn)
}

pub fn memory_dsn(query: &str) -> String {
    if query.is_empty() {
        ":memory:".to_owned()
    } else {
        format!(":memory:?{query}")
    }
}

/// A database file in a temporary directory that is removed on drop.
pub struct TempDb {
    _dir: TempDir,
    path: PathBuf,
}

impl TempDb {
    pub fn new() -> anyhow::Result<Self> {
        setup_if_needed();
        let dir = TempDir::new("sqlite3ent")?;
        let path = dir.path().join("test.db");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &str {
        self.path.to_str().unwrap()
    }

    /// Plain-path DSN with `query` attached.
    pub fn dsn(&self, query: &str) -> String {
        if query.is_empty() {
            self.path().to_owned()
        } else {
            format!("{}?{query}", self.path())
        }
    }

    /// `file:` URI DSN with `query` attached.
    pub fn uri(&self, query: &str) -> String {
        format!("file:{}", self.dsn(query))
    }
}

/// Read the current value of `PRAGMA name`.
pub fn pragma(conn: &dyn Conn, name: &str) -> anyhow::Result<Value> {
    let mut rows = conn.query(&format!("PRAGMA {name}"), &[])?;
    let row = rows
        .next()?
        .ok_or_else(|| anyhow::anyhow!("PRAGMA {name} returned no rows"))?;
    Ok(row.into_iter().next().unwrap_or(Value::Null))
}

/// Collect every row of `sql`.
pub fn rows(conn: &dyn Conn, sql: &str, args: &[Value]) -> anyhow::Result<Vec<Vec<Value>>> {
    let mut rows = conn.query(sql, args)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row);
    }
    Ok(out)
}
