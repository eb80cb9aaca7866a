//! The registered driver: opens a connection and configures it from the DSN.

use std::sync::Once;

use crate::driver::{Conn, Driver, registry};
use crate::engine::EngineDriver;
use crate::options::ConnectionOptions;
use crate::Result;

/// Name the driver is registered under by [`init`].
///
/// Set the `SQLITE3ENT_DRIVER_NAME` environment variable at build time to
/// change it. An empty name disables registration.
pub const DRIVER_NAME: &str = match option_env!("SQLITE3ENT_DRIVER_NAME") {
    Some(name) => name,
    None => "sqlite3",
};

/// Version of this crate, `v<major>.<minor>.<patch>`.
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Register [`Sqlite3Driver`] under [`DRIVER_NAME`]. Calling this more than
/// once has no further effect.
pub fn init() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        if DRIVER_NAME.is_empty() {
            return;
        }
        if let Err(e) = registry::register(DRIVER_NAME, Sqlite3Driver::new()) {
            tracing::warn!("driver registration failed: {}", e);
        }
    });
}

/// A [`Driver`] that opens connections through an inner driver and then
/// applies the connection-string options as `PRAGMA` statements.
///
/// The DSN reaches the inner driver unmodified, so its own parameters keep
/// working. If the connection it returns does not implement
/// [`EngineConn`](crate::EngineConn), it is handed back as-is.
#[derive(Clone, Debug, Default)]
pub struct Sqlite3Driver<D = EngineDriver> {
    inner: D,
    base: ConnectionOptions,
}

impl Sqlite3Driver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Driver> Sqlite3Driver<D> {
    /// Open connections through `inner` instead of the embedded engine.
    pub fn with_driver(inner: D) -> Self {
        Self {
            inner,
            base: ConnectionOptions::new(),
        }
    }

    /// Start every connection from `base` rather than the defaults. Options in
    /// the DSN still take precedence.
    #[must_use]
    pub fn with_options(mut self, base: ConnectionOptions) -> Self {
        self.base = base;
        self
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.base
    }
}

impl<D: Driver> Driver for Sqlite3Driver<D> {
    fn open(&self, dsn: &str) -> Result<Box<dyn Conn>> {
        let options = self.base.clone().apply_dsn(dsn)?;

        let mut conn = self.inner.open(dsn)?;

        let Some(engine) = conn.as_engine() else {
            tracing::debug!("connection has no engine interface; skipping configuration");
            return Ok(conn);
        };

        let configured = options.pragmas().into_iter().try_for_each(|pragma| {
            tracing::debug!(pragma = pragma.name, value = %pragma.value, "applying pragma");
            engine.exec(&pragma.to_string(), &[]).map(|_| ())
        });

        if let Err(e) = configured {
            tracing::warn!("configuring connection failed: {}", e);
            let _ = conn.close();
            return Err(e);
        }

        Ok(conn)
    }
}
