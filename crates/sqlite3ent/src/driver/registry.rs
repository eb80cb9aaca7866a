//! Process-wide table of named drivers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{Conn, Driver};
use crate::{Error, Result};

type Drivers = RwLock<HashMap<String, Arc<dyn Driver>>>;

fn drivers_table() -> &'static Drivers {
    static DRIVERS: OnceLock<Drivers> = OnceLock::new();
    DRIVERS.get_or_init(Default::default)
}

/// Make `driver` available under `name`.
pub fn register(name: &str, driver: impl Driver + 'static) -> Result<()> {
    let mut drivers = drivers_table()
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    if drivers.contains_key(name) {
        return Err(Error::DuplicateDriver(name.to_owned()));
    }

    tracing::debug!(driver = name, "registered driver");
    drivers.insert(name.to_owned(), Arc::new(driver));
    Ok(())
}

/// Open a connection through the driver registered under `name`.
pub fn open(name: &str, dsn: &str) -> Result<Box<dyn Conn>> {
    let driver = drivers_table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownDriver(name.to_owned()))?;

    driver.open(dsn)
}

/// Sorted names of every registered driver.
pub fn drivers() -> Vec<String> {
    let mut names: Vec<String> = drivers_table()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}
