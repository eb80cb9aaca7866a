use std::fmt::{self, Display, Formatter, Write};

enum_mode! {
    /// Refer to [SQLite documentation] for the meaning of the auto-vacuum setting.
    ///
    /// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_auto_vacuum
    pub AutoVacuum {
        None => "NONE" | "0",
        Full => "FULL" | "1",
        Incremental => "INCREMENTAL" | "2",
    }
    default None
}

enum_mode! {
    /// Refer to [SQLite documentation] for the meaning of the database journaling mode.
    ///
    /// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_journal_mode
    pub JournalMode {
        Delete => "DELETE",
        Truncate => "TRUNCATE",
        Persist => "PERSIST",
        Memory => "MEMORY",
        Wal => "WAL",
        Off => "OFF",
    }
    default Delete
}

enum_mode! {
    /// Refer to [SQLite documentation] for the meaning of the connection locking mode.
    ///
    /// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_locking_mode
    pub LockingMode {
        Normal => "NORMAL",
        Exclusive => "EXCLUSIVE",
    }
    default Normal
}

enum_mode! {
    /// Refer to [SQLite documentation] for the meaning of the secure-delete setting.
    ///
    /// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_secure_delete
    pub SecureDelete {
        Off => "OFF" | "0" | "no" | "false",
        On => "ON" | "1" | "yes" | "true",
        Fast => "FAST",
    }
    default Off
}

enum_mode! {
    /// Refer to [SQLite documentation] for the meaning of various synchronous settings.
    ///
    /// [SQLite documentation]: https://www.sqlite.org/pragma.html#pragma_synchronous
    pub Synchronous {
        Off => "OFF" | "0",
        Normal => "NORMAL" | "1",
        Full => "FULL" | "2",
        Extra => "EXTRA" | "3",
    }
    default Normal
}

/// Literals accepted for boolean options, as `false` then `true` sets.
pub(crate) const FALSE_LITERALS: &[&str] = &["0", "no", "false", "off"];
pub(crate) const TRUE_LITERALS: &[&str] = &["1", "yes", "true", "on"];

/// Default [busy timeout](https://www.sqlite.org/pragma.html#pragma_busy_timeout) in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT: i64 = 5000;

/// Parse a boolean connection-string literal, ignoring ASCII case.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    if FALSE_LITERALS.iter().any(|l| s.eq_ignore_ascii_case(l)) {
        Some(false)
    } else if TRUE_LITERALS.iter().any(|l| s.eq_ignore_ascii_case(l)) {
        Some(true)
    } else {
        None
    }
}

/// Per-connection engine settings, applied as `PRAGMA` statements when a connection opens.
///
/// A field left as `None` produces no statement. `busy_timeout`, `locking_mode` and
/// `synchronous` are always applied.
///
/// Options are usually built from a connection string with
/// [`from_dsn`](Self::from_dsn), but every option also has a builder setter:
///
/// ```rust
/// use sqlite3ent::{ConnectionOptions, JournalMode};
///
/// let options = ConnectionOptions::new()
///     .journal_mode(JournalMode::Wal)
///     .foreign_keys(true)
///     .apply_query("_busy_timeout=250")?;
///
/// assert_eq!(options.busy_timeout, 250);
/// # Ok::<(), sqlite3ent::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConnectionOptions {
    pub auto_vacuum: Option<AutoVacuum>,
    pub busy_timeout: i64,
    pub case_sensitive_like: Option<bool>,
    pub defer_foreign_keys: Option<bool>,
    pub foreign_keys: Option<bool>,
    pub ignore_check_constraints: Option<bool>,
    pub journal_mode: Option<JournalMode>,
    pub locking_mode: LockingMode,
    pub query_only: Option<bool>,
    pub recursive_triggers: Option<bool>,
    /// `None` leaves the compile-time default of the engine in place.
    pub secure_delete: Option<SecureDelete>,
    pub synchronous: Synchronous,
    pub writable_schema: Option<bool>,
    pub cache_size: Option<i64>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionOptions {
    /// Construct `Self` with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            auto_vacuum: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            case_sensitive_like: None,
            defer_foreign_keys: None,
            foreign_keys: None,
            ignore_check_constraints: None,
            journal_mode: None,
            locking_mode: LockingMode::Normal,
            query_only: None,
            recursive_triggers: None,
            secure_delete: None,
            synchronous: Synchronous::Normal,
            writable_schema: None,
            cache_size: None,
        }
    }

    /// Sets the [auto_vacuum](https://www.sqlite.org/pragma.html#pragma_auto_vacuum) setting.
    ///
    /// For existing databases, a change to this value does not take effect unless a
    /// [`VACUUM` command](https://www.sqlite.org/lang_vacuum.html) is executed.
    #[must_use]
    pub fn auto_vacuum(mut self, auto_vacuum: AutoVacuum) -> Self {
        self.auto_vacuum = Some(auto_vacuum);
        self
    }

    /// Sets the time, in milliseconds, to wait on a locked database before failing.
    ///
    /// The default busy timeout is 5 seconds.
    #[must_use]
    pub fn busy_timeout(mut self, millis: i64) -> Self {
        self.busy_timeout = millis;
        self
    }

    #[must_use]
    pub fn case_sensitive_like(mut self, on: bool) -> Self {
        self.case_sensitive_like = Some(on);
        self
    }

    #[must_use]
    pub fn defer_foreign_keys(mut self, on: bool) -> Self {
        self.defer_foreign_keys = Some(on);
        self
    }

    /// Set the enforcement of [foreign key constraints](https://www.sqlite.org/pragma.html#pragma_foreign_keys).
    #[must_use]
    pub fn foreign_keys(mut self, on: bool) -> Self {
        self.foreign_keys = Some(on);
        self
    }

    #[must_use]
    pub fn ignore_check_constraints(mut self, on: bool) -> Self {
        self.ignore_check_constraints = Some(on);
        self
    }

    /// Sets the [journal mode](https://www.sqlite.org/pragma.html#pragma_journal_mode).
    ///
    /// Selecting [`JournalMode::Wal`] also resets `synchronous` to NORMAL, which is
    /// all one needs for durability in WAL mode. Set `synchronous` afterwards to
    /// override it.
    #[must_use]
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        if mode == JournalMode::Wal {
            self.synchronous = Synchronous::Normal;
        }
        self.journal_mode = Some(mode);
        self
    }

    /// Sets the [locking mode](https://www.sqlite.org/pragma.html#pragma_locking_mode).
    ///
    /// The default locking mode is NORMAL.
    #[must_use]
    pub fn locking_mode(mut self, mode: LockingMode) -> Self {
        self.locking_mode = mode;
        self
    }

    #[must_use]
    pub fn query_only(mut self, on: bool) -> Self {
        self.query_only = Some(on);
        self
    }

    #[must_use]
    pub fn recursive_triggers(mut self, on: bool) -> Self {
        self.recursive_triggers = Some(on);
        self
    }

    #[must_use]
    pub fn secure_delete(mut self, mode: SecureDelete) -> Self {
        self.secure_delete = Some(mode);
        self
    }

    /// Sets the [synchronous](https://www.sqlite.org/pragma.html#pragma_synchronous) setting.
    ///
    /// The default is NORMAL.
    #[must_use]
    pub fn synchronous(mut self, synchronous: Synchronous) -> Self {
        self.synchronous = synchronous;
        self
    }

    #[must_use]
    pub fn writable_schema(mut self, on: bool) -> Self {
        self.writable_schema = Some(on);
        self
    }

    /// Sets the suggested [page cache size](https://sqlite.org/pragma.html#pragma_cache_size).
    ///
    /// Negative values are a size in KiB rather than a page count.
    #[must_use]
    pub fn cache_size(mut self, size: i64) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// The configuration statements for these options, in the order they must run.
    pub fn pragmas(&self) -> Vec<Pragma> {
        let mut pragmas = Vec::with_capacity(8);
        let mut push = |name: &'static str, value: String| pragmas.push(Pragma { name, value });

        push("busy_timeout", self.busy_timeout.to_string());

        // auto_vacuum must run before any table is created.
        if let Some(v) = self.auto_vacuum {
            push("auto_vacuum", v.to_string());
        }
        if let Some(v) = self.case_sensitive_like {
            push("case_sensitive_like", flag(v));
        }
        if let Some(v) = self.defer_foreign_keys {
            push("defer_foreign_keys", flag(v));
        }
        if let Some(v) = self.foreign_keys {
            push("foreign_keys", flag(v));
        }
        if let Some(v) = self.ignore_check_constraints {
            push("ignore_check_constraints", flag(v));
        }
        if let Some(v) = self.journal_mode {
            push("journal_mode", v.to_string());
        }
        push("locking_mode", self.locking_mode.to_string());
        if let Some(v) = self.query_only {
            push("query_only", flag(v));
        }
        if let Some(v) = self.recursive_triggers {
            push("recursive_triggers", flag(v));
        }
        if let Some(v) = self.secure_delete {
            push("secure_delete", v.to_string());
        }
        push("synchronous", self.synchronous.to_string());
        if let Some(v) = self.writable_schema {
            push("writable_schema", flag(v));
        }
        if let Some(v) = self.cache_size {
            push("cache_size", v.to_string());
        }

        pragmas
    }

    /// Collect all `PRAGMA` commands into a single string.
    pub fn pragma_string(&self) -> String {
        let mut string = String::new();
        for pragma in self.pragmas() {
            write!(string, "{pragma} ").ok();
        }
        string.truncate(string.trim_end().len());
        string
    }
}

fn flag(on: bool) -> String {
    String::from(if on { "1" } else { "0" })
}

/// A single `PRAGMA <name> = <value>;` configuration statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pragma {
    pub name: &'static str,
    pub value: String,
}

impl Display for Pragma {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PRAGMA {} = {};", self.name, self.value)
    }
}
