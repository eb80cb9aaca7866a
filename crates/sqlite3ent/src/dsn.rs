//! Connection-string query parsing.
//!
//! A DSN has the shape `[file:]path[?key=value&...]`. Everything after the
//! first `?` is decoded as a URL query string and the recognized keys are
//! validated into [`ConnectionOptions`]. Unrecognized keys are ignored here;
//! the engine may still interpret them itself.

use std::borrow::Cow;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

use crate::{
    enum_mode::Literal,
    error::{Error, Result},
    options::{self, ConnectionOptions, FALSE_LITERALS, TRUE_LITERALS},
};

/// The connection options a DSN query can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OptionKey {
    AutoVacuum,
    BusyTimeout,
    CaseSensitiveLike,
    DeferForeignKeys,
    ForeignKeys,
    IgnoreCheckConstraints,
    JournalMode,
    LockingMode,
    QueryOnly,
    RecursiveTriggers,
    SecureDelete,
    Synchronous,
    WritableSchema,
    CacheSize,
}

/// Recognized query keys, in checking order.
///
/// When several keys of the same option are present, the one listed last wins.
/// Options are validated in the order their first key appears, so
/// `journal_mode` is always handled before `synchronous`.
pub(crate) const OPTION_KEYS: &[(&str, OptionKey)] = &[
    ("_auto_vacuum", OptionKey::AutoVacuum),
    ("_vacuum", OptionKey::AutoVacuum),
    ("_busy_timeout", OptionKey::BusyTimeout),
    ("_timeout", OptionKey::BusyTimeout),
    ("_case_sensitive_like", OptionKey::CaseSensitiveLike),
    ("_cslike", OptionKey::CaseSensitiveLike),
    ("_defer_foreign_keys", OptionKey::DeferForeignKeys),
    ("_defer_fk", OptionKey::DeferForeignKeys),
    ("_foreign_keys", OptionKey::ForeignKeys),
    ("_fk", OptionKey::ForeignKeys),
    ("_ignore_check_constraints", OptionKey::IgnoreCheckConstraints),
    ("_journal_mode", OptionKey::JournalMode),
    ("_journal", OptionKey::JournalMode),
    ("_locking_mode", OptionKey::LockingMode),
    ("_locking", OptionKey::LockingMode),
    ("_query_only", OptionKey::QueryOnly),
    ("_recursive_triggers", OptionKey::RecursiveTriggers),
    ("_rt", OptionKey::RecursiveTriggers),
    ("_secure_delete", OptionKey::SecureDelete),
    ("_synchronous", OptionKey::Synchronous),
    ("_sync", OptionKey::Synchronous),
    ("_writable_schema", OptionKey::WritableSchema),
    ("_cache_size", OptionKey::CacheSize),
];

/// Decoded query parameters. Keys keep their first-seen order and every value
/// of a repeated key is retained.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams(IndexMap<String, Vec<String>>);

impl QueryParams {
    /// Parse a URL query string (the part after `?`).
    pub fn parse(query: &str) -> Result<Self> {
        let mut params: IndexMap<String, Vec<String>> = IndexMap::new();

        for pair in query.split('&') {
            if pair.contains(';') {
                return Err(Error::MalformedQuery(
                    "invalid semicolon separator in query".into(),
                ));
            }
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = unescape(key)?;
            let value = unescape(value)?;
            params.entry(key).or_default().push(value);
        }

        Ok(Self(params))
    }

    /// Returns `true` if `key` appeared in the query, even with an empty value.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The first value for `key`, or `""` if the key is absent.
    pub fn get(&self, key: &str) -> &str {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map_or("", String::as_str)
    }

    /// Every value for `key`, in query order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split a DSN at its first `?`.
///
/// A `?` in the very first position does not start a query.
pub(crate) fn split_dsn(dsn: &str) -> (&str, Option<&str>) {
    match dsn.find('?') {
        Some(pos) if pos >= 1 => (&dsn[..pos], Some(&dsn[pos + 1..])),
        _ => (dsn, None),
    }
}

/// Decode one query component: `+` is a space and `%XX` is a byte.
fn unescape(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|e| e.iter().all(u8::is_ascii_hexdigit)) {
                let end = (i + 3).min(s.len());
                return Err(Error::MalformedQuery(format!(
                    "invalid URL escape {:?}",
                    String::from_utf8_lossy(&bytes[i..end])
                )));
            }
        }
    }

    let spaced: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };

    // Invalid UTF-8 is replaced rather than rejected, so binary values of keys
    // nobody reads cannot fail the open.
    Ok(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
}

impl ConnectionOptions {
    /// Build options from the query part of a DSN, starting from the defaults.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        Self::new().apply_dsn(dsn)
    }

    /// Layer the query part of a DSN over `self`. A DSN without a query leaves
    /// `self` unchanged.
    pub fn apply_dsn(self, dsn: &str) -> Result<Self> {
        match split_dsn(dsn) {
            (_, Some(query)) => self.apply_query(query),
            (_, None) => Ok(self),
        }
    }

    /// Layer a raw URL query string (without the leading `?`) over `self`.
    pub fn apply_query(self, query: &str) -> Result<Self> {
        self.apply_params(&QueryParams::parse(query)?)
    }

    /// Validate the recognized keys of `params` into `self`.
    pub fn apply_params(mut self, params: &QueryParams) -> Result<Self> {
        // (option, key) pairs, later keys of an option replacing earlier ones.
        let mut selected: IndexMap<OptionKey, &str> = IndexMap::new();
        for &(key, option) in OPTION_KEYS {
            if params.contains(key) {
                selected.insert(option, key);
            }
        }

        let mut order: Vec<OptionKey> = Vec::with_capacity(OPTION_KEYS.len());
        for &(_, option) in OPTION_KEYS {
            if !order.contains(&option) {
                order.push(option);
            }
        }

        for option in order {
            let Some(&key) = selected.get(&option) else {
                continue;
            };
            let value = params.get(key);
            if value.is_empty() {
                continue;
            }
            self = self.apply_one(option, key, value)?;
        }

        Ok(self)
    }

    fn apply_one(self, option: OptionKey, key: &str, value: &str) -> Result<Self> {
        Ok(match option {
            OptionKey::AutoVacuum => self.auto_vacuum(parse_enum(key, value)?),
            OptionKey::BusyTimeout => self.busy_timeout(parse_int(key, value)?),
            OptionKey::CaseSensitiveLike => self.case_sensitive_like(parse_flag(key, value)?),
            OptionKey::DeferForeignKeys => self.defer_foreign_keys(parse_flag(key, value)?),
            OptionKey::ForeignKeys => self.foreign_keys(parse_flag(key, value)?),
            OptionKey::IgnoreCheckConstraints => {
                self.ignore_check_constraints(parse_flag(key, value)?)
            }
            // For WAL mode this also resets synchronous to NORMAL.
            // See https://www.sqlite.org/pragma.html#pragma_synchronous
            OptionKey::JournalMode => self.journal_mode(parse_enum(key, value)?),
            OptionKey::LockingMode => self.locking_mode(parse_enum(key, value)?),
            OptionKey::QueryOnly => self.query_only(parse_flag(key, value)?),
            OptionKey::RecursiveTriggers => self.recursive_triggers(parse_flag(key, value)?),
            OptionKey::SecureDelete => self.secure_delete(parse_enum(key, value)?),
            OptionKey::Synchronous => self.synchronous(parse_enum(key, value)?),
            OptionKey::WritableSchema => self.writable_schema(parse_flag(key, value)?),
            OptionKey::CacheSize => self.cache_size(parse_int(key, value)?),
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    options::parse_bool(value).ok_or_else(|| Error::InvalidOption {
        key: key.to_owned(),
        value: value.to_owned(),
        expected: FALSE_LITERALS
            .iter()
            .zip(TRUE_LITERALS)
            .flat_map(|(f, t)| [*f, *t])
            .collect::<Vec<_>>()
            .join(" "),
    })
}

pub(crate) fn parse_enum<T: Literal>(key: &str, value: &str) -> Result<T> {
    T::from_literal(value).ok_or_else(|| Error::InvalidOption {
        key: key.to_owned(),
        value: value.to_owned(),
        expected: T::LITERALS.join(" "),
    })
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|source| Error::InvalidInteger {
        key: key.to_owned(),
        value: value.to_owned(),
        source,
    })
}
