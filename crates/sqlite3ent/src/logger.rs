use std::time::{Duration, Instant};

use log::LevelFilter;
use tracing::Level;

/// Target of every statement event.
pub const QUERY_TARGET: &str = "sqlite3ent::query";

#[derive(Clone, Debug)]
#[non_exhaustive]
/// Logging configuration for statements run by the engine.
pub struct LogSettings {
    /// Log level for statements.
    pub statements_level: LevelFilter,
    /// Log level for slow statements.
    pub slow_statements_level: LevelFilter,
    /// Threshold for slow statements.
    pub slow_statements_duration: Duration,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            statements_level: LevelFilter::Debug,
            slow_statements_level: LevelFilter::Warn,
            slow_statements_duration: Duration::from_secs(1),
        }
    }
}

impl LogSettings {
    /// Configure statement logging level.
    pub fn log_statements(&mut self, level: LevelFilter) {
        self.statements_level = level;
    }

    /// Configure slow statement logging level and threshold.
    pub fn log_slow_statements(&mut self, level: LevelFilter, duration: Duration) {
        self.slow_statements_level = level;
        self.slow_statements_duration = duration;
    }

    /// Returns `true` if any logging level is enabled.
    pub fn is_enabled(&self) -> bool {
        self.statements_level != LevelFilter::Off || self.slow_statements_level != LevelFilter::Off
    }
}

fn to_levels(filter: LevelFilter) -> Option<(Level, log::Level)> {
    let tracing_level = match filter {
        LevelFilter::Error => Some(Level::ERROR),
        LevelFilter::Warn => Some(Level::WARN),
        LevelFilter::Info => Some(Level::INFO),
        LevelFilter::Debug => Some(Level::DEBUG),
        LevelFilter::Trace => Some(Level::TRACE),
        LevelFilter::Off => None,
    };

    tracing_level.zip(filter.to_level())
}

// `tracing::event!` needs the level as a constant, so each arm expands its own call site.
macro_rules! dispatch_level {
    ($level:expr, $mac:ident!($($args:tt)*)) => {
        match $level {
            Level::ERROR => $mac!(Level::ERROR, $($args)*),
            Level::WARN => $mac!(Level::WARN, $($args)*),
            Level::INFO => $mac!(Level::INFO, $($args)*),
            Level::DEBUG => $mac!(Level::DEBUG, $($args)*),
            Level::TRACE => $mac!(Level::TRACE, $($args)*),
        }
    };
}

macro_rules! enabled_at {
    ($level:expr,) => {
        tracing::enabled!(target: QUERY_TARGET, $level)
    };
}

macro_rules! query_event {
    ($level:expr, $summary:expr, $sql:expr, $affected:expr, $returned:expr, $elapsed:expr) => {
        tracing::event!(
            target: QUERY_TARGET,
            $level,
            summary = $summary,
            db.statement = $sql,
            rows_affected = $affected,
            rows_returned = $returned,
            elapsed = ?$elapsed,
        )
    };
}

/// Tracks one statement from preparation until it is dropped, then emits a
/// single event with its row counts and elapsed time.
pub(crate) struct QueryLogger {
    sql: String,
    rows_returned: u64,
    rows_affected: u64,
    start: Instant,
    settings: LogSettings,
}

impl QueryLogger {
    pub(crate) fn new(sql: impl Into<String>, settings: LogSettings) -> Self {
        Self {
            sql: sql.into(),
            rows_returned: 0,
            rows_affected: 0,
            start: Instant::now(),
            settings,
        }
    }

    pub(crate) fn inc_rows_returned(&mut self) {
        self.rows_returned += 1;
    }

    pub(crate) fn inc_rows_affected(&mut self, n: u64) {
        self.rows_affected += n;
    }

    fn finish(&self) {
        let elapsed = self.start.elapsed();
        let filter = if elapsed >= self.settings.slow_statements_duration {
            self.settings.slow_statements_level
        } else {
            self.settings.statements_level
        };

        let Some((tracing_level, log_level)) = to_levels(filter) else {
            return;
        };

        // The enabled level could be set from either the tracing or the log
        // side, so check both.
        let enabled = log::log_enabled!(target: QUERY_TARGET, log_level)
            || dispatch_level!(tracing_level, enabled_at!());
        if !enabled {
            return;
        }

        let (summary, sql) = self.payload();
        dispatch_level!(
            tracing_level,
            query_event!(
                summary.as_str(),
                sql.as_str(),
                self.rows_affected,
                self.rows_returned,
                elapsed
            )
        );
    }

    /// The summary line, plus the pretty-printed statement when the summary
    /// had to shorten it.
    fn payload(&self) -> (String, String) {
        let mut summary = summarize(&self.sql);
        if summary == self.sql {
            return (summary, String::new());
        }

        summary.push_str(" …");
        let formatted = sqlformat::format(
            &self.sql,
            &sqlformat::QueryParams::None,
            &sqlformat::FormatOptions::default(),
        );
        (summary, format!("\n\n{formatted}\n"))
    }
}

impl Drop for QueryLogger {
    fn drop(&mut self) {
        self.finish();
    }
}

/// First four words of a statement.
fn summarize(sql: &str) -> String {
    sql.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries() {
        assert_eq!(summarize("SELECT 1"), "SELECT 1");
        assert_eq!(summarize("  SELECT a,\n b FROM t WHERE x = 1"), "SELECT a, b FROM");
    }

    #[test]
    fn level_mapping() {
        assert_eq!(to_levels(LevelFilter::Off), None);
        assert_eq!(
            to_levels(LevelFilter::Warn),
            Some((Level::WARN, log::Level::Warn))
        );

        let mut settings = LogSettings::default();
        assert!(settings.is_enabled());
        settings.log_statements(LevelFilter::Off);
        settings.log_slow_statements(LevelFilter::Off, Duration::ZERO);
        assert!(!settings.is_enabled());
    }
}
