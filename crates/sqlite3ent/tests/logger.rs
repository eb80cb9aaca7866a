#![allow(dead_code)]
//! Statement logging.

#[path = "../src/logger.rs"]
mod logger;

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use log::LevelFilter;
    use logger::{LogSettings, QUERY_TARGET, QueryLogger};
    use tracing::{
        Event, Level, Metadata, Subscriber, dispatcher,
        field::{Field, Visit},
        span::{Attributes, Id, Record},
    };

    use super::logger;

    #[derive(Clone, Default)]
    struct CapturingSubscriber {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        level: Level,
        target: String,
        fields: HashMap<String, String>,
    }

    impl CapturingSubscriber {
        fn events(&self) -> Vec<CapturedEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    struct FieldVisitor<'a> {
        fields: &'a mut HashMap<String, String>,
    }

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl Subscriber for CapturingSubscriber {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _attrs: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _span: &Id, _values: &Record<'_>) {}

        fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

        fn event(&self, event: &Event<'_>) {
            let mut fields = HashMap::new();
            let mut visitor = FieldVisitor {
                fields: &mut fields,
            };
            event.record(&mut visitor);
            self.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                fields,
            });
        }

        fn enter(&self, _span: &Id) {}

        fn exit(&self, _span: &Id) {}
    }

    fn capture(
        settings: LogSettings,
        sql: &str,
        run: impl FnOnce(&mut QueryLogger),
    ) -> Vec<CapturedEvent> {
        let subscriber = CapturingSubscriber::default();
        let dispatch = dispatcher::Dispatch::new(subscriber.clone());
        let guard = dispatcher::set_default(&dispatch);

        let mut logger = QueryLogger::new(sql, settings);
        run(&mut logger);
        drop(logger);
        drop(guard);

        subscriber.events()
    }

    #[test]
    fn logs_at_statements_level() {
        let mut settings = LogSettings::default();
        settings.log_statements(LevelFilter::Info);
        settings.log_slow_statements(LevelFilter::Warn, Duration::from_secs(60));

        let events = capture(settings, "SELECT 1", |logger| {
            logger.inc_rows_returned();
            logger.inc_rows_affected(2);
        });

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::INFO);
        assert_eq!(event.target, QUERY_TARGET);
        assert_eq!(event.fields["summary"], "SELECT 1");
        assert_eq!(event.fields["db.statement"], "");
        assert_eq!(event.fields["rows_returned"], "1");
        assert_eq!(event.fields["rows_affected"], "2");
    }

    #[test]
    fn logs_at_slow_level() {
        let mut settings = LogSettings::default();
        settings.log_statements(LevelFilter::Info);
        settings.log_slow_statements(LevelFilter::Warn, Duration::ZERO);

        let events = capture(settings, "UPDATE foo SET x = 1", |logger| {
            logger.inc_rows_affected(5);
        });

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::WARN);
        assert_eq!(event.fields["rows_affected"], "5");
    }

    #[test]
    fn long_statements_are_summarized() {
        let events = capture(
            LogSettings::default(),
            "SELECT id, name FROM author WHERE id = 1",
            |_| {},
        );

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::DEBUG);
        assert_eq!(event.fields["summary"], "SELECT id, name FROM …");
        assert!(event.fields["db.statement"].contains("WHERE"));
    }

    #[test]
    fn disabled_levels_log_nothing() {
        let mut settings = LogSettings::default();
        settings.log_statements(LevelFilter::Off);
        settings.log_slow_statements(LevelFilter::Off, Duration::ZERO);

        let events = capture(settings, "SELECT 1", |logger| logger.inc_rows_returned());
        assert!(events.is_empty());
    }
}
