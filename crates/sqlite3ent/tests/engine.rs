//! Statements, transactions and extensions of the embedded engine.

#[cfg(test)]
mod tests {
    use libsqlite3_sys::{
        SQLITE_CONSTRAINT_CHECK, SQLITE_CONSTRAINT_FOREIGNKEY, SQLITE_CONSTRAINT_NOTNULL,
        SQLITE_CONSTRAINT_UNIQUE,
    };
    use sqlite3ent::{
        Conn, Driver, EngineDriver, Error, PrimaryErrCode, Sqlite3Driver, SqliteError, TxLock,
        Value,
    };
    use sqlite3ent_test::{TempDb, connection, rows, tdb};

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn author_count(conn: &dyn Conn) -> anyhow::Result<i64> {
        Ok(rows(conn, "SELECT count(*) FROM author", &[])?[0][0].int64()?)
    }

    fn sqlite_error(err: Error) -> SqliteError {
        err.into_sqlite_error().expect("database error")
    }

    #[test]
    fn it_connects() -> anyhow::Result<()> {
        let conn = connection("")?;
        conn.as_engine().expect("engine").ping()?;
        Ok(())
    }

    #[test]
    fn it_reads_every_storage_class() -> anyhow::Result<()> {
        let conn = connection("")?;
        let mut rows = conn.query("SELECT 1, 1.5, 'x', x'0102', NULL AS missing", &[])?;
        assert_eq!(rows.columns(), ["1", "1.5", "'x'", "x'0102'", "missing"]);
        assert_eq!(
            rows.next()?,
            Some(vec![
                Value::Integer(1),
                Value::Real(1.5),
                text("x"),
                Value::Blob(vec![1, 2]),
                Value::Null,
            ])
        );
        assert_eq!(rows.next()?, None);
        assert_eq!(rows.next()?, None);
        Ok(())
    }

    #[test]
    fn it_binds_arguments() -> anyhow::Result<()> {
        let conn = tdb()?;
        let args = [
            Value::Integer(2),
            Value::Integer(1),
            text("second"),
            Value::Blob(vec![0, 0, 7]),
        ];
        let result = conn.exec(
            "INSERT INTO post (id, author_id, title, body) VALUES (?, ?, ?, ?)",
            &args,
        )?;
        assert_eq!(result.rows_affected(), 1);
        assert_eq!(result.last_insert_id(), 2);

        let found = rows(
            &*conn,
            "SELECT title, body FROM post WHERE author_id = ? ORDER BY id",
            &[Value::Integer(1)],
        )?;
        assert_eq!(
            found,
            [
                vec![text("hello"), Value::Blob(vec![0, 0xff])],
                vec![text("second"), Value::Blob(vec![0, 0, 7])],
            ]
        );
        Ok(())
    }

    #[test]
    fn it_runs_scripts() -> anyhow::Result<()> {
        let conn = connection("")?;
        let result = conn.exec(
            "CREATE TABLE t (x INTEGER);
             INSERT INTO t VALUES (?);
             INSERT INTO t VALUES (?), (?);",
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )?;
        // counts come from the last statement
        assert_eq!(result.rows_affected(), 2);
        assert_eq!(result.last_insert_id(), 3);

        let all = rows(&*conn, "SELECT sum(x) FROM t", &[])?;
        assert_eq!(all, [vec![Value::Integer(6)]]);
        Ok(())
    }

    #[test]
    fn statements_without_row_changes_affect_nothing() -> anyhow::Result<()> {
        let conn = connection("")?;
        conn.exec("CREATE TABLE t (x INTEGER)", &[])?;
        let result = conn.exec("INSERT INTO t VALUES (1), (2), (3)", &[])?;
        assert_eq!(result.rows_affected(), 3);

        // the previous INSERT must not leak into any of these
        for sql in [
            "SELECT x FROM t",
            "INSERT INTO t VALUES (4); SELECT x FROM t",
            "PRAGMA user_version = 3",
            "CREATE TABLE u (y INTEGER)",
            "DELETE FROM t WHERE x > 100",
        ] {
            let result = conn.exec(sql, &[])?;
            assert_eq!(result.rows_affected(), 0, "{sql}");
        }

        let result = conn.exec("UPDATE t SET x = x + 1 WHERE x < 3", &[])?;
        assert_eq!(result.rows_affected(), 2);
        Ok(())
    }

    #[test]
    fn query_streams_the_first_statement_with_columns() -> anyhow::Result<()> {
        let conn = connection("")?;
        {
            let mut found = conn.query(
                "CREATE TABLE t (x INTEGER);
                 INSERT INTO t VALUES (1), (2);
                 SELECT x FROM t ORDER BY x;
                 INSERT INTO t VALUES (3);",
                &[],
            )?;
            assert_eq!(found.columns(), ["x"]);
            assert_eq!(found.next()?, Some(vec![Value::Integer(1)]));
            assert_eq!(found.next()?, Some(vec![Value::Integer(2)]));
            assert_eq!(found.next()?, None);
        }
        assert_eq!(
            rows(&*conn, "SELECT count(*) FROM t", &[])?,
            [vec![Value::Integer(2)]]
        );

        let mut empty = conn.query("UPDATE t SET x = x + 1", &[])?;
        assert!(empty.columns().is_empty());
        assert_eq!(empty.next()?, None);
        Ok(())
    }

    #[test]
    fn argument_count_is_checked() -> anyhow::Result<()> {
        let conn = connection("")?;

        let err = conn.exec("SELECT ?", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount {
                expected: 1,
                given: 0
            }
        ));

        let err = conn
            .exec("SELECT ?", &[Value::Integer(1), Value::Integer(2)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount {
                expected: 1,
                given: 2
            }
        ));

        let err = conn
            .query("SELECT ?; SELECT ?", &[Value::Integer(1), Value::Integer(2)])
            .err()
            .expect("second statement is never bound");
        assert!(matches!(err, Error::ArgumentCount { .. }));
        Ok(())
    }

    #[test]
    fn prepared_statements_are_reusable() -> anyhow::Result<()> {
        let conn = tdb()?;

        let mut insert = conn.prepare("INSERT INTO author (name) VALUES (?)")?;
        assert_eq!(insert.num_input(), Some(1));
        for name in ["grace", "barbara"] {
            insert.exec(&[text(name)])?;
        }
        insert.close()?;

        let mut select = conn.prepare("SELECT name FROM author WHERE id > ? ORDER BY id")?;
        for _ in 0..2 {
            let mut found = select.query(&[Value::Integer(1)])?;
            assert_eq!(found.next()?, Some(vec![text("grace")]));
            // abandoning the cursor early leaves the statement reusable
        }
        let mut found = select.query(&[Value::Integer(2)])?;
        assert_eq!(found.next()?, Some(vec![text("barbara")]));
        assert_eq!(found.next()?, None);
        Ok(())
    }

    #[test]
    fn input_count_of_scripts_is_known_once_prepared() -> anyhow::Result<()> {
        let conn = connection("")?;
        let mut stmt = conn.prepare("SELECT ?; SELECT ?, ?")?;
        assert_eq!(stmt.num_input(), None);
        stmt.exec(&[Value::Integer(1), Value::Integer(2), Value::Integer(3)])?;
        assert_eq!(stmt.num_input(), Some(3));

        let stmt = conn.prepare("SELECT ?, ?;  ")?;
        assert_eq!(stmt.num_input(), Some(2));
        Ok(())
    }

    #[test]
    fn syntax_errors_surface_at_prepare() -> anyhow::Result<()> {
        let conn = connection("")?;
        let err = conn.prepare("SELEC 1").err().expect("syntax error");
        let err = sqlite_error(err);
        assert_eq!(err.primary_code(), PrimaryErrCode::Error);
        assert!(err.message().contains("syntax error"), "{}", err.message());
        Ok(())
    }

    #[test]
    fn constraint_errors_carry_extended_codes() -> anyhow::Result<()> {
        let conn = tdb()?;
        let cases = [
            (
                "INSERT INTO author (name) VALUES ('ada')",
                SQLITE_CONSTRAINT_UNIQUE,
            ),
            ("INSERT INTO author (id) VALUES (5)", SQLITE_CONSTRAINT_NOTNULL),
            (
                "INSERT INTO post (author_id, title) VALUES (1, '')",
                SQLITE_CONSTRAINT_CHECK,
            ),
            (
                "INSERT INTO post (author_id, title) VALUES (99, 'orphan')",
                SQLITE_CONSTRAINT_FOREIGNKEY,
            ),
        ];
        for (sql, code) in cases {
            let err = sqlite_error(conn.exec(sql, &[]).unwrap_err());
            assert_eq!(err.primary_code(), PrimaryErrCode::Constraint, "{sql}");
            assert_eq!(err.extended_code(), code, "{sql}");
        }
        Ok(())
    }

    #[test]
    fn transactions_commit_and_roll_back() -> anyhow::Result<()> {
        let conn = tdb()?;

        let tx = conn.begin()?;
        conn.exec("INSERT INTO author (name) VALUES ('grace')", &[])?;
        tx.rollback()?;
        assert_eq!(author_count(&*conn)?, 1);

        {
            let _tx = conn.begin()?;
            conn.exec("INSERT INTO author (name) VALUES ('grace')", &[])?;
        }
        assert_eq!(author_count(&*conn)?, 1);

        let tx = conn.begin()?;
        conn.exec("INSERT INTO author (name) VALUES ('grace')", &[])?;
        tx.commit()?;
        assert_eq!(author_count(&*conn)?, 2);
        Ok(())
    }

    #[test]
    fn failed_commit_is_rolled_back_on_drop() -> anyhow::Result<()> {
        let conn = tdb()?;
        {
            let tx = conn.begin()?;
            conn.exec("PRAGMA defer_foreign_keys = 1", &[])?;
            conn.exec(
                "INSERT INTO post (author_id, title) VALUES (99, 'orphan')",
                &[],
            )?;
            let err = sqlite_error(tx.commit().unwrap_err());
            assert_eq!(err.extended_code(), SQLITE_CONSTRAINT_FOREIGNKEY);
        }
        assert_eq!(
            rows(&*conn, "SELECT count(*) FROM post", &[])?,
            [vec![Value::Integer(1)]]
        );
        // the connection is usable again
        conn.begin()?.commit()?;
        Ok(())
    }

    #[test]
    fn txlock_selects_the_begin_form() -> anyhow::Result<()> {
        let conn = EngineDriver::new().open_engine(":memory:?_txlock=exclusive")?;
        assert_eq!(conn.tx_lock(), TxLock::Exclusive);
        assert_eq!(
            EngineDriver::new().open_engine(":memory:")?.tx_lock(),
            TxLock::Deferred
        );

        let db = TempDb::new()?;
        let writer = Sqlite3Driver::new().open(&db.dsn("_txlock=immediate"))?;
        let other = Sqlite3Driver::new().open(&db.dsn("_timeout=0"))?;
        other.exec("CREATE TABLE t (x INTEGER)", &[])?;

        let tx = writer.begin()?;
        let err = sqlite_error(other.exec("INSERT INTO t VALUES (1)", &[]).unwrap_err());
        assert_eq!(err.primary_code(), PrimaryErrCode::Busy);
        tx.commit()?;

        other.exec("INSERT INTO t VALUES (1)", &[])?;
        Ok(())
    }

    #[test]
    fn closed_connections_refuse_work() -> anyhow::Result<()> {
        let mut conn = connection("")?;
        assert!(conn.as_engine().expect("engine").is_valid());

        conn.close()?;
        conn.close()?;

        let engine = conn.as_engine().expect("engine");
        assert!(!engine.is_valid());
        assert!(matches!(engine.ping(), Err(Error::ConnectionClosed)));
        assert!(matches!(
            conn.exec("SELECT 1", &[]),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(conn.begin(), Err(Error::ConnectionClosed)));
        Ok(())
    }

    #[test]
    fn close_succeeds_after_statements_rows_and_backups() -> anyhow::Result<()> {
        let db = TempDb::new()?;
        let mut conn = tdb()?;
        {
            let mut stmt = conn.prepare("SELECT name FROM author; SELECT 2")?;
            let mut found = stmt.query(&[])?;
            assert_eq!(found.next()?, Some(vec![text("ada")]));

            let engine = conn.as_engine().expect("engine");
            let mut backup = engine.new_backup(&db.uri(""))?;
            assert!(!backup.step(-1)?);
            backup.finish()?;
        }
        conn.close()?;
        assert!(!conn.as_engine().expect("engine").is_valid());
        Ok(())
    }

    #[test]
    fn it_backs_up_to_a_file() -> anyhow::Result<()> {
        let source = tdb()?;
        let db = TempDb::new()?;

        let engine = source.as_engine().expect("engine");
        let mut backup = engine.new_backup(&db.uri(""))?;
        while backup.step(1)? {}
        assert_eq!(backup.remaining(), 0);
        assert!(backup.page_count() > 0);
        let copy = backup.commit()?;

        assert_eq!(
            rows(&*copy, "SELECT name FROM author", &[])?,
            [vec![text("ada")]]
        );
        Ok(())
    }

    #[test]
    fn it_restores_from_a_file() -> anyhow::Result<()> {
        let db = TempDb::new()?;
        {
            let seed = Sqlite3Driver::new().open(db.path())?;
            seed.exec("CREATE TABLE t (x TEXT); INSERT INTO t VALUES ('saved')", &[])?;
        }

        let conn = connection("")?;
        let engine = conn.as_engine().expect("engine");
        let mut restore = engine.new_restore(&db.uri(""))?;
        assert!(!restore.step(-1)?);
        restore.finish()?;

        assert_eq!(rows(&*conn, "SELECT x FROM t", &[])?, [vec![text("saved")]]);
        Ok(())
    }

    #[test]
    fn backup_to_a_bad_uri_fails() -> anyhow::Result<()> {
        let conn = connection("")?;
        let engine = conn.as_engine().expect("engine");
        assert!(engine.new_backup("file:/no/such/dir/x.db").is_err());
        Ok(())
    }

    #[test]
    fn it_serializes_and_deserializes() -> anyhow::Result<()> {
        let source = tdb()?;
        let image = source.as_engine().expect("engine").serialize()?;
        assert_eq!(&image[..16], b"SQLite format 3\0");

        let target = connection("")?;
        target.as_engine().expect("engine").deserialize(&image)?;
        assert_eq!(
            rows(&*target, "SELECT title FROM post", &[])?,
            [vec![text("hello")]]
        );

        // the deserialized database is writable
        target.exec("INSERT INTO author (name) VALUES ('grace')", &[])?;
        assert_eq!(author_count(&*target)?, 2);
        Ok(())
    }

    #[test]
    fn persist_wal_flag() -> anyhow::Result<()> {
        let db = TempDb::new()?;
        let conn = Sqlite3Driver::new().open(&db.dsn("_journal=WAL"))?;
        let engine = conn.as_engine().expect("engine");

        assert_eq!(engine.file_control_persist_wal("main", -1)?, 0);
        assert_eq!(engine.file_control_persist_wal("main", 1)?, 1);
        assert_eq!(engine.file_control_persist_wal("main", -1)?, 1);

        assert!(engine.file_control_persist_wal("nope", -1).is_err());
        Ok(())
    }

    #[test]
    fn reset_session_keeps_the_connection() -> anyhow::Result<()> {
        let conn = tdb()?;
        let engine = conn.as_engine().expect("engine");
        engine.reset_session()?;
        assert_eq!(author_count(&*conn)?, 1);
        Ok(())
    }
}
