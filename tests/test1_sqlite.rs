#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::Person;
use sql_runner::prelude::*;
use tokio::runtime::Runtime;

const DDL: &str = r"
    CREATE TABLE IF NOT EXISTS person (
        id INTEGER PRIMARY KEY,
        name TEXT,
        score INTEGER,
        photo BLOB
    );
";

#[test]
fn sqlite_exec_load_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = Arc::new(SqliteDriver::open_in_memory()?);
        driver.execute_batch(DDL).await?;
        let session = Session::new(driver, Arc::new(SqliteDialect));

        for (id, name) in [(1, "Alpha"), (2, "Beta"), (3, "Charlie")] {
            let outcome = session
                .execute(&RawStatement::new(
                    "INSERT INTO person (id, name, score, photo) VALUES (?, ?, ?, ?)",
                    vec![
                        SqlValue::Int(id),
                        SqlValue::Text(name.to_string()),
                        SqlValue::Int(id * 10),
                        SqlValue::Blob(vec![0xAB, id as u8]),
                    ],
                ))
                .await?;
            assert_eq!(outcome.rows_affected, 1);
            assert_eq!(outcome.last_insert_id, Some(id));
        }

        // rows come back through FromRow
        let mut people: Vec<Person> = Vec::new();
        let count = session
            .load(
                &RawStatement::new(
                    "SELECT id, name FROM person WHERE id >= ? ORDER BY id",
                    vec![SqlValue::Int(2)],
                ),
                &mut people,
            )
            .await?;
        assert_eq!(count, 2);
        assert_eq!(
            people,
            vec![
                Person { id: 2, name: "Beta".into() },
                Person { id: 3, name: "Charlie".into() },
            ]
        );

        // single destination
        let one: Option<Person> = session
            .load_one(&RawStatement::new(
                "SELECT id, name FROM person WHERE id = ?",
                vec![SqlValue::Int(1)],
            ))
            .await?;
        assert_eq!(one, Some(Person { id: 1, name: "Alpha".into() }));

        let missing: Option<Person> = session
            .load_one(&RawStatement::new(
                "SELECT id, name FROM person WHERE id = ?",
                vec![SqlValue::Int(99)],
            ))
            .await?;
        assert_eq!(missing, None);

        // count wrap
        let total = session
            .load_count(&RawStatement::without_params("SELECT id FROM person"))
            .await?;
        assert_eq!(total, 3);

        // blob params stay bound and round-trip
        let mut blobs: Vec<i64> = Vec::new();
        session
            .load(
                &RawStatement::new(
                    "SELECT id FROM person WHERE photo = ?",
                    vec![SqlValue::Blob(vec![0xAB, 2])],
                ),
                &mut blobs,
            )
            .await?;
        assert_eq!(blobs, vec![2]);

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn sqlite_case_update_applies_all_windows() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let driver = Arc::new(SqliteDriver::open_in_memory()?);
        driver.execute_batch(DDL).await?;
        let session = Session::new(driver, Arc::new(SqliteDialect));

        for id in 1..=4i64 {
            session
                .execute(&RawStatement::new(
                    "INSERT INTO person (id, name, score) VALUES (?, ?, ?)",
                    vec![
                        SqlValue::Int(id),
                        SqlValue::Text(format!("p{id}")),
                        SqlValue::Int(100),
                    ],
                ))
                .await?;
        }

        // four rows, window of three: two execute cycles
        session
            .case_update("person")
            .columns("id", ["name", "score"])
            .values(1, [SqlValue::Text("a1".into()), SqlValue::Int(11)])
            .values(2, [SqlValue::Text("a2".into()), SqlValue::Int(22)])
            .values(3, [SqlValue::Text("a3".into()), SqlValue::Int(33)])
            .values(4, [SqlValue::Text("a4".into()), SqlValue::Int(44)])
            .run_len(3)
            .exec()
            .await?;

        let mut people: Vec<Person> = Vec::new();
        session
            .load(
                &RawStatement::without_params("SELECT id, name FROM person ORDER BY id"),
                &mut people,
            )
            .await?;
        assert_eq!(
            people.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["a1", "a2", "a3", "a4"]
        );

        // delta columns adjust in place
        session
            .case_update("person")
            .columns("id", ["score+"])
            .values(1, [SqlValue::Int(5)])
            .values(2, [SqlValue::Int(-2)])
            .exec()
            .await?;

        let mut scores: Vec<i64> = Vec::new();
        session
            .load(
                &RawStatement::without_params("SELECT score FROM person ORDER BY id"),
                &mut scores,
            )
            .await?;
        assert_eq!(scores, vec![16, 20, 33, 44]);

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn sqlite_file_backed_database_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("runner_test.db");
    rt.block_on(async {
        let driver = Arc::new(SqliteDriver::open(&path)?);
        driver.execute_batch(DDL).await?;
        let session = Session::new(driver, Arc::new(SqliteDialect));

        session
            .execute(&RawStatement::new(
                "INSERT INTO person (id, name) VALUES (?, ?)",
                vec![SqlValue::Int(1), SqlValue::Text("disk".into())],
            ))
            .await?;

        let name: Option<String> = session
            .load_one(&RawStatement::new(
                "SELECT name FROM person WHERE id = ?",
                vec![SqlValue::Int(1)],
            ))
            .await?;
        assert_eq!(name.as_deref(), Some("disk"));

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
