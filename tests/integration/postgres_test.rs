//! Runner tests against PostgreSQL.
//!
//! Skipped unless DATABASE_URL is set.

use db_runner::config::{Config, ConnectionProfile};
use db_runner::{NamedParameter, ParamType, QueryResult, QueryRunner, RunnerError, Value};
use pretty_assertions::assert_eq;

async fn get_test_runner() -> Option<QueryRunner> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let profile = ConnectionProfile::from_connection_string(&url).ok()?;

    let mut runner =
        QueryRunner::with_profile_source(Config::default().with_connection("pg", profile));
    runner.connect("pg").await.ok()?;
    Some(runner)
}

#[tokio::test]
async fn test_select_one() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let value = runner.single("SELECT 1", None).await.unwrap();
    assert_eq!(value, Some(Value::Int(1)));

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_repeated_placeholder_binds_once() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let params = vec![NamedParameter::typed("n", "20", ParamType::Integer)];
    let row = runner
        .row("SELECT :n::int8 AS a, :n::int8 + 1 AS b", Some(&params))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("a"), Some(&Value::Int(20)));
    assert_eq!(row.get("b"), Some(&Value::Int(21)));

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_temp_table_round_trip() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    runner
        .query(
            "CREATE TEMP TABLE persons (id serial PRIMARY KEY, firstname text, age int4)",
            None,
        )
        .await
        .unwrap();

    let insert = "INSERT INTO persons (firstname, age) VALUES (:name, :age)";
    for (name, age) in [("John", "19"), ("Jane", "25")] {
        let params = vec![
            NamedParameter::new("name", name),
            NamedParameter::typed("age", age, ParamType::Integer),
        ];
        let result = runner.query(insert, Some(&params)).await.unwrap();
        assert_eq!(result, QueryResult::Affected(1));
    }

    let ages = runner
        .column("SELECT age FROM persons ORDER BY id", None)
        .await
        .unwrap();
    assert_eq!(ages, vec![Value::Int(19), Value::Int(25)]);

    let params = vec![
        NamedParameter::new("f", "Johny"),
        NamedParameter::typed("id", "1", ParamType::Integer),
    ];
    let result = runner
        .query("UPDATE persons SET firstname = :f WHERE id = :id", Some(&params))
        .await
        .unwrap();
    assert_eq!(result.affected_rows(), Some(1));

    let returned = runner
        .single(
            "UPDATE persons SET age = age + 1 WHERE firstname = :f RETURNING age",
            Some(&params[..1]),
        )
        .await
        .unwrap();
    assert_eq!(returned, Some(Value::Int(20)));

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_sql_error_has_sqlstate() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = runner
        .query("SELECT * FROM nonexistent_table_xyz", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::SqlExecution { .. }));
    assert_eq!(err.sql_code(), Some("42P01"));

    runner.close().await.unwrap();
}

async fn seed_persons(runner: &mut QueryRunner) {
    runner
        .query(
            "CREATE TEMP TABLE persons (id serial PRIMARY KEY, firstname text, age int4)",
            None,
        )
        .await
        .unwrap();
    runner
        .query(
            "INSERT INTO persons (firstname, age) VALUES ('John', 19), ('Jane', 25)",
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_untyped_parameters_select_matching_row() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_persons(&mut runner).await;

    let sql = "SELECT firstname, age FROM persons WHERE firstname = :firstname AND age = :age";
    let params = NamedParameter::from_pairs([("firstname", "John"), ("age", "19")]);

    // The second run reuses the cached prepared statement
    for _ in 0..2 {
        let rows = runner
            .query(sql, Some(&params))
            .await
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(0, "age"), Some(&Value::Int(19)));
    }

    let params = NamedParameter::from_pairs([("firstname", "John"), ("age", "nineteen")]);
    let err = runner.query(sql, Some(&params)).await.unwrap_err();
    assert!(matches!(err, RunnerError::SqlExecution { .. }));

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_untyped_parameters_update_reports_affected_rows() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_persons(&mut runner).await;

    let sql = "UPDATE persons SET firstname = :f WHERE id = :id";

    let params = NamedParameter::from_pairs([("f", "Johny"), ("id", "1")]);
    let result = runner.query(sql, Some(&params)).await.unwrap();
    assert_eq!(result, QueryResult::Affected(1));

    let params = NamedParameter::from_pairs([("f", "Johny"), ("id", "3")]);
    let result = runner.query(sql, Some(&params)).await.unwrap();
    assert_eq!(result, QueryResult::Affected(0));

    let params = vec![
        NamedParameter::new("f", "Janet"),
        NamedParameter::typed("id", "2", ParamType::Integer),
    ];
    let result = runner.query(sql, Some(&params)).await.unwrap();
    assert_eq!(result, QueryResult::Affected(1));

    let names = runner
        .column("SELECT firstname FROM persons ORDER BY id", None)
        .await
        .unwrap();
    assert_eq!(names, vec![Value::from("Johny"), Value::from("Janet")]);

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_with_clause_update_is_a_mutation() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_persons(&mut runner).await;

    let params = NamedParameter::from_pairs([("f", "Johny")]);
    let result = runner
        .query(
            "WITH ids AS (SELECT 1 AS id) UPDATE persons SET firstname = :f WHERE id IN (SELECT id FROM ids)",
            Some(&params),
        )
        .await
        .unwrap();
    assert_eq!(result, QueryResult::Affected(1));

    runner.close().await.unwrap();
}

#[tokio::test]
async fn test_extended_column_types_are_decoded() {
    let Some(mut runner) = get_test_runner().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let params = NamedParameter::from_pairs([("amount", "12.50"), ("day", "2024-03-01")]);
    let row = runner
        .row(
            "SELECT :amount::numeric AS amount, :day::date AS day, \
             'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id, '[1, 2]'::json AS doc",
            Some(&params),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("amount"), Some(&Value::from("12.50")));
    assert_eq!(row.get("day"), Some(&Value::from("2024-03-01")));
    assert_eq!(
        row.get("id"),
        Some(&Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"))
    );
    assert_eq!(row.get("doc"), Some(&Value::Json(serde_json::json!([1, 2]))));

    runner.close().await.unwrap();
}
