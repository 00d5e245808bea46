//! End-to-end runner tests against SQLite databases described by a TOML file.

use db_runner::{NamedParameter, ParamType, QueryResult, QueryRunner, RunnerError, Value};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Temporary settings file with a `db1` profile pointing at a fresh SQLite file.
struct Fixture {
    _dir: TempDir,
    config_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let config_path = dir.path().join("config.toml");

        let config = format!(
            "[connections.db1]\nbackend = \"sqlite\"\ndatabase = '{}'\ncreate_if_missing = true\n",
            db_path.display()
        );
        std::fs::write(&config_path, config).unwrap();

        Self {
            _dir: dir,
            config_path,
        }
    }

    async fn connected_runner(&self) -> QueryRunner {
        let mut runner = QueryRunner::new();
        runner.set_config_source(&self.config_path);
        assert_ok!(runner.connect("db1").await);
        runner
    }
}

async fn exec(runner: &mut QueryRunner, sql: &str) {
    assert_ok!(runner.query(sql, None).await);
}

fn text_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_select_one_returns_single_row() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let result = assert_ok!(runner.query("SELECT 1", None).await);
    let rows = result.into_rows().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows.rows[0], vec![Value::Int(1)]);
}

#[tokio::test]
async fn test_connect_absent_profile_is_config_not_found() {
    let fixture = Fixture::new();
    let mut runner = QueryRunner::new();
    runner.set_config_source(&fixture.config_path);

    let err = assert_err!(runner.connect("db2").await);
    assert!(matches!(err, RunnerError::ConfigNotFound(_)));
    assert_eq!(err.category(), "Configuration Not Found");
    assert!(!runner.is_connected());
}

#[tokio::test]
async fn test_connect_with_missing_settings_file_is_config_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = QueryRunner::new();
    runner.set_config_source(dir.path().join("nope.toml"));

    let err = assert_err!(runner.connect("db1").await);
    assert!(matches!(err, RunnerError::ConfigNotFound(_)));
}

#[tokio::test]
async fn test_malformed_settings_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connections.db1\nbackend = ").unwrap();

    let mut runner = QueryRunner::new();
    runner.set_config_source(&path);

    let err = assert_err!(runner.connect("db1").await);
    assert!(matches!(err, RunnerError::Config(_)));
}

#[tokio::test]
async fn test_query_and_column_before_connect() {
    let fixture = Fixture::new();
    let mut runner = QueryRunner::new();
    runner.set_config_source(&fixture.config_path);

    let err = assert_err!(runner.query("SELECT 1", None).await);
    assert!(matches!(err, RunnerError::NotConnected));

    let err = assert_err!(runner.column("SELECT 1", None).await);
    assert!(matches!(err, RunnerError::NotConnected));
}

#[tokio::test]
async fn test_named_parameters_select_matching_row() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;
    exec(&mut runner, "CREATE TABLE Persons (firstname TEXT, age INTEGER)").await;
    exec(&mut runner, "INSERT INTO Persons VALUES ('John', 19)").await;

    let params = NamedParameter::from_pairs([("firstname", "John"), ("age", "19")]);
    let result = assert_ok!(
        runner
            .query(
                "SELECT * FROM Persons WHERE firstname = :firstname AND age = :age",
                Some(&params),
            )
            .await
    );
    let rows = result.into_rows().unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows.record(0).unwrap().to_text_map(),
        text_map(&[("firstname", "John"), ("age", "19")])
    );
}

#[tokio::test]
async fn test_column_returns_values_in_row_order() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;
    exec(&mut runner, "CREATE TABLE Persons (firstname TEXT, age INTEGER)").await;
    exec(
        &mut runner,
        "INSERT INTO Persons VALUES ('John', 19), ('Jane', 25)",
    )
    .await;

    let ages = assert_ok!(runner.column("SELECT age FROM Persons", None).await);
    let ages: Vec<String> = ages.iter().map(Value::to_string).collect();

    assert_eq!(ages, vec!["19", "25"]);
}

#[tokio::test]
async fn test_update_returns_affected_rows() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;
    exec(
        &mut runner,
        "CREATE TABLE Persons (id INTEGER PRIMARY KEY, firstname TEXT, age INTEGER)",
    )
    .await;
    exec(&mut runner, "INSERT INTO Persons (firstname, age) VALUES ('John', 19)").await;

    let sql = "UPDATE Persons SET firstname=:f WHERE id=:id";

    let params = NamedParameter::from_pairs([("f", "Johny"), ("id", "1")]);
    let result = assert_ok!(runner.query(sql, Some(&params)).await);
    assert_eq!(result, QueryResult::Affected(1));

    let params = NamedParameter::from_pairs([("f", "Johny"), ("id", "2")]);
    let result = assert_ok!(runner.query(sql, Some(&params)).await);
    assert_eq!(result.affected_rows(), Some(0));

    let name = assert_ok!(
        runner
            .single("SELECT firstname FROM Persons WHERE id = 1", None)
            .await
    );
    assert_eq!(name, Some(Value::from("Johny")));
}

#[tokio::test]
async fn test_with_clause_update_returns_affected_rows() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;
    exec(
        &mut runner,
        "CREATE TABLE Persons (id INTEGER PRIMARY KEY, firstname TEXT, age INTEGER)",
    )
    .await;
    exec(
        &mut runner,
        "INSERT INTO Persons (firstname, age) VALUES ('John', 19), ('Jane', 25)",
    )
    .await;

    let params = NamedParameter::from_pairs([("f", "Johny")]);
    let result = assert_ok!(
        runner
            .query(
                "WITH ids AS (SELECT 1 AS id) UPDATE Persons SET firstname = :f WHERE id IN (SELECT id FROM ids)",
                Some(&params),
            )
            .await
    );
    assert_eq!(result, QueryResult::Affected(1));

    let name = assert_ok!(
        runner
            .single("SELECT firstname FROM Persons WHERE id = 1", None)
            .await
    );
    assert_eq!(name, Some(Value::from("Johny")));
}

#[tokio::test]
async fn test_unmatched_parameter_is_sql_error() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let params = NamedParameter::from_pairs([("firstname", "John"), ("extra", "1")]);
    let err = assert_err!(
        runner
            .query("SELECT :firstname AS firstname", Some(&params))
            .await
    );
    assert!(matches!(err, RunnerError::SqlExecution { .. }));
}

#[tokio::test]
async fn test_placeholder_names_are_case_sensitive() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let params = NamedParameter::from_pairs([("name", "John")]);
    let err = assert_err!(runner.query("SELECT :Name AS n", Some(&params)).await);
    assert!(matches!(err, RunnerError::SqlExecution { .. }));
}

#[tokio::test]
async fn test_typed_parameters() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let params = vec![
        NamedParameter::typed("n", "41", ParamType::Integer),
        NamedParameter::null("missing"),
    ];
    let row = assert_ok!(
        runner
            .row(
                "SELECT :n + 1 AS answer, :missing IS NULL AS absent",
                Some(&params)
            )
            .await
    )
    .unwrap();

    assert_eq!(row.get("answer"), Some(&Value::Int(42)));
    assert_eq!(row.get("absent"), Some(&Value::Int(1)));

    let params = vec![NamedParameter::typed("n", "forty", ParamType::Integer)];
    let err = assert_err!(runner.query("SELECT :n", Some(&params)).await);
    assert!(matches!(err, RunnerError::SqlExecution { .. }));
}

#[tokio::test]
async fn test_colons_in_literals_are_not_placeholders() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let value = assert_ok!(
        runner
            .single("SELECT ':not_a_param' AS s", None)
            .await
    );
    assert_eq!(value, Some(Value::from(":not_a_param")));
}

#[tokio::test]
async fn test_sql_error_carries_driver_message() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;

    let err = assert_err!(runner.query("SELECT * FROM no_such_table", None).await);
    match err {
        RunnerError::SqlExecution { message, .. } => {
            assert!(message.contains("no_such_table"), "message: {message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_data_persists_across_reconnect() {
    let fixture = Fixture::new();
    let mut runner = fixture.connected_runner().await;
    exec(&mut runner, "CREATE TABLE t (v TEXT)").await;
    exec(&mut runner, "INSERT INTO t VALUES ('kept')").await;

    assert_ok!(runner.connect("db1").await);

    let value = assert_ok!(runner.single("SELECT v FROM t", None).await);
    assert_eq!(value, Some(Value::from("kept")));
    assert_ok!(runner.close().await);
}
