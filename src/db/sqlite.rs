//! SQLite database client implementation.

use crate::config::ConnectionProfile;
use crate::db::{ColumnInfo, DatabaseBackend, DatabaseClient, ExecOutcome, Row, RowSet, Value};
use crate::error::{Result, RunnerError};
use crate::query::BoundValue;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement as SqlxStatement,
    TypeInfo, ValueRef,
};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Database path that selects a private in-memory database.
const IN_MEMORY: &str = ":memory:";

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    conn: SqliteConnection,
}

impl SqliteClient {
    /// Opens the database file named by the profile's `database` field.
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let database = profile.require_database()?;
        let options = connect_options(database, profile.create_if_missing)?;

        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| {
                RunnerError::connection(format!("Cannot open SQLite database '{database}': {e}"))
            })?;

        debug!("Opened SQLite database {}", database);
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[BoundValue]) -> Result<RowSet> {
        let start = Instant::now();

        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(map_query_error)?;

        let columns: Vec<ColumnInfo> = statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect();

        let result: Vec<SqliteRow> = bind_values(statement.query(), params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(map_query_error)?;

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(RowSet::with_data(columns, rows).with_execution_time(start.elapsed()))
    }

    async fn execute(&mut self, sql: &str, params: &[BoundValue]) -> Result<ExecOutcome> {
        let result = bind_values(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await
            .map_err(map_query_error)?;

        let rowid = result.last_insert_rowid();
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: (rowid > 0).then_some(rowid),
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| RunnerError::connection(format!("Failed to close connection: {e}")))
    }
}

fn connect_options(database: &str, create_if_missing: bool) -> Result<SqliteConnectOptions> {
    if database == IN_MEMORY {
        return SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RunnerError::config(format!("Invalid SQLite options: {e}")));
    }

    Ok(SqliteConnectOptions::new()
        .filename(database)
        .create_if_missing(create_if_missing))
}

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[BoundValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in params {
        query = match value {
            BoundValue::Text(text) => query.bind(text.clone()),
            BoundValue::Int(int) => query.bind(*int),
            BoundValue::Bool(flag) => query.bind(*flag),
            BoundValue::Null => query.bind(None::<String>),
        };
    }
    query
}

fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes by the value's storage class; SQLite columns may hold any type.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let storage = raw.type_info().name().to_uppercase();

    match storage.as_str() {
        "INTEGER" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn map_query_error(error: sqlx::Error) -> RunnerError {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => RunnerError::sql_with_code(db_error.message(), code.into_owned()),
            None => RunnerError::sql(db_error.message()),
        },
        None => RunnerError::sql(error.to_string()),
    }
}
