//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using a single sqlx connection.

use crate::config::ConnectionProfile;
use crate::db::{ColumnInfo, DatabaseBackend, DatabaseClient, ExecOutcome, Row, RowSet, Value};
use crate::error::{Result, RunnerError};
use crate::query::{parse_bool, BoundValue};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgArguments, PgConnectOptions, PgConnection, PgRow, PgStatement, PgTypeInfo, PgTypeKind,
    Postgres,
};
use sqlx::query::Query;
use sqlx::{
    Column as SqlxColumn, Connection, Decode, Either, Executor, Row as SqlxRow,
    Statement as SqlxStatement, Type, TypeInfo,
};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: PgConnection,
}

impl PostgresClient {
    /// Opens a connection using the given profile.
    ///
    /// Fields the profile leaves unset fall back to the libpq environment
    /// variables (`PGHOST`, `PGPORT`, `PGUSER`, ...).
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let options = connect_options(profile);

        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| map_connection_error(e, profile))?;

        debug!("Successfully connected to database");
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn fetch_rows(&mut self, sql: &str, params: &[BoundValue]) -> Result<RowSet> {
        let start = Instant::now();

        // The prepared statement carries column metadata, even for empty results
        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(map_query_error)?;

        let columns: Vec<ColumnInfo> = statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect();

        let types = parameter_types(&statement);
        let result: Vec<PgRow> = bind_values(statement.query(), &types, params)?
            .fetch_all(&mut self.conn)
            .await
            .map_err(map_query_error)?;

        let rows = result
            .iter()
            .map(convert_row)
            .collect::<Result<Vec<Row>>>()?;

        Ok(RowSet::with_data(columns, rows).with_execution_time(start.elapsed()))
    }

    async fn execute(&mut self, sql: &str, params: &[BoundValue]) -> Result<ExecOutcome> {
        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(map_query_error)?;

        let types = parameter_types(&statement);
        let result = bind_values(statement.query(), &types, params)?
            .execute(&mut self.conn)
            .await
            .map_err(map_query_error)?;

        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| RunnerError::connection(format!("Failed to close connection: {e}")))
    }
}

fn connect_options(profile: &ConnectionProfile) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();

    if let Some(host) = &profile.host {
        options = options.host(host);
    }
    if let Some(port) = profile.port {
        options = options.port(port);
    }
    if let Some(database) = &profile.database {
        options = options.database(database);
    }
    if let Some(user) = &profile.user {
        options = options.username(user);
    }
    if let Some(password) = &profile.password {
        options = options.password(password);
    }

    options
}

/// Parameter types the server inferred when preparing the statement.
fn parameter_types(statement: &PgStatement<'_>) -> Vec<PgTypeInfo> {
    match statement.parameters() {
        Some(Either::Left(types)) => types.to_vec(),
        _ => Vec::new(),
    }
}

/// Binds parameters in placeholder order, each encoded as the type the
/// server inferred for its placeholder.
///
/// The statement cache is keyed by SQL text, so the execution reuses the
/// prepared statement and its parameter types; a value sent in any other
/// binary format is rejected by the server.
fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    types: &[PgTypeInfo],
    params: &[BoundValue],
) -> Result<Query<'q, Postgres, PgArguments>> {
    for (index, value) in params.iter().enumerate() {
        let type_name = types
            .get(index)
            .map(|ty| ty.name().to_uppercase())
            .unwrap_or_default();

        query = bind_value(query, value, &type_name).map_err(|e| {
            RunnerError::sql(format!("type mismatch: parameter ${}: {e}", index + 1))
        })?;
    }
    Ok(query)
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &BoundValue,
    type_name: &str,
) -> std::result::Result<Query<'q, Postgres, PgArguments>, String> {
    match (value, type_name) {
        (BoundValue::Null, _) => Ok(query.bind(None::<String>)),
        (BoundValue::Int(int), "INT8" | "") => Ok(query.bind(*int)),
        (BoundValue::Bool(flag), "BOOL" | "") => Ok(query.bind(*flag)),
        (BoundValue::Text(text), _) => bind_text(query, text, type_name),
        (BoundValue::Int(int), _) => bind_text(query, &int.to_string(), type_name),
        (BoundValue::Bool(flag), _) => bind_text(query, &flag.to_string(), type_name),
    }
}

/// Parses a text value into the Rust type matching `type_name`.
/// Types without a dedicated conversion are sent as text.
fn bind_text<'q>(
    query: Query<'q, Postgres, PgArguments>,
    text: &str,
    type_name: &str,
) -> std::result::Result<Query<'q, Postgres, PgArguments>, String> {
    let mismatch = || format!("'{text}' is not a valid {type_name}");
    let trimmed = text.trim();

    let query = match type_name {
        "BOOL" => query.bind(parse_bool(trimmed).ok_or_else(mismatch)?),
        "INT2" => query.bind(trimmed.parse::<i16>().map_err(|_| mismatch())?),
        "INT4" => query.bind(trimmed.parse::<i32>().map_err(|_| mismatch())?),
        "INT8" => query.bind(trimmed.parse::<i64>().map_err(|_| mismatch())?),
        "FLOAT4" => query.bind(trimmed.parse::<f32>().map_err(|_| mismatch())?),
        "FLOAT8" => query.bind(trimmed.parse::<f64>().map_err(|_| mismatch())?),
        "NUMERIC" => query.bind(BigDecimal::from_str(trimmed).map_err(|_| mismatch())?),
        "DATE" => query.bind(trimmed.parse::<NaiveDate>().map_err(|_| mismatch())?),
        "TIME" => query.bind(trimmed.parse::<NaiveTime>().map_err(|_| mismatch())?),
        "TIMESTAMP" => query.bind(parse_timestamp(trimmed).ok_or_else(mismatch)?),
        "TIMESTAMPTZ" => query.bind(parse_timestamptz(trimmed).ok_or_else(mismatch)?),
        "UUID" => query.bind(Uuid::parse_str(trimmed).map_err(|_| mismatch())?),
        "JSON" | "JSONB" => {
            query.bind(serde_json::from_str::<serde_json::Value>(text).map_err(|_| mismatch())?)
        }
        _ => query.bind(text.to_string()),
    };
    Ok(query)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| text.parse::<NaiveDateTime>())
        .ok()
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+hh[:mm]`, or a naive timestamp taken as UTC.
fn parse_timestamptz(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_timestamp(text).map(|naive| naive.and_utc()))
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.name(), col.type_info()))
        .collect()
}

/// Decodes one cell by its column type. A cell that cannot be decoded is an
/// error, never a NULL.
fn convert_value(
    row: &PgRow,
    index: usize,
    column: &str,
    type_info: &PgTypeInfo,
) -> Result<Value> {
    let decoded = match type_info.name().to_uppercase().as_str() {
        "BOOL" => decode::<bool>(row, index, column)?.map(Value::Bool),
        "INT2" => decode::<i16>(row, index, column)?.map(|v| Value::Int(v.into())),
        "INT4" => decode::<i32>(row, index, column)?.map(|v| Value::Int(v.into())),
        "INT8" => decode::<i64>(row, index, column)?.map(Value::Int),
        "OID" => decode::<Oid>(row, index, column)?.map(|oid| Value::Int(oid.0.into())),
        "FLOAT4" => decode::<f32>(row, index, column)?.map(|v| Value::Float(v.into())),
        "FLOAT8" => decode::<f64>(row, index, column)?.map(Value::Float),
        "NUMERIC" => {
            decode::<BigDecimal>(row, index, column)?.map(|d| Value::String(d.to_string()))
        }
        "DATE" => decode::<NaiveDate>(row, index, column)?.map(|d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(row, index, column)?.map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => {
            decode::<NaiveDateTime>(row, index, column)?.map(|ts| Value::String(ts.to_string()))
        }
        "TIMESTAMPTZ" => {
            decode::<DateTime<Utc>>(row, index, column)?.map(|ts| Value::String(ts.to_rfc3339()))
        }
        "UUID" => decode::<Uuid>(row, index, column)?.map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, index, column)?.map(Value::Json),
        "BYTEA" => decode::<Vec<u8>>(row, index, column)?.map(Value::Bytes),

        // Enum values travel as their text label
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<Option<String>, _>(index)
            .map_err(|e| decode_error(column, e))?
            .map(Value::String),

        _ => decode::<String>(row, index, column)?.map(Value::String),
    };

    Ok(decoded.unwrap_or(Value::Null))
}

fn decode<'r, T>(row: &'r PgRow, index: usize, column: &str) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(|e| decode_error(column, e))
}

fn decode_error(column: &str, error: sqlx::Error) -> RunnerError {
    RunnerError::sql(format!("Cannot decode column '{column}': {error}"))
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, profile: &ConnectionProfile) -> RunnerError {
    let host = profile.host.as_deref().unwrap_or("localhost");
    let port = profile.effective_port();
    let user = profile.user.as_deref().unwrap_or("unknown");
    let database = profile.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        RunnerError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        RunnerError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        RunnerError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        RunnerError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        RunnerError::connection(error.to_string())
    }
}

/// Maps a prepare/execute failure, keeping SQLSTATE and PostgreSQL hints.
fn map_query_error(error: sqlx::Error) -> RunnerError {
    let Some(db_error) = error.as_database_error() else {
        return RunnerError::sql(error.to_string());
    };

    let mut message = db_error.message().to_string();

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            message.push_str("\n  DETAIL: ");
            message.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            message.push_str("\n  HINT: ");
            message.push_str(hint);
        }

        if let Some(constraint) = pg_error.constraint() {
            message.push_str("\n  CONSTRAINT: ");
            message.push_str(constraint);
        }
    }

    match db_error.code() {
        Some(code) => RunnerError::sql_with_code(message, code.into_owned()),
        None => RunnerError::sql(message),
    }
}
