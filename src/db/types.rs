//! Query result types for db-runner.
//!
//! Defines the structures used to represent query results in each fetch shape.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Shape in which row-returning statements hand back their results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Every row, addressable by column name or position.
    #[default]
    RowSet,
    /// Only the first row.
    Row,
    /// The first column of every row, as a flat sequence.
    Column,
    /// The first column of the first row.
    Scalar,
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rows" | "rowset" | "all" => Ok(Self::RowSet),
            "row" => Ok(Self::Row),
            "column" | "col" => Ok(Self::Column),
            "scalar" | "single" | "value" => Ok(Self::Scalar),
            _ => Err(format!(
                "Invalid fetch mode: {s}. Expected: rows, row, column, or scalar"
            )),
        }
    }
}

/// Result of running one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Full row set.
    Rows(RowSet),
    /// First row, if any.
    Row(Option<Record>),
    /// First column of every row.
    Column(Vec<Value>),
    /// First column of the first row, if any.
    Scalar(Option<Value>),
    /// Affected-row count of a statement that returns no rows.
    Affected(u64),
}

impl QueryResult {
    /// Shapes a fetched row set according to `mode`.
    pub fn from_rows(rows: RowSet, mode: FetchMode) -> Self {
        match mode {
            FetchMode::RowSet => Self::Rows(rows),
            FetchMode::Row => Self::Row(rows.into_first_record()),
            FetchMode::Column => Self::Column(rows.into_first_column()),
            FetchMode::Scalar => Self::Scalar(rows.into_first_value()),
        }
    }

    /// Returns the affected-row count for non-row statements.
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the row set, if this result holds one.
    pub fn into_rows(self) -> Option<RowSet> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Converts the result into a JSON value for dumping.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Rows(rows) => serde_json::Value::Array(
                rows.records()
                    .map(|record| serde_json::Value::Object(record.to_json()))
                    .collect(),
            ),
            Self::Row(record) => record
                .as_ref()
                .map(|r| serde_json::Value::Object(r.to_json()))
                .unwrap_or(serde_json::Value::Null),
            Self::Column(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Self::Scalar(value) => value
                .as_ref()
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null),
            Self::Affected(n) => serde_json::json!({ "affected_rows": n }),
        }
    }
}

/// Rows returned by a statement together with their column metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, each with one value per column.
    pub rows: Vec<Row>,

    /// Time taken to execute the statement.
    pub execution_time: Duration,
}

impl RowSet {
    /// Creates a row set with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Returns the position of the column called `name` (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Looks up a value by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Returns row `index` as a name-addressable record.
    pub fn record(&self, index: usize) -> Option<Record> {
        self.rows.get(index).map(|row| Record {
            columns: self.column_names(),
            values: row.clone(),
        })
    }

    /// Iterates over all rows as records.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        let names = self.column_names();
        self.rows.iter().map(move |row| Record {
            columns: names.clone(),
            values: row.clone(),
        })
    }

    /// Consumes the set, keeping only the first row.
    pub fn into_first_record(self) -> Option<Record> {
        let columns = self.column_names();
        self.rows
            .into_iter()
            .next()
            .map(|values| Record { columns, values })
    }

    /// Consumes the set, keeping the first value of every row.
    pub fn into_first_column(self) -> Vec<Value> {
        self.rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect()
    }

    /// Consumes the set, keeping the first value of the first row.
    pub fn into_first_value(self) -> Option<Value> {
        self.rows.into_iter().next()?.into_iter().next()
    }
}

/// A single row addressable by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Column names, in select-list order.
    pub columns: Vec<String>,
    /// Values, one per column.
    pub values: Vec<Value>,
}

impl Record {
    /// Looks up a value by column name (case-sensitive).
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Returns the record as column → display string.
    pub fn to_text_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(column, value)| (column.to_string(), value.to_display_string()))
            .collect()
    }

    /// Returns the record as a JSON object.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(column, value)| (column.to_string(), value.to_json()))
            .collect()
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the driver.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// JSON or JSONB document.
    Json(serde_json::Value),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Json(j) => j.to_string(),
        }
    }

    /// Converts the value into JSON; bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
