//! db-runner - A thin query runner over named connection profiles.
//!
//! Connects with a profile from a TOML settings file, binds `:name`
//! parameters to prepared statements and hands back results as a row set,
//! a single row, a single column or a scalar.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;

pub use config::{Config, ConnectionProfile, FileProfileSource, ProfileSource};
pub use db::{FetchMode, QueryResult, Record, RowSet, Value};
pub use error::{Result, RunnerError};
pub use query::{NamedParameter, ParamType, QueryRunner};
