//! Query execution for db-runner.
//!
//! This module holds the query runner together with the parameter and
//! placeholder handling it relies on.

mod params;
mod placeholders;
pub mod runner;

pub use params::{BoundValue, NamedParameter, ParamType};
pub(crate) use params::parse_bool;
pub use placeholders::{PreparedSql, StatementKind};
pub use runner::QueryRunner;
