//! Query runner: connection lifecycle, parameter binding and fetch shapes.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::{Config, ConnectionProfile, FileProfileSource, ProfileSource};
use crate::db::{self, DatabaseBackend, DatabaseClient, FetchMode, QueryResult, Record, Value};
use crate::error::{Result, RunnerError};

use super::params::NamedParameter;
use super::placeholders::{PreparedSql, StatementKind};

/// The open connection and the profile it was opened from.
struct ActiveConnection {
    profile_name: String,
    client: Box<dyn DatabaseClient>,
}

/// Runs parameterised statements against one owned connection.
///
/// Methods take `&mut self`: a runner serves a single caller at a time. The
/// connection is closed by [`QueryRunner::close`], replaced by a later
/// successful [`QueryRunner::connect`], or dropped with the runner.
pub struct QueryRunner {
    profiles: Box<dyn ProfileSource>,
    active: Option<ActiveConnection>,
    default_params: Vec<NamedParameter>,
    last_insert_id: Option<i64>,
}

impl Default for QueryRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRunner {
    /// Creates a runner reading profiles from the platform default config file.
    pub fn new() -> Self {
        Self::with_profile_source(FileProfileSource::new(Config::default_path()))
    }

    /// Creates a runner over any profile source.
    pub fn with_profile_source(source: impl ProfileSource + 'static) -> Self {
        Self {
            profiles: Box::new(source),
            active: None,
            default_params: Vec::new(),
            last_insert_id: None,
        }
    }

    /// Reads profiles from the TOML file at `path` from now on.
    ///
    /// The file is not touched until the next [`QueryRunner::connect`].
    pub fn set_config_source(&mut self, path: impl Into<PathBuf>) {
        let source = FileProfileSource::new(path);
        debug!("Config source set to {}", source.path().display());
        self.profiles = Box::new(source);
    }

    /// Resolves `profile_name` and opens a connection with it.
    ///
    /// An unknown profile fails with `ConfigNotFound` before any network
    /// activity. On success the previous connection is closed; on failure it
    /// stays open.
    pub async fn connect(&mut self, profile_name: &str) -> Result<()> {
        let profile = self.profiles.resolve(profile_name)?.ok_or_else(|| {
            RunnerError::config_not_found(format!(
                "Connection profile '{}' not found in {}",
                profile_name,
                self.profiles.describe()
            ))
        })?;

        self.connect_with_profile(profile_name, &profile).await
    }

    /// Opens a connection with an explicit profile, registered under `name`.
    pub async fn connect_with_profile(
        &mut self,
        name: &str,
        profile: &ConnectionProfile,
    ) -> Result<()> {
        let profile = profile.resolved()?;
        info!("Connecting to '{}' ({})", name, profile.display_string());

        let client = db::connect(&profile).await?;

        if let Some(old) = self.active.take() {
            debug!("Closing previous connection '{}'", old.profile_name);
            if let Err(e) = old.client.close().await {
                warn!("Failed to close connection '{}': {}", old.profile_name, e);
            }
        }

        self.active = Some(ActiveConnection {
            profile_name: name.to_string(),
            client,
        });
        self.last_insert_id = None;

        info!("Connected to '{}'", name);
        Ok(())
    }

    /// Replaces the parameters used by calls that pass none explicitly.
    pub fn set_default_parameters(&mut self, params: Vec<NamedParameter>) {
        self.default_params = params;
    }

    /// Returns the current default parameters.
    pub fn default_parameters(&self) -> &[NamedParameter] {
        &self.default_params
    }

    /// Runs a statement with the default fetch shape (full row set).
    ///
    /// Statements that do not return rows yield [`QueryResult::Affected`].
    pub async fn query(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
    ) -> Result<QueryResult> {
        self.query_with_mode(sql, params, FetchMode::RowSet).await
    }

    /// Runs a statement, shaping row results according to `mode`.
    pub async fn query_with_mode(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
        mode: FetchMode,
    ) -> Result<QueryResult> {
        let sql = sql.trim();
        let result = self.run(sql, params, mode).await;
        if let Err(e) = &result {
            if !matches!(e, RunnerError::NotConnected) {
                error!("{}\nRaw SQL: {}", e, sql);
            }
        }
        result
    }

    /// Returns the first column of every row.
    pub async fn column(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
    ) -> Result<Vec<Value>> {
        match self.query_with_mode(sql, params, FetchMode::Column).await? {
            QueryResult::Column(values) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    /// Returns the first row, if any.
    pub async fn row(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
    ) -> Result<Option<Record>> {
        match self.query_with_mode(sql, params, FetchMode::Row).await? {
            QueryResult::Row(record) => Ok(record),
            _ => Ok(None),
        }
    }

    /// Returns the first column of the first row, if any.
    pub async fn single(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
    ) -> Result<Option<Value>> {
        match self.query_with_mode(sql, params, FetchMode::Scalar).await? {
            QueryResult::Scalar(value) => Ok(value),
            _ => Ok(None),
        }
    }

    /// Row id generated by the most recent insert, where the backend reports one.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Returns true if a connection is open.
    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    /// Name of the profile the open connection was made with.
    pub fn profile_name(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.profile_name.as_str())
    }

    /// Backend of the open connection.
    pub fn backend(&self) -> Option<DatabaseBackend> {
        self.active.as_ref().map(|c| c.client.backend())
    }

    /// Closes the open connection, if any.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.active.take() {
            info!("Closing connection '{}'", conn.profile_name);
            conn.client.close().await?;
        }
        Ok(())
    }

    async fn run(
        &mut self,
        sql: &str,
        params: Option<&[NamedParameter]>,
        mode: FetchMode,
    ) -> Result<QueryResult> {
        let active = self.active.as_mut().ok_or(RunnerError::NotConnected)?;
        let params = params.unwrap_or(&self.default_params);

        let prepared = PreparedSql::parse(sql, active.client.backend())?;
        let values = prepared.bind(params)?;
        debug!("Executing: {} ({} bound value(s))", prepared.sql(), values.len());

        let start = Instant::now();
        let result = match prepared.kind() {
            StatementKind::Rows => {
                let rows = active.client.fetch_rows(prepared.sql(), &values).await?;
                debug!("Fetched {} row(s) in {:?}", rows.len(), start.elapsed());
                QueryResult::from_rows(rows, mode)
            }
            StatementKind::Mutation => {
                let outcome = active.client.execute(prepared.sql(), &values).await?;
                debug!(
                    "{} row(s) affected in {:?}",
                    outcome.rows_affected,
                    start.elapsed()
                );
                if outcome.last_insert_id.is_some() {
                    self.last_insert_id = outcome.last_insert_id;
                }
                QueryResult::Affected(outcome.rows_affected)
            }
        };

        Ok(result)
    }
}
