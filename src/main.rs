//! db-runner - Run one parameterised statement against a named profile.

mod cli;

use cli::Cli;
use db_runner::error::{Result, RunnerError};
use db_runner::{logging, output, FetchMode, NamedParameter, QueryResult, QueryRunner};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Lets `password_env` profiles read secrets from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(&cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let params = cli.parse_params().map_err(RunnerError::config)?;
    let mode = cli.parse_fetch_mode().map_err(RunnerError::config)?;
    let format = cli.parse_output_format().map_err(RunnerError::config)?;

    let config_path = cli.config_path();
    info!("Loading profiles from: {}", config_path.display());

    let mut runner = QueryRunner::new();
    runner.set_config_source(config_path);
    runner.connect(&cli.connection).await?;

    let result = run_and_close(&mut runner, &cli.sql, &params, mode).await?;

    println!("{}", output::render(&result, format));
    Ok(())
}

/// Runs one statement, then closes the connection. A failed close is only
/// logged, so the statement's own outcome is what the caller sees.
async fn run_and_close(
    runner: &mut QueryRunner,
    sql: &str,
    params: &[NamedParameter],
    mode: FetchMode,
) -> Result<QueryResult> {
    let result = runner.query_with_mode(sql, Some(params), mode).await;

    if let Err(e) = runner.close().await {
        warn!("Failed to close connection: {}", e);
    }

    result
}
