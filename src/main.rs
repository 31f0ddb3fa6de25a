//! Query Console - run SQL and previews through a console's REST SQL API.

use anyhow::{bail, Context};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

use query_console::cli::{Cli, Command};
use query_console::config::Config;
use query_console::logging;
use query_console::query::{PreviewMode, StopOutcome, UserQueryOutcome};
use query_console::store::TabId;
use query_console::Console;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    // CLI flags win over environment, which only fills defaults
    config.api.apply_env_defaults();
    cli.apply_overrides(&mut config);

    let params = cli.resolve_connection(&config)?;
    let kill_after = cli.command.kill_after()?;

    let console = Console::connect(&config)?;
    let (worksheet_id, tab_id) = console
        .open_worksheet("WORKSHEET", &params)
        .await
        .with_context(|| format!("Failed to connect to {}", params.display_string()))?;

    let output = execute(&console, tab_id, &cli.command, kill_after).await;

    if let Err(e) = console.close_worksheet(worksheet_id).await {
        warn!("Failed to close worksheet: {e}");
    }
    for notification in console.notifier().drain() {
        eprintln!("{}", notification.lines.join("\n"));
    }

    let value = output?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn execute(
    console: &Console,
    tab_id: TabId,
    command: &Command,
    kill_after: Option<Duration>,
) -> anyhow::Result<Value> {
    match command {
        Command::Query { sql, .. } => {
            let stopper = kill_after.map(|delay| {
                let dispatcher = console.dispatcher().clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    info!("Stopping query after {:.1}s", delay.as_secs_f64());
                    dispatcher.stop_user_query(tab_id).await
                })
            });

            let outcome = console.dispatcher().fetch_user_query(tab_id, sql).await?;

            if let Some(handle) = stopper {
                if handle.is_finished() {
                    if let Ok(Ok(StopOutcome::Unreachable(e))) = handle.await {
                        warn!("KILL QUERY was not delivered: {e}");
                    }
                } else {
                    handle.abort();
                }
            }

            match outcome {
                UserQueryOutcome::Completed(data) | UserQueryOutcome::Killed(data) => {
                    Ok(serde_json::to_value(&*data)?)
                }
                UserQueryOutcome::Failed(e) => Err(e.into()),
                UserQueryOutcome::Superseded => bail!("Query was superseded by another request"),
            }
        }
        Command::Preview { target, details } => {
            let mode = if *details {
                PreviewMode::DataDetails
            } else {
                PreviewMode::Data
            };
            let data = console.dispatcher().fetch_preview(tab_id, target, mode).await?;
            Ok(serde_json::to_value(&*data)?)
        }
    }
}
