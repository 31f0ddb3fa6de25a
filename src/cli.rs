//! Command-line argument parsing for the query console.

use crate::config::{Config, ConnectionParams};
use crate::error::{ConsoleError, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Runs SQL and previews through a database console's REST SQL API.
#[derive(Parser, Debug)]
#[command(name = "query-console")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Named connection from config file
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// REST API root (overrides config and CONSOLE_API_URL)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Connection target (server, service or listener name)
    #[arg(short = 't', long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Connection user
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Connection password
    #[arg(long, value_name = "PASSWORD", env = "CONSOLE_SQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Default database for the connection
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub db: Option<String>,

    /// Write logs to the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run SQL in a fresh query tab and print the result as JSON
    Query {
        /// SQL to run
        sql: String,

        /// Stop the query with KILL QUERY after this many seconds
        #[arg(long, value_name = "SECS")]
        kill_after: Option<f64>,
    },
    /// Preview the data of a table or view
    Preview {
        /// Table or view, optionally qualified (e.g. `db.t1`)
        target: String,

        /// Describe the table instead of selecting from it
        #[arg(long)]
        details: bool,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies CLI overrides to the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
    }

    /// Resolves the connection to open.
    ///
    /// Precedence: `--target`/`--user` on the command line, then the named
    /// connection, then the `default` connection of the config file. Loose
    /// flags also override the matching fields of a config connection.
    pub fn resolve_connection(&self, config: &Config) -> Result<ConnectionParams> {
        let mut params = match (&self.target, &self.user) {
            (Some(target), Some(user)) => ConnectionParams::new(target, user),
            _ => {
                let found = config.get_connection(self.connection.as_deref()).cloned();
                match (found, &self.connection) {
                    (Some(params), _) => params,
                    (None, Some(name)) => {
                        return Err(ConsoleError::config(format!(
                            "Connection '{name}' not found in config file"
                        )))
                    }
                    (None, None) => {
                        return Err(ConsoleError::config(
                            "No connection configured. Pass --target and --user or add [connections.default]",
                        ))
                    }
                }
            }
        };

        if let Some(target) = &self.target {
            params.target = target.clone();
        }
        if let Some(user) = &self.user {
            params.user = user.clone();
        }
        if let Some(password) = &self.password {
            params.password = password.clone();
        }
        if self.db.is_some() {
            params.db = self.db.clone();
        }
        Ok(params)
    }
}

impl Command {
    /// Returns the kill delay of a `query` command.
    pub fn kill_after(&self) -> Result<Option<Duration>> {
        match self {
            Self::Query {
                kill_after: Some(secs),
                ..
            } => Duration::try_from_secs_f64(*secs)
                .map(Some)
                .map_err(|e| ConsoleError::config(format!("Invalid --kill-after: {e}"))),
            _ => Ok(None),
        }
    }
}
