//! Query Console - headless query-editor core for a SQL administration console.
//!
//! Manages worksheets, query tabs and their SQL connections, dispatches SQL over
//! the console's REST API and records every executed query in a query log.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod notify;
pub mod query;
pub mod store;
pub mod tabs;

pub use app::Console;
pub use error::{ConsoleError, Result};
