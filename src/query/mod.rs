//! Query dispatch and logging.
//!
//! This module isolates SQL dispatch, per-tab result bookkeeping and the query
//! log from connection and tab management.

pub mod dispatcher;
pub mod log;
pub mod sql;

pub use dispatcher::{QueryDispatcher, StopOutcome, UserQueryOutcome, STOP_FAILED};
pub use log::{LogType, LoggedResult, QueryLog, QueryLogEntry};
pub use sql::{escape_identifiers, is_db_switch, PreviewMode};
