//! Query dispatcher.
//!
//! Sends preview and user queries for a tab, keeps the tab's memory record in
//! step with the request lifecycle, and forwards every executed query to the
//! query log.
//!
//! Each request is tagged with a [`RequestId`] stored in its slot. A response
//! only writes back if its id still owns the slot, so when two requests
//! overlap on one tab the newest one's bookkeeping is what readers see.
//!
//! User queries additionally move through [`QueryRunState`]:
//! `Running -> KillRequested -> Settled` when stopped with `KILL QUERY`, or
//! `Running -> Settled` otherwise. A query that settles in `KillRequested`
//! reports the canonical canceled result, whatever the transport returned.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::log::{LogType, LoggedResult, QueryLog, QueryLogEntry};
use super::sql::{escape_identifiers, is_db_switch, PreviewMode};
use crate::api::{QueryRequest, ResultSet, SqlApi};
use crate::config::QuerySettings;
use crate::connection::ConnectionManager;
use crate::error::{ConsoleError, Result};
use crate::notify::{Notification, Notifier};
use crate::store::{QueryConn, QueryRunState, RequestId, ResultSlot, Store, TabId, TabMemory};

/// First line of the notification shown when `KILL QUERY` is refused.
pub const STOP_FAILED: &str = "Failed to stop the query";

/// How a user query settled.
#[derive(Debug, Clone, PartialEq)]
pub enum UserQueryOutcome {
    /// The server returned a result.
    Completed(Arc<ResultSet>),
    /// The query was stopped with `KILL QUERY`.
    Killed(Arc<ResultSet>),
    /// The request failed on the wire, including client-side aborts.
    Failed(ConsoleError),
    /// A newer request took over the slot before this one settled.
    Superseded,
}

/// Outcome of a `KILL QUERY` attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// The server accepted the kill.
    Killed,
    /// The server answered with an error row; carries the notification lines.
    Refused(Vec<String>),
    /// The kill never reached the server.
    Unreachable(ConsoleError),
}

/// How a settling response relates to the slot it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    Stale,
    Killed,
    Normal,
}

/// Dispatches queries on behalf of query tabs.
#[derive(Clone)]
pub struct QueryDispatcher {
    api: Arc<dyn SqlApi>,
    store: Arc<Store>,
    conns: ConnectionManager,
    log: Arc<QueryLog>,
    notifier: Arc<Notifier>,
    row_limit: u32,
}

impl QueryDispatcher {
    pub fn new(
        api: Arc<dyn SqlApi>,
        store: Arc<Store>,
        log: Arc<QueryLog>,
        notifier: Arc<Notifier>,
        settings: &QuerySettings,
    ) -> Self {
        let conns = ConnectionManager::new(api.clone(), store.clone());
        Self {
            api,
            store,
            conns,
            log,
            notifier,
            row_limit: settings.row_limit,
        }
    }

    /// Fetches a data preview or a table description into the tab's preview slot.
    ///
    /// Transport failures are returned after the slot stops loading; its
    /// previous data is kept.
    pub async fn fetch_preview(
        &self,
        tab_id: TabId,
        target: &str,
        mode: PreviewMode,
    ) -> Result<Arc<ResultSet>> {
        let conn = self.tab_conn(tab_id)?;
        let escaped = escape_identifiers(target);
        let sql = mode.sql(&escaped);
        let request_id = RequestId::new();
        let sent = Utc::now();

        self.store
            .mem()
            .update(tab_id, |mem| preview_slot(mem, mode).begin(request_id, sent));
        debug!(%tab_id, %request_id, %mode, %sql, "Fetching preview");

        let request = QueryRequest::new(sql.clone(), Some(self.row_limit));
        let data = match self.api.query(&conn.id, &request, None).await {
            Ok(result) => Arc::new(result),
            Err(e) => {
                self.store.mem().update(tab_id, |mem| {
                    let slot = preview_slot(mem, mode);
                    if slot.is_owned_by(request_id) {
                        slot.is_loading = false;
                    }
                });
                warn!(%tab_id, %request_id, error = %e, "Preview request failed");
                return Err(e);
            }
        };

        let total_duration = elapsed_secs(sent, Utc::now());
        let committed = self
            .store
            .mem()
            .update(tab_id, |mem| {
                let slot = preview_slot(mem, mode);
                if !slot.is_owned_by(request_id) {
                    return false;
                }
                slot.data = Some(data.clone());
                slot.total_duration = total_duration;
                slot.is_loading = false;
                true
            })
            .unwrap_or(false);
        if !committed {
            debug!(%tab_id, %request_id, "Discarding stale preview response");
        }

        self.log.push(QueryLogEntry {
            start_time: sent,
            name: Some(mode.log_name(&escaped)),
            sql,
            result: LoggedResult::Data(data.clone()),
            connection_name: conn.name,
            log_type: LogType::ActionLogs,
        });

        Ok(data)
    }

    /// Runs user SQL on the tab's connection.
    ///
    /// Errors are only returned when the tab or its connection is unknown;
    /// every request outcome is reported through [`UserQueryOutcome`].
    pub async fn fetch_user_query(&self, tab_id: TabId, sql: &str) -> Result<UserQueryOutcome> {
        let conn = self.tab_conn(tab_id)?;
        let request_id = RequestId::new();
        let sent = Utc::now();
        let abort = CancellationToken::new();

        self.store.mem().update(tab_id, |mem| {
            let query = &mut mem.query_results;
            query.result.begin(request_id, sent);
            query.result.data = None;
            query.abort = Some(abort.clone());
            query.run_state = QueryRunState::Running;
            mem.is_conn_busy = true;
        });
        debug!(%tab_id, %request_id, sql, "Dispatching user query");

        let request = QueryRequest::new(sql, Some(self.row_limit));
        let response = self.api.query(&conn.id, &request, Some(abort)).await;
        let total_duration = elapsed_secs(sent, Utc::now());

        let settle = self
            .store
            .mem()
            .update(tab_id, |mem| {
                if !mem.query_results.result.is_owned_by(request_id) {
                    Settle::Stale
                } else if mem.has_kill_flag() {
                    Settle::Killed
                } else {
                    Settle::Normal
                }
            })
            .unwrap_or(Settle::Stale);

        let outcome = match (settle, response) {
            (Settle::Stale, response) => {
                debug!(%tab_id, %request_id, "Discarding stale query response");
                self.log_user_query(sent, sql, &conn, logged(&response));
                return Ok(UserQueryOutcome::Superseded);
            }
            (Settle::Killed, _) => {
                let data = Arc::new(ResultSet::canceled(sql));
                self.settle_user_query(tab_id, request_id, total_duration, Some(data.clone()));
                debug!(%tab_id, %request_id, "Query killed");
                UserQueryOutcome::Killed(data)
            }
            (Settle::Normal, Err(e)) => {
                self.settle_user_query(tab_id, request_id, total_duration, None);
                debug!(%tab_id, %request_id, error = %e, "User query failed");
                UserQueryOutcome::Failed(e)
            }
            (Settle::Normal, Ok(result)) => {
                if is_db_switch(sql) {
                    if let Err(e) = self.conns.refresh_active_db(&conn.id).await {
                        warn!(%tab_id, error = %e, "Failed to refresh active database");
                    }
                }
                let data = Arc::new(result);
                self.settle_user_query(tab_id, request_id, total_duration, Some(data.clone()));
                UserQueryOutcome::Completed(data)
            }
        };

        let result = match &outcome {
            UserQueryOutcome::Completed(data) | UserQueryOutcome::Killed(data) => {
                LoggedResult::Data(data.clone())
            }
            UserQueryOutcome::Failed(e) => LoggedResult::Error(e.to_string()),
            UserQueryOutcome::Superseded => return Ok(outcome),
        };
        self.log_user_query(sent, sql, &conn, result);

        Ok(outcome)
    }

    /// Stops the query running in a tab with `KILL QUERY`.
    ///
    /// The kill is sent on the worksheet connection, targeting the thread of
    /// the tab's own connection, which is busy running the query. An
    /// acknowledged kill only marks the request that was running when it was
    /// sent; a query started afterwards is left alone.
    pub async fn stop_user_query(&self, tab_id: TabId) -> Result<StopOutcome> {
        let tab = self
            .store
            .tab(tab_id)
            .ok_or_else(|| ConsoleError::not_found(format!("query tab {tab_id}")))?;
        let tab_conn = self.tab_conn(tab_id)?;
        let wke_conn = self
            .store
            .conns()
            .for_worksheet(tab.worksheet_id)
            .ok_or_else(|| {
                ConsoleError::not_found(format!("connection for worksheet {}", tab.worksheet_id))
            })?;

        let target = self
            .store
            .mem()
            .update(tab_id, |mem| {
                let query = &mem.query_results;
                (query.run_state == QueryRunState::Running)
                    .then_some(query.result.request_id)
                    .flatten()
            })
            .flatten();

        let sql = format!("KILL QUERY {}", tab_conn.thread_id);
        let result = match self
            .api
            .query(&wke_conn.id, &QueryRequest::new(sql, None), None)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(%tab_id, error = %e, "Failed to send KILL QUERY");
                return Ok(StopOutcome::Unreachable(e));
            }
        };

        if let Some(row) = result.first_error() {
            let mut lines = vec![STOP_FAILED.to_string()];
            lines.extend(row.iter().map(|(key, value)| format!("{key}: {}", plain(value))));
            self.notifier.push(Notification::error(lines.clone()));
            return Ok(StopOutcome::Refused(lines));
        }

        let abort = target.and_then(|request_id| {
            self.store
                .mem()
                .update(tab_id, |mem| {
                    let query = &mut mem.query_results;
                    if query.run_state != QueryRunState::Running
                        || !query.result.is_owned_by(request_id)
                    {
                        return None;
                    }
                    query.run_state = QueryRunState::KillRequested;
                    query.abort.clone()
                })
                .flatten()
        });
        match abort {
            Some(token) => token.cancel(),
            None => debug!(%tab_id, "KILL QUERY acknowledged with no matching query in flight"),
        }

        Ok(StopOutcome::Killed)
    }

    /// Empties both preview slots of a tab.
    pub fn clear_data_preview(&self, tab_id: TabId) {
        self.store.mem().update(tab_id, TabMemory::clear_previews);
    }

    fn tab_conn(&self, tab_id: TabId) -> Result<QueryConn> {
        if self.store.tab(tab_id).is_none() {
            return Err(ConsoleError::not_found(format!("query tab {tab_id}")));
        }
        self.store
            .conns()
            .for_tab(tab_id)
            .ok_or_else(|| ConsoleError::not_found(format!("connection for query tab {tab_id}")))
    }

    fn settle_user_query(
        &self,
        tab_id: TabId,
        request_id: RequestId,
        total_duration: f64,
        data: Option<Arc<ResultSet>>,
    ) {
        self.store.mem().update(tab_id, |mem| {
            let query = &mut mem.query_results;
            if !query.result.is_owned_by(request_id) {
                return;
            }
            if data.is_some() {
                query.result.data = data;
            }
            query.result.total_duration = total_duration;
            query.result.is_loading = false;
            query.abort = None;
            query.run_state = QueryRunState::Settled;
            mem.is_conn_busy = false;
        });
    }

    fn log_user_query(&self, sent: DateTime<Utc>, sql: &str, conn: &QueryConn, result: LoggedResult) {
        self.log.push(QueryLogEntry {
            start_time: sent,
            name: None,
            sql: sql.to_string(),
            result,
            connection_name: conn.name.clone(),
            log_type: LogType::UserLogs,
        });
    }
}

fn preview_slot(mem: &mut TabMemory, mode: PreviewMode) -> &mut ResultSlot {
    match mode {
        PreviewMode::Data => &mut mem.prvw_data,
        PreviewMode::DataDetails => &mut mem.prvw_data_details,
    }
}

fn logged(response: &Result<ResultSet>) -> LoggedResult {
    match response {
        Ok(result) => LoggedResult::Data(Arc::new(result.clone())),
        Err(e) => LoggedResult::Error(e.to_string()),
    }
}

/// Seconds between two instants, rounded to four decimals and never negative.
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let micros = (to - from).num_microseconds().unwrap_or(i64::MAX).max(0);
    (micros as f64 / 100.0).round() / 10_000.0
}

/// Renders a JSON value the way it reads in a message: strings without quotes.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
