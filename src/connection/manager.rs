//! Connection manager for opening, cloning and releasing SQL connections.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{ConnectionId, QueryRequest, SqlApi};
use crate::config::ConnectionParams;
use crate::error::{ConsoleError, Result};
use crate::store::{ConnBinding, QueryConn, Store, TabId, WorksheetId};

/// Statement used to read a connection's current database.
const ACTIVE_DB_SQL: &str = "SELECT DATABASE()";

/// Manages connection records and their server-side counterparts.
#[derive(Clone)]
pub struct ConnectionManager {
    api: Arc<dyn SqlApi>,
    store: Arc<Store>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(api: Arc<dyn SqlApi>, store: Arc<Store>) -> Self {
        Self { api, store }
    }

    /// Opens a connection and binds it to a worksheet.
    ///
    /// A connection previously bound to the worksheet is released.
    pub async fn open_for_worksheet(
        &self,
        worksheet_id: WorksheetId,
        params: &ConnectionParams,
    ) -> Result<QueryConn> {
        if self.store.tabs().worksheet(worksheet_id).is_none() {
            return Err(ConsoleError::not_found(format!("worksheet {worksheet_id}")));
        }

        let info = self.api.open(params).await?;
        let mut conn =
            QueryConn::from_info(info, &params.target, ConnBinding::Worksheet(worksheet_id));
        conn.active_db = params.db.clone();

        if let Some(old) = self.store.conns().for_worksheet(worksheet_id) {
            let _ = self.release(&old.id).await;
        }
        self.store.conns().insert(conn.clone());
        debug!(%worksheet_id, conn = %conn.id, thread_id = conn.thread_id, "Opened worksheet connection");

        Ok(conn)
    }

    /// Clones `source` into a new connection bound to a query tab.
    ///
    /// If the tab was deleted while the clone was in flight, the new
    /// connection is released instead of recorded and `NotFound` is returned.
    pub async fn clone_for_tab(&self, source: &QueryConn, tab_id: TabId) -> Result<QueryConn> {
        let info = self.api.clone_connection(&source.id).await?;
        let mut conn = QueryConn::from_info(info, &source.name, ConnBinding::QueryTab(tab_id));
        conn.active_db = source.active_db.clone();

        // Checked and recorded under the tab lock, which delete_tab also holds.
        let recorded = {
            let tabs = self.store.tabs();
            if tabs.tab(tab_id).is_some() {
                self.store.conns().insert(conn.clone());
                true
            } else {
                false
            }
        };
        if !recorded {
            debug!(%tab_id, conn = %conn.id, "Query tab gone before clone completed");
            let _ = self.release(&conn.id).await;
            return Err(ConsoleError::not_found(format!("query tab {tab_id}")));
        }
        debug!(%tab_id, conn = %conn.id, from = %source.id, "Cloned connection for query tab");

        Ok(conn)
    }

    /// Re-reads the active database of a connection and stores it.
    pub async fn refresh_active_db(&self, id: &ConnectionId) -> Result<Option<String>> {
        let result = self
            .api
            .query(id, &QueryRequest::new(ACTIVE_DB_SQL, None), None)
            .await?;
        let db = result
            .first_value()
            .and_then(|v| v.as_str())
            .map(String::from);

        self.store.conns().set_active_db(id, db.clone());
        debug!(conn = %id, db = ?db, "Active database refreshed");
        Ok(db)
    }

    /// Closes a connection on the server and forgets it locally.
    ///
    /// The local record is removed even when the server call fails.
    pub async fn release(&self, id: &ConnectionId) -> Result<()> {
        let result = self.api.release(id).await;
        self.store.conns().remove(id);
        if let Err(e) = &result {
            warn!(conn = %id, error = %e, "Failed to release connection");
        }
        result
    }
}
