//! Query tab lifecycle: add, delete and refresh.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::error::{ConsoleError, Result};
use crate::store::{EditorState, QueryTab, Store, TabId, WorksheetId, DEFAULT_TAB_NAME};

/// Creates, deletes and resets query tabs together with their dependent records.
#[derive(Clone)]
pub struct TabLifecycle {
    store: Arc<Store>,
    conns: ConnectionManager,
}

impl TabLifecycle {
    pub fn new(store: Arc<Store>, conns: ConnectionManager) -> Self {
        Self { store, conns }
    }

    /// Adds a tab to a worksheet and makes it active.
    ///
    /// Without a name the tab is called `Query Tab <n>`. If the worksheet has
    /// a connection, it is cloned and bound to the new tab; a failed clone
    /// leaves the tab without a connection.
    pub async fn add_tab(&self, worksheet_id: WorksheetId, name: Option<&str>) -> Result<TabId> {
        let id = TabId::new();
        {
            let mut tabs = self.store.tabs_mut();
            if tabs.worksheet(worksheet_id).is_none() {
                return Err(ConsoleError::not_found(format!("worksheet {worksheet_id}")));
            }
            let count = tabs.next_count(worksheet_id);
            let name = name.map_or_else(|| format!("Query Tab {count}"), String::from);
            tabs.insert_tab(QueryTab {
                id,
                worksheet_id,
                name,
                count,
            });
        }
        self.store.mem().insert(id);
        debug!(%worksheet_id, tab_id = %id, "Query tab added");

        if let Some(wke_conn) = self.store.conns().for_worksheet(worksheet_id) {
            if let Err(e) = self.conns.clone_for_tab(&wke_conn, id).await {
                warn!(tab_id = %id, error = %e, "Failed to clone worksheet connection");
            }
        }

        Ok(id)
    }

    /// Deletes a tab, its memory, editor and file records, and its connection.
    ///
    /// Releasing the connection on the server is best-effort.
    pub async fn delete_tab(&self, tab_id: TabId) -> Result<()> {
        let conn = {
            let mut tabs = self.store.tabs_mut();
            if tabs.remove_tab(tab_id).is_none() {
                return Err(ConsoleError::not_found(format!("query tab {tab_id}")));
            }
            self.store.conns().for_tab(tab_id)
        };
        self.store.mem().remove(tab_id);
        debug!(%tab_id, "Query tab deleted");

        if let Some(conn) = conn {
            // Failures are logged by the manager; the record is gone either way.
            let _ = self.conns.release(&conn.id).await;
        }
        Ok(())
    }

    /// Resets the last tab of a worksheet instead of deleting it.
    ///
    /// Query state, editor and file binding are cleared and the tab takes the
    /// default name again. The id and the bound connection are kept.
    pub fn refresh_last_tab(&self, tab_id: TabId) -> Result<()> {
        {
            let mut tabs = self.store.tabs_mut();
            let tab = tabs
                .tab_mut(tab_id)
                .ok_or_else(|| ConsoleError::not_found(format!("query tab {tab_id}")))?;
            tab.name = DEFAULT_TAB_NAME.to_string();
            tab.count = 1;

            if let Some(editor) = tabs.editor_mut(tab_id) {
                *editor = EditorState::default();
            }
            tabs.unbind_file(tab_id);
        }
        self.store.mem().reset(tab_id);
        debug!(%tab_id, "Query tab refreshed");
        Ok(())
    }
}
