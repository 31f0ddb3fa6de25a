//! Console session wiring.
//!
//! A [`Console`] owns one session's store and hands the same repositories to
//! the connection manager, the tab lifecycle and the dispatcher.

use std::sync::Arc;
use tracing::info;

use crate::api::{HttpSqlApi, SqlApi};
use crate::config::{Config, ConnectionParams};
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::notify::Notifier;
use crate::query::{QueryDispatcher, QueryLog};
use crate::store::{Store, TabId, WorksheetId};
use crate::tabs::TabLifecycle;

/// One query-editor session.
#[derive(Clone)]
pub struct Console {
    store: Arc<Store>,
    conns: ConnectionManager,
    tabs: TabLifecycle,
    dispatcher: QueryDispatcher,
    log: Arc<QueryLog>,
    notifier: Arc<Notifier>,
}

impl Console {
    /// Creates a session over the given API.
    pub fn new(api: Arc<dyn SqlApi>, config: &Config) -> Self {
        let store = Arc::new(Store::new());
        let log = Arc::new(QueryLog::new(config.query.log_capacity));
        let notifier = Arc::new(Notifier::new());
        let conns = ConnectionManager::new(api.clone(), store.clone());
        let tabs = TabLifecycle::new(store.clone(), conns.clone());
        let dispatcher = QueryDispatcher::new(
            api,
            store.clone(),
            log.clone(),
            notifier.clone(),
            &config.query,
        );

        Self {
            store,
            conns,
            tabs,
            dispatcher,
            log,
            notifier,
        }
    }

    /// Creates a session talking HTTP to the configured REST API.
    pub fn connect(config: &Config) -> Result<Self> {
        let api = HttpSqlApi::new(&config.api)?;
        info!("Using REST API at {}", config.api.base_url);
        Ok(Self::new(Arc::new(api), config))
    }

    /// Creates a worksheet, opens its connection and adds the first tab.
    pub async fn open_worksheet(
        &self,
        name: &str,
        params: &ConnectionParams,
    ) -> Result<(WorksheetId, TabId)> {
        let worksheet_id = self.store.create_worksheet(name);
        self.conns.open_for_worksheet(worksheet_id, params).await?;
        let tab_id = self.tabs.add_tab(worksheet_id, None).await?;
        info!(%worksheet_id, "Worksheet opened on {}", params.display_string());
        Ok((worksheet_id, tab_id))
    }

    /// Deletes every tab of a worksheet, releases its connection and forgets
    /// the worksheet.
    pub async fn close_worksheet(&self, worksheet_id: WorksheetId) -> Result<()> {
        let tab_ids: Vec<TabId> = self
            .store
            .tabs()
            .tabs_of(worksheet_id)
            .iter()
            .map(|t| t.id)
            .collect();
        for tab_id in tab_ids {
            self.tabs.delete_tab(tab_id).await?;
        }
        if let Some(conn) = self.store.conns().for_worksheet(worksheet_id) {
            let _ = self.conns.release(&conn.id).await;
        }
        self.store.tabs_mut().remove_worksheet(worksheet_id);
        Ok(())
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.conns
    }

    pub fn tabs(&self) -> &TabLifecycle {
        &self.tabs
    }

    pub fn dispatcher(&self) -> &QueryDispatcher {
        &self.dispatcher
    }

    pub fn log(&self) -> &Arc<QueryLog> {
        &self.log
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }
}
