//! SQL connection records and what they are bound to.

use parking_lot::RwLock;

use super::{TabId, WorksheetId};
use crate::api::{ConnectionId, ConnectionInfo};

/// Owner of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnBinding {
    /// Shared worksheet connection, used for `KILL QUERY` and as clone source.
    Worksheet(WorksheetId),
    /// Connection dedicated to one query tab.
    QueryTab(TabId),
}

/// A SQL connection opened through the REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConn {
    pub id: ConnectionId,
    /// Name of the target the connection was opened against.
    pub name: String,
    /// Server-side thread executing this connection's queries.
    pub thread_id: u64,
    pub active_db: Option<String>,
    pub binding: ConnBinding,
}

impl QueryConn {
    pub fn from_info(info: ConnectionInfo, name: impl Into<String>, binding: ConnBinding) -> Self {
        Self {
            id: info.id,
            name: name.into(),
            thread_id: info.attributes.thread_id,
            active_db: None,
            binding,
        }
    }
}

/// Repository of connection records.
#[derive(Debug, Default)]
pub struct ConnectionStore {
    conns: RwLock<Vec<QueryConn>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection, replacing any other connection with the same binding.
    pub fn insert(&self, conn: QueryConn) {
        let mut conns = self.conns.write();
        conns.retain(|c| c.binding != conn.binding && c.id != conn.id);
        conns.push(conn);
    }

    pub fn find(&self, id: &ConnectionId) -> Option<QueryConn> {
        self.conns.read().iter().find(|c| &c.id == id).cloned()
    }

    pub fn for_tab(&self, tab_id: TabId) -> Option<QueryConn> {
        self.by_binding(ConnBinding::QueryTab(tab_id))
    }

    pub fn for_worksheet(&self, worksheet_id: WorksheetId) -> Option<QueryConn> {
        self.by_binding(ConnBinding::Worksheet(worksheet_id))
    }

    fn by_binding(&self, binding: ConnBinding) -> Option<QueryConn> {
        self.conns
            .read()
            .iter()
            .find(|c| c.binding == binding)
            .cloned()
    }

    pub fn set_active_db(&self, id: &ConnectionId, db: Option<String>) {
        if let Some(conn) = self.conns.write().iter_mut().find(|c| &c.id == id) {
            conn.active_db = db;
        }
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<QueryConn> {
        let mut conns = self.conns.write();
        let pos = conns.iter().position(|c| &c.id == id)?;
        Some(conns.remove(pos))
    }
}
