//! In-memory repositories for worksheets, query tabs, tab memory and connections.
//!
//! A [`Store`] is created once per session and handed to the dispatcher and
//! the tab lifecycle explicitly. Locks are only held inside synchronous
//! methods and never across an await point.

mod connections;
mod tab_mem;
mod tabs;

pub use connections::{ConnBinding, ConnectionStore, QueryConn};
pub use tab_mem::{QueryResultsSlot, QueryRunState, RequestId, ResultSlot, TabMemStore, TabMemory};
pub use tabs::{EditorState, FileHandle, QueryTab, TabRepo, Worksheet, DEFAULT_TAB_NAME};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a query tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorksheetId(Uuid);

impl WorksheetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorksheetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorksheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All session state of the query editor.
#[derive(Debug, Default)]
pub struct Store {
    tabs: RwLock<TabRepo>,
    mem: TabMemStore,
    conns: ConnectionStore,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty worksheet.
    pub fn create_worksheet(&self, name: impl Into<String>) -> WorksheetId {
        self.tabs.write().insert_worksheet(name)
    }

    pub fn tabs(&self) -> RwLockReadGuard<'_, TabRepo> {
        self.tabs.read()
    }

    pub fn tabs_mut(&self) -> RwLockWriteGuard<'_, TabRepo> {
        self.tabs.write()
    }

    pub fn mem(&self) -> &TabMemStore {
        &self.mem
    }

    pub fn conns(&self) -> &ConnectionStore {
        &self.conns
    }

    /// Returns a copy of a tab, if it exists.
    pub fn tab(&self, id: TabId) -> Option<QueryTab> {
        self.tabs.read().tab(id).cloned()
    }
}
