//! Worksheets, query tabs and the per-tab records that cascade with them.

use std::collections::HashMap;
use std::path::PathBuf;

use super::{TabId, WorksheetId};

/// Name given to the first tab of a worksheet and to a refreshed last tab.
pub const DEFAULT_TAB_NAME: &str = "Query Tab 1";

/// A worksheet groups query tabs that share one worksheet connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    pub id: WorksheetId,
    pub name: String,
    pub active_query_tab_id: Option<TabId>,
}

/// One query-editing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTab {
    pub id: TabId,
    pub worksheet_id: WorksheetId,
    pub name: String,
    /// Sequence number used to generate the default name.
    pub count: u32,
}

/// Editor contents of a tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorState {
    pub sql: String,
    pub is_dirty: bool,
}

/// Local file a tab was opened from or saved to.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    pub path: PathBuf,
}

/// Repository of worksheets, tabs and their editor and file records.
#[derive(Debug, Default)]
pub struct TabRepo {
    worksheets: Vec<Worksheet>,
    tabs: Vec<QueryTab>,
    editors: HashMap<TabId, EditorState>,
    file_handles: HashMap<TabId, FileHandle>,
}

impl TabRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_worksheet(&mut self, name: impl Into<String>) -> WorksheetId {
        let id = WorksheetId::new();
        self.worksheets.push(Worksheet {
            id,
            name: name.into(),
            active_query_tab_id: None,
        });
        id
    }

    pub fn worksheet(&self, id: WorksheetId) -> Option<&Worksheet> {
        self.worksheets.iter().find(|w| w.id == id)
    }

    pub fn worksheet_mut(&mut self, id: WorksheetId) -> Option<&mut Worksheet> {
        self.worksheets.iter_mut().find(|w| w.id == id)
    }

    /// Removes a worksheet together with any tabs still attached to it.
    pub fn remove_worksheet(&mut self, id: WorksheetId) -> Option<Worksheet> {
        let pos = self.worksheets.iter().position(|w| w.id == id)?;
        let orphans: Vec<TabId> = self.tabs_of(id).iter().map(|t| t.id).collect();
        for tab_id in orphans {
            self.remove_tab(tab_id);
        }
        Some(self.worksheets.remove(pos))
    }

    pub fn tab(&self, id: TabId) -> Option<&QueryTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn tab_mut(&mut self, id: TabId) -> Option<&mut QueryTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// Tabs of a worksheet, in creation order.
    pub fn tabs_of(&self, worksheet_id: WorksheetId) -> Vec<&QueryTab> {
        self.tabs
            .iter()
            .filter(|t| t.worksheet_id == worksheet_id)
            .collect()
    }

    /// The next sequence count for a worksheet's tabs.
    pub fn next_count(&self, worksheet_id: WorksheetId) -> u32 {
        self.tabs_of(worksheet_id)
            .iter()
            .map(|t| t.count)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Inserts a tab with an empty editor and makes it the worksheet's active tab.
    pub fn insert_tab(&mut self, tab: QueryTab) {
        let (id, worksheet_id) = (tab.id, tab.worksheet_id);
        self.tabs.push(tab);
        self.editors.insert(id, EditorState::default());
        if let Some(worksheet) = self.worksheet_mut(worksheet_id) {
            worksheet.active_query_tab_id = Some(id);
        }
    }

    /// Removes a tab and the records that cascade with it.
    ///
    /// If the tab was active, the worksheet's last remaining tab becomes active.
    pub fn remove_tab(&mut self, id: TabId) -> Option<QueryTab> {
        let pos = self.tabs.iter().position(|t| t.id == id)?;
        let tab = self.tabs.remove(pos);
        self.editors.remove(&id);
        self.file_handles.remove(&id);

        let fallback = self.tabs_of(tab.worksheet_id).last().map(|t| t.id);
        if let Some(worksheet) = self.worksheet_mut(tab.worksheet_id) {
            if worksheet.active_query_tab_id == Some(id) {
                worksheet.active_query_tab_id = fallback;
            }
        }
        Some(tab)
    }

    pub fn editor(&self, id: TabId) -> Option<&EditorState> {
        self.editors.get(&id)
    }

    pub fn editor_mut(&mut self, id: TabId) -> Option<&mut EditorState> {
        self.editors.get_mut(&id)
    }

    pub fn file_handle(&self, id: TabId) -> Option<&FileHandle> {
        self.file_handles.get(&id)
    }

    pub fn bind_file(&mut self, id: TabId, path: impl Into<PathBuf>) {
        self.file_handles.insert(id, FileHandle { path: path.into() });
    }

    pub fn unbind_file(&mut self, id: TabId) -> Option<FileHandle> {
        self.file_handles.remove(&id)
    }
}
