//! Per-tab ephemeral query state.
//!
//! Every query tab owns one [`TabMemory`] record holding its in-flight
//! bookkeeping and the latest result of each slot. Records are only touched
//! through [`TabMemStore::update`], which runs the mutation under a short lock
//! so readers never observe a half-applied change.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::TabId;
use crate::api::ResultSet;

/// Unique identifier for a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Generates a new unique request ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One result buffer of a tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSlot {
    /// When the current request was sent.
    pub request_sent_time: Option<DateTime<Utc>>,
    /// Round-trip time of the last settled request, in seconds.
    pub total_duration: f64,
    pub is_loading: bool,
    /// Result of the last successful request. Shared, never mutated in place.
    pub data: Option<Arc<ResultSet>>,
    /// Request currently owning this slot.
    pub request_id: Option<RequestId>,
}

impl ResultSlot {
    /// True when nothing was ever requested into this slot.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Starts a new request, dropping the previous request's bookkeeping.
    pub(crate) fn begin(&mut self, request_id: RequestId, sent: DateTime<Utc>) {
        self.request_sent_time = Some(sent);
        self.total_duration = 0.0;
        self.is_loading = true;
        self.request_id = Some(request_id);
    }

    /// Whether a response for `request_id` may still write into this slot.
    pub(crate) fn is_owned_by(&self, request_id: RequestId) -> bool {
        self.request_id == Some(request_id)
    }
}

/// Lifecycle of the user query running in a tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryRunState {
    /// No query was dispatched yet.
    #[default]
    Idle,
    /// A query is in flight.
    Running,
    /// `KILL QUERY` was acknowledged by the server while the query was in flight.
    KillRequested,
    /// The last query completed, failed, or was killed.
    Settled,
}

/// The user query slot. Unlike the preview slots it owns a cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct QueryResultsSlot {
    pub result: ResultSlot,
    pub abort: Option<CancellationToken>,
    pub run_state: QueryRunState,
}

impl QueryResultsSlot {
    pub fn is_empty(&self) -> bool {
        self.result.is_empty() && self.abort.is_none() && self.run_state == QueryRunState::Idle
    }
}

/// Ephemeral state of one query tab.
#[derive(Debug, Clone, Default)]
pub struct TabMemory {
    pub is_conn_busy: bool,
    pub prvw_data: ResultSlot,
    pub prvw_data_details: ResultSlot,
    pub query_results: QueryResultsSlot,
}

impl TabMemory {
    /// True once a `KILL QUERY` for the running query has been acknowledged.
    pub fn has_kill_flag(&self) -> bool {
        self.query_results.run_state == QueryRunState::KillRequested
    }

    /// Clears both preview slots.
    pub fn clear_previews(&mut self) {
        self.prvw_data = ResultSlot::default();
        self.prvw_data_details = ResultSlot::default();
    }
}

/// Repository of [`TabMemory`] records keyed by tab.
#[derive(Debug, Default)]
pub struct TabMemStore {
    records: Mutex<HashMap<TabId, TabMemory>>,
}

impl TabMemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record for a tab, replacing any previous one.
    pub fn insert(&self, tab_id: TabId) {
        self.records.lock().insert(tab_id, TabMemory::default());
    }

    /// Applies `mutate` to the record of `tab_id`.
    ///
    /// Returns `None` without calling `mutate` if the tab has no record.
    pub fn update<R>(&self, tab_id: TabId, mutate: impl FnOnce(&mut TabMemory) -> R) -> Option<R> {
        self.records.lock().get_mut(&tab_id).map(mutate)
    }

    /// Returns a snapshot of the record, or an empty record if absent.
    pub fn find(&self, tab_id: TabId) -> TabMemory {
        self.records.lock().get(&tab_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.records.lock().contains_key(&tab_id)
    }

    /// Resets a record to empty, keeping it registered.
    pub fn reset(&self, tab_id: TabId) {
        self.update(tab_id, |mem| *mem = TabMemory::default());
    }

    pub fn remove(&self, tab_id: TabId) -> Option<TabMemory> {
        self.records.lock().remove(&tab_id)
    }
}
