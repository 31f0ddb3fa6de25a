//! Scripted SQL API for testing.
//!
//! Records every call, answers from a table of scripted replies, and can hold
//! a query in flight until the test releases it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::types::{ConnectionAttributes, ConnectionId, ConnectionInfo, QueryRequest, ResultSet};
use super::SqlApi;
use crate::config::ConnectionParams;
use crate::error::{ConsoleError, Result};

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open { target: String },
    Clone { id: ConnectionId },
    Query { id: ConnectionId, request: QueryRequest },
    Release { id: ConnectionId },
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    replies: HashMap<String, Result<ResultSet>>,
    gates: HashMap<String, Arc<Notify>>,
    clone_gate: Option<Arc<Notify>>,
    fail_clone: bool,
    fail_release: bool,
}

/// A mock SQL API that returns predefined results.
#[derive(Default)]
pub struct MockSqlApi {
    state: Mutex<MockState>,
    next_conn: AtomicU64,
}

impl MockSqlApi {
    /// Creates a mock where every query succeeds with a canned result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for an exact SQL string.
    pub fn reply(&self, sql: impl Into<String>, reply: Result<ResultSet>) {
        self.state.lock().replies.insert(sql.into(), reply);
    }

    /// Holds queries with this exact SQL until the returned gate is notified.
    ///
    /// A held query still honours its cancellation token.
    pub fn hold(&self, sql: impl Into<String>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().gates.insert(sql.into(), gate.clone());
        gate
    }

    /// Holds every `clone_connection` call until the returned gate is notified.
    pub fn hold_clone(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().clone_gate = Some(gate.clone());
        gate
    }

    /// Makes `clone_connection` fail.
    pub fn fail_clone(&self, fail: bool) {
        self.state.lock().fail_clone = fail;
    }

    /// Makes `release` fail.
    pub fn fail_release(&self, fail: bool) {
        self.state.lock().fail_release = fail;
    }

    /// Returns every call observed so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the SQL of every query observed so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Query { request, .. } => Some(request.sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits until a query with this SQL has been received.
    ///
    /// Returns false if it did not arrive within a second.
    pub async fn wait_for_query(&self, sql: &str) -> bool {
        self.wait_for_call(|call| matches!(call, MockCall::Query { request, .. } if request.sql == sql))
            .await
    }

    /// Waits until a call matching `pred` has been received, for up to a second.
    pub async fn wait_for_call(&self, pred: impl Fn(&MockCall) -> bool) -> bool {
        let arrived = async {
            while !self.state.lock().calls.iter().any(&pred) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(1), arrived)
            .await
            .is_ok()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().calls.push(call);
    }

    fn new_connection(&self) -> ConnectionInfo {
        let n = self.next_conn.fetch_add(1, Ordering::Relaxed) + 1;
        ConnectionInfo {
            id: ConnectionId::new(format!("conn-{n}")),
            attributes: ConnectionAttributes {
                thread_id: 100 + n,
                seconds_idle: Some(0.0),
            },
        }
    }

    fn default_reply(sql: &str) -> ResultSet {
        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            ResultSet::new(
                sql,
                vec![json!({
                    "fields": ["result"],
                    "data": [[format!("Mock result for: {}", sql)]],
                    "complete": true,
                })],
            )
        } else {
            ResultSet::new(sql, vec![json!({"affected_rows": 0, "last_insert_id": 0, "warnings": 0})])
        }
    }
}

#[async_trait]
impl SqlApi for MockSqlApi {
    async fn open(&self, params: &ConnectionParams) -> Result<ConnectionInfo> {
        self.record(MockCall::Open {
            target: params.target.clone(),
        });
        Ok(self.new_connection())
    }

    async fn clone_connection(&self, id: &ConnectionId) -> Result<ConnectionInfo> {
        self.record(MockCall::Clone { id: id.clone() });
        let gate = self.state.lock().clone_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.lock().fail_clone {
            return Err(ConsoleError::api(503, "clone refused"));
        }
        Ok(self.new_connection())
    }

    async fn query(
        &self,
        id: &ConnectionId,
        request: &QueryRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ResultSet> {
        self.record(MockCall::Query {
            id: id.clone(),
            request: request.clone(),
        });

        let gate = self.state.lock().gates.get(&request.sql).cloned();
        if let Some(gate) = gate {
            let token = cancel.unwrap_or_default();
            tokio::select! {
                _ = gate.notified() => {}
                _ = token.cancelled() => return Err(ConsoleError::Cancelled),
            }
        }

        let scripted = self.state.lock().replies.get(&request.sql).cloned();
        scripted.unwrap_or_else(|| Ok(Self::default_reply(&request.sql)))
    }

    async fn release(&self, id: &ConnectionId) -> Result<()> {
        self.record(MockCall::Release { id: id.clone() });
        if self.state.lock().fail_release {
            return Err(ConsoleError::transport("connection reset"));
        }
        Ok(())
    }
}
