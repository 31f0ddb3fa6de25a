//! REST SQL API abstraction.
//!
//! Provides a trait-based interface over the console's `/sql` endpoints so the
//! dispatcher and tab lifecycle can run against the HTTP client or a scripted
//! mock interchangeably.

mod http;
mod mock;
mod types;

pub use http::HttpSqlApi;
pub use mock::{MockCall, MockSqlApi};
pub use types::{
    ConnectionAttributes, ConnectionId, ConnectionInfo, Envelope, ErrorDocument, QueryRequest,
    ResultAttributes, ResultSet, QUERY_CANCELED,
};

use crate::config::ConnectionParams;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait defining the REST SQL API used by the console.
///
/// All operations are async and return Results with ConsoleError.
#[async_trait]
pub trait SqlApi: Send + Sync {
    /// Opens a new connection (`POST /sql`).
    async fn open(&self, params: &ConnectionParams) -> Result<ConnectionInfo>;

    /// Clones an existing connection (`POST /sql/{id}/clone`).
    async fn clone_connection(&self, id: &ConnectionId) -> Result<ConnectionInfo>;

    /// Runs SQL on a connection (`POST /sql/{id}/queries`).
    ///
    /// When `cancel` fires before the response settles the call fails with
    /// `ConsoleError::Cancelled`. Cancelling only abandons the HTTP exchange;
    /// the server keeps executing.
    async fn query(
        &self,
        id: &ConnectionId,
        request: &QueryRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ResultSet>;

    /// Closes a connection (`DELETE /sql/{id}`).
    async fn release(&self, id: &ConnectionId) -> Result<()>;
}
