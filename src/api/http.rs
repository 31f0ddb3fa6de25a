//! reqwest-backed implementation of the REST SQL API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{ConnectionId, ConnectionInfo, Envelope, ErrorDocument, QueryRequest, ResultSet};
use super::SqlApi;
use crate::config::{ApiConfig, ConnectionParams};
use crate::error::{ConsoleError, Result};

/// HTTP client for the `/sql` endpoints.
#[derive(Debug, Clone)]
pub struct HttpSqlApi {
    base_url: Url,
    user: Option<String>,
    password: Option<String>,
    client: Client,
}

impl HttpSqlApi {
    /// Creates a client from the API section of the configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.url()?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConsoleError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Returns the absolute URL of an endpoint below the API root.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = self.authorize(request).send().await.map_err(map_send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConsoleError::transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ConsoleError::api(
                status.as_u16(),
                ErrorDocument::message_or(&body),
            ));
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        let doc: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| ConsoleError::internal(format!("Failed to parse response: {}", e)))?;
        Ok(doc.data)
    }
}

fn map_send_error(e: reqwest::Error) -> ConsoleError {
    if e.is_timeout() {
        ConsoleError::transport("Request timed out")
    } else if e.is_connect() {
        ConsoleError::transport(format!("Failed to connect to the REST API: {}", e))
    } else {
        ConsoleError::transport(format!("Request failed: {}", e))
    }
}

#[async_trait]
impl SqlApi for HttpSqlApi {
    async fn open(&self, params: &ConnectionParams) -> Result<ConnectionInfo> {
        let request = self.client.post(self.endpoint("sql")).json(params);
        self.send_json(request).await
    }

    async fn clone_connection(&self, id: &ConnectionId) -> Result<ConnectionInfo> {
        let request = self.client.post(self.endpoint(&format!("sql/{id}/clone")));
        self.send_json(request).await
    }

    async fn query(
        &self,
        id: &ConnectionId,
        request: &QueryRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ResultSet> {
        let builder = self
            .client
            .post(self.endpoint(&format!("sql/{id}/queries")))
            .json(request);
        let exchange = self.send_json::<ResultSet>(builder);

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ConsoleError::Cancelled),
                result = exchange => result,
            },
            None => exchange.await,
        }
    }

    async fn release(&self, id: &ConnectionId) -> Result<()> {
        let request = self.client.delete(self.endpoint(&format!("sql/{id}")));
        self.send(request).await.map(|_| ())
    }
}
