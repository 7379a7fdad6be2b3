//! HTTP warehouse backend
//!
//! Thin client for the SQL gateway that fronts the retail warehouse. The
//! gateway owns connection strings and credentials; this service only
//! speaks its read-only HTTP surface.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::config::WarehouseConfig;
use crate::error::{AppError, Result};
use crate::loader::TableWriter;
use crate::tools::{QueryRow, SqlBackend, TableSchema};

pub struct HttpWarehouse {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    rows: Vec<QueryRow>,
}

#[derive(Deserialize)]
struct LoadResponse {
    rows: u64,
}

impl HttpWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SqlBackend for HttpWarehouse {
    async fn describe_table(&self, name: &str) -> Result<TableSchema> {
        let response = self
            .client
            .get(format!("{}/tables/{}", self.base_url, name))
            .send()
            .await
            .map_err(|e| AppError::Query(format!("warehouse unreachable: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("table not found: {}", name)));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Query(format!("describe failed: {}", body)));
        }

        response
            .json::<TableSchema>()
            .await
            .map_err(|e| AppError::Query(format!("malformed schema response: {}", e)))
    }

    async fn execute(&self, sql: &str) -> Result<Vec<QueryRow>> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await
            .map_err(|e| AppError::Query(format!("warehouse unreachable: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Query(body));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Query(format!("malformed query response: {}", e)))?;
        Ok(parsed.rows)
    }
}

#[async_trait]
impl TableWriter for HttpWarehouse {
    async fn replace_table(&self, table: &str, csv_path: &Path) -> Result<u64> {
        let body = tokio::fs::read_to_string(csv_path).await?;
        let response = self
            .client
            .put(format!("{}/tables/{}", self.base_url, table))
            .header("content-type", "text/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Query(format!("warehouse unreachable: {}", e)))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Query(format!(
                "load of {} failed: {}",
                table, text
            )));
        }

        let parsed: LoadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Query(format!("malformed load response: {}", e)))?;
        Ok(parsed.rows)
    }
}
