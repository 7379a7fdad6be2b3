//! Bulk dataset loader boundary
//!
//! Loads CSV extracts into warehouse tables through a `TableWriter`
//! collaborator. A missing file is skipped with a warning and the batch
//! continues; an existing target table is fully replaced.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Warehouse-side collaborator that replaces one table from a CSV file
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Replace `table` with the contents of `csv_path`, returning the
    /// number of rows written.
    async fn replace_table(&self, table: &str, csv_path: &Path) -> Result<u64>;
}

/// Outcome of one bulk load
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadReport {
    /// Tables written, in mapping order
    pub loaded: Vec<String>,
    /// Files that were absent and skipped
    pub skipped: Vec<PathBuf>,
    /// Total rows written
    pub rows: u64,
}

/// Ordered mapping of CSV files to target tables
pub struct DatasetLoader {
    mappings: Vec<(PathBuf, String)>,
}

impl DatasetLoader {
    pub fn new(mappings: Vec<(PathBuf, String)>) -> Self {
        Self { mappings }
    }

    /// The retail warehouse extract layout
    pub fn retail(data_dir: &Path) -> Self {
        let tables = [
            ("dim_customer.csv", "DIM_CUSTOMER"),
            ("dim_date.csv", "DIM_DATE"),
            ("dim_employee.csv", "DIM_EMPLOYEE"),
            ("dim_product.csv", "DIM_PRODUCT"),
            ("dim_promotion.csv", "DIM_PROMOTION"),
            ("dim_store.csv", "DIM_STORE"),
            ("dim_supplier.csv", "DIM_SUPPLIER"),
            ("fact_employee_performance.csv", "FACT_EMPLOYEE_PERFORMANCE"),
            ("fact_inventory.csv", "FACT_INVENTORY"),
            ("fact_purchase_orders.csv", "FACT_PURCHASE_ORDERS"),
            ("fact_sales.csv", "FACT_SALES"),
        ];
        Self::new(
            tables
                .iter()
                .map(|(file, table)| (data_dir.join(file), table.to_string()))
                .collect(),
        )
    }

    /// Load every mapped file
    ///
    /// Absent files never abort the batch; a write failure for a present
    /// file does, since it points at the warehouse rather than the extract.
    pub async fn load(&self, writer: &dyn TableWriter) -> Result<LoadReport> {
        info!("loading {} table extract(s)", self.mappings.len());
        let mut report = LoadReport::default();

        for (path, table) in &self.mappings {
            if !path.exists() {
                warn!("file {} not found, skipping {}", path.display(), table);
                report.skipped.push(path.clone());
                continue;
            }

            info!("loading {} into {}", path.display(), table);
            let rows = writer.replace_table(table, path).await?;
            report.rows += rows;
            report.loaded.push(table.clone());
        }

        info!(
            "load finished: {} table(s) written, {} file(s) skipped",
            report.loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
