//! Bigtable Repository
//!
//! 管理操作は Admin REST API、データ操作は bigtable_rs の gRPC 接続で行う

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigtable_rs::bigtable::BigTableConnection;
use bigtable_rs::google::bigtable::v2::{MutateRowRequest, ReadRowsRequest};
use futures::stream::{self, StreamExt};
use log::debug;
use serde_json::json;
use tokio::sync::mpsc;

use super::models::{
    build_filter, build_row_set, set_cell_mutations, short_table_name, to_wide_row,
    AdminTable, AdminTableList,
};
use crate::adapter::rest::RestClient;
use crate::domain::entities::wide_row::{ColumnValues, ReadRowsOptions, RowSelection, WideRow};
use crate::domain::repositories::wide_column_repository::{RowStream, WideColumnRepository};
use crate::domain::services::pagination::Page;

/// Number of gRPC channels opened per connection
const CHANNEL_SIZE: usize = 4;

/// Rows buffered between the gRPC scan and the consumer
const ROW_BUFFER: usize = 64;

/// Bigtable repository bound to one instance
pub struct BigtableRepository {
    connection: BigTableConnection,
    admin: RestClient,
    instance_path: String,
}

impl BigtableRepository {
    /// Opens the data connection for `projects/{project_id}/instances/{instance}`
    ///
    /// `BIGTABLE_EMULATOR_HOST` is honored by bigtable_rs.
    pub fn connect(
        project_id: &str,
        instance: &str,
        admin: RestClient,
        token_provider: Arc<dyn gcp_auth::TokenProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let connection = BigTableConnection::new_with_token_provider(
            project_id,
            instance,
            false,
            CHANNEL_SIZE,
            timeout,
            token_provider,
        )
        .with_context(|| format!("Failed to connect to Bigtable {}/{}", project_id, instance))?;

        Ok(Self {
            connection,
            admin,
            instance_path: format!("projects/{}/instances/{}", project_id, instance),
        })
    }

    fn table_path(&self, table: &str) -> String {
        format!("{}/tables/{}", self.instance_path, table)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl WideColumnRepository for BigtableRepository {
    async fn list_tables_page(&self, page_token: Option<String>) -> Result<Page<String>> {
        let mut query = vec![("view", "NAME_ONLY".to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let list: AdminTableList = self
            .admin
            .get_json(&format!("{}/tables", self.instance_path), &query)
            .await?;

        Ok(Page::new(
            list.tables
                .iter()
                .map(|t| short_table_name(&t.name).to_string())
                .collect(),
            list.next_page_token,
        ))
    }

    async fn create_table(&self, table: &str) -> Result<()> {
        let _: AdminTable = self
            .admin
            .post_json(
                &format!("{}/tables", self.instance_path),
                &json!({ "tableId": table, "table": {} }),
            )
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<()> {
        self.admin
            .delete(&self.table_path(table))
            .await
            .with_context(|| format!("Failed to delete table {}", table))
    }

    async fn list_column_families(&self, table: &str) -> Result<Vec<String>> {
        let metadata: AdminTable = self
            .admin
            .get_json(&self.table_path(table), &[("view", "SCHEMA_VIEW".to_string())])
            .await
            .with_context(|| format!("Failed to get table {}", table))?;

        Ok(metadata.column_families.into_keys().collect())
    }

    async fn create_column_family(&self, table: &str, family: &str) -> Result<()> {
        let _: AdminTable = self
            .admin
            .post_json(
                &format!("{}:modifyColumnFamilies", self.table_path(table)),
                &json!({ "modifications": [{ "id": family, "create": {} }] }),
            )
            .await
            .with_context(|| format!("Failed to create column family {} on {}", family, table))?;
        Ok(())
    }

    async fn mutate_row(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        columns: &ColumnValues,
        timestamp_micros: i64,
    ) -> Result<()> {
        let mut client = self.connection.client();
        let request = MutateRowRequest {
            table_name: client.get_full_table_name(table),
            row_key: row_key.as_bytes().to_vec(),
            mutations: set_cell_mutations(family, columns, timestamp_micros),
            ..Default::default()
        };

        client
            .mutate_row(request)
            .await
            .with_context(|| format!("Failed to mutate row {} in {}", row_key, table))?;
        Ok(())
    }

    async fn stream_rows(&self, table: &str, options: &ReadRowsOptions) -> Result<RowStream> {
        let mut client = self.connection.client();
        let request = ReadRowsRequest {
            table_name: client.get_full_table_name(table),
            rows: build_row_set(&options.selection),
            filter: options.filter.as_ref().map(build_filter),
            rows_limit: options
                .limit
                .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
                .unwrap_or(0),
            ..Default::default()
        };
        let prefix = match &options.selection {
            RowSelection::Prefix(prefix) => Some(prefix.as_bytes().to_vec()),
            _ => None,
        };

        // スキャンはタスク側で進め、受信側が drop されたら gRPC ストリームごと破棄する
        let table = table.to_string();
        let (tx, rx) = mpsc::channel::<Result<WideRow>>(ROW_BUFFER);
        tokio::spawn(async move {
            let opened = match prefix {
                Some(prefix) => client
                    .stream_rows_with_prefix(request, prefix)
                    .await
                    .map(|rows| rows.boxed()),
                None => client.stream_rows(request).await.map(|rows| rows.boxed()),
            };
            let mut rows = match opened {
                Ok(rows) => rows,
                Err(e) => {
                    let err = anyhow::Error::new(e)
                        .context(format!("Failed to read rows from {}", table));
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };

            let mut scanned = 0usize;
            while let Some(row) = rows.next().await {
                let row = row
                    .map(|(key, cells)| to_wide_row(key, cells))
                    .with_context(|| format!("Failed to read rows from {}", table));
                let failed = row.is_err();
                if tx.send(row).await.is_err() {
                    debug!("Scan of {} stopped by reader after {} rows", table, scanned);
                    return;
                }
                if failed {
                    return;
                }
                scanned += 1;
            }
            debug!("Read {} rows from {}", scanned, table);
        });

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|row| (row, rx))
        })
        .boxed())
    }
}
