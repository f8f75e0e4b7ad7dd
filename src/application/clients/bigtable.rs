//! # Bigtable Client
//!
//! Bigtable の操作を簡略化したラッパー

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};

use crate::application::clients::handle::ClientHandle;
use crate::application::dto::client_options::ClientOptions;
use crate::application::registry::Closeable;
use crate::domain::entities::name_list::NameList;
use crate::domain::entities::wide_row::{
    ColumnValues, ReadRowsOptions, RowFilter, RowSelection, WideRow,
};
use crate::domain::repositories::wide_column_repository::WideColumnRepository;
use crate::domain::services::deadline::with_timeout;
use crate::domain::services::pagination::collect_pages;

/// Bigtable 操作のエラー
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BigtableError {
    #[error("could not initialize Bigtable admin client")]
    AdminInit {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not initialize Bigtable client")]
    Init {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get Bigtable table names")]
    TableNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not create Bigtable table")]
    CreateTable {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not delete Bigtable table")]
    DeleteTable {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get Bigtable column family names")]
    ColumnFamilies {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not create Bigtable column family name")]
    CreateColumnFamily {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not add a new Bigtable row")]
    AddRow {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read Bigtable row by its key")]
    ReadRow {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read Bigtable rows by its keys")]
    ReadRowsByKeys {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read Bigtable rows by its key prefix")]
    ReadRowsByKeyPrefix {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read Bigtable rows by its key range")]
    ReadRowsByKeyRange {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read Bigtable rows")]
    ReadRows {
        #[source]
        source: anyhow::Error,
    },
    #[error("Bigtable client is closed")]
    Closed,
}

/// レジストリのキー（`project.instance`）
pub fn instance_key(project_id: &str, instance: &str) -> String {
    format!("{}.{}", project_id, instance)
}

/// Bigtable クライアントラッパー
///
/// 1つのインスタンスに紐づく。管理 API とデータ API の両方を `R` が担う。
pub struct BigtableClient<R> {
    project_id: String,
    instance: String,
    options: ClientOptions,
    handle: ClientHandle<R>,
}

impl<R: WideColumnRepository> BigtableClient<R> {
    pub fn new(
        project_id: impl Into<String>,
        instance: impl Into<String>,
        options: ClientOptions,
        repository: R,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance: instance.into(),
            options,
            handle: ClientHandle::open(repository),
        }
    }

    pub fn key(&self) -> String {
        instance_key(&self.project_id, &self.instance)
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn repository(&self) -> Result<Arc<R>, BigtableError> {
        self.handle.acquire().ok_or(BigtableError::Closed)
    }

    async fn table_names(&self, repo: &R) -> anyhow::Result<NameList> {
        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_tables_page(token)),
        )
        .await?;
        Ok(NameList::from(names))
    }

    async fn collect_rows(
        repo: &R,
        table: &str,
        options: &ReadRowsOptions,
    ) -> anyhow::Result<Vec<WideRow>> {
        repo.stream_rows(table, options).await?.try_collect().await
    }

    pub async fn get_table_names(&self) -> Result<NameList, BigtableError> {
        let repo = self.repository()?;
        self.table_names(&repo)
            .await
            .map_err(|source| BigtableError::TableNames { source })
    }

    /// テーブルが無ければ作成する
    pub async fn create_table(&self, table: &str) -> Result<(), BigtableError> {
        let repo = self.repository()?;
        let names = self
            .table_names(&repo)
            .await
            .map_err(|source| BigtableError::CreateTable { source })?;

        if names.contains(table) {
            debug!("Bigtable table {} already exists", table);
            return Ok(());
        }

        repo.create_table(table)
            .await
            .map_err(|source| BigtableError::CreateTable { source })?;
        info!("Created Bigtable table {}", table);
        Ok(())
    }

    /// テーブルがあれば削除する
    pub async fn delete_table(&self, table: &str) -> Result<(), BigtableError> {
        let repo = self.repository()?;
        let names = self
            .table_names(&repo)
            .await
            .map_err(|source| BigtableError::DeleteTable { source })?;

        if !names.contains(table) {
            debug!("Bigtable table {} does not exist", table);
            return Ok(());
        }

        repo.delete_table(table)
            .await
            .map_err(|source| BigtableError::DeleteTable { source })?;
        info!("Deleted Bigtable table {}", table);
        Ok(())
    }

    async fn column_families(&self, repo: &R, table: &str) -> anyhow::Result<NameList> {
        let families = with_timeout(
            Some(self.options.list_timeout),
            repo.list_column_families(table),
        )
        .await?;
        Ok(NameList::from(families).sort())
    }

    /// カラムファミリー名（昇順）
    pub async fn get_column_families(&self, table: &str) -> Result<NameList, BigtableError> {
        let repo = self.repository()?;
        self.column_families(&repo, table)
            .await
            .map_err(|source| BigtableError::ColumnFamilies { source })
    }

    /// カラムファミリーが無ければ作成する
    pub async fn create_column_family(&self, table: &str, family: &str) -> Result<(), BigtableError> {
        let repo = self.repository()?;
        let families = self
            .column_families(&repo, table)
            .await
            .map_err(|source| BigtableError::CreateColumnFamily { source })?;

        if families.contains(family) {
            return Ok(());
        }

        repo.create_column_family(table, family)
            .await
            .map_err(|source| BigtableError::CreateColumnFamily { source })?;
        info!("Created column family {} on {}", family, table);
        Ok(())
    }

    /// 1行分の列をまとめて書き込む
    ///
    /// タイムスタンプは現在時刻（ミリ秒精度）
    pub async fn add_row(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        columns: &ColumnValues,
    ) -> Result<(), BigtableError> {
        let repo = self.repository()?;
        let timestamp_micros = Utc::now().timestamp_millis() * 1000;

        repo.mutate_row(table, row_key, family, columns, timestamp_micros)
            .await
            .map_err(|source| BigtableError::AddRow { source })
    }

    /// 行キーで1行読む。存在しなければ `None`
    pub async fn read_row(
        &self,
        table: &str,
        row_key: &str,
        filter: Option<RowFilter>,
    ) -> Result<Option<WideRow>, BigtableError> {
        let repo = self.repository()?;
        let options = ReadRowsOptions::new(RowSelection::Keys(vec![row_key.to_string()]))
            .with_filter(filter)
            .with_limit(1);

        let rows = Self::collect_rows(&repo, table, &options)
            .await
            .map_err(|source| BigtableError::ReadRow { source })?;
        Ok(rows.into_iter().find(|row| row.key == row_key))
    }

    pub async fn read_rows_by_keys(
        &self,
        table: &str,
        row_keys: &[String],
        filter: Option<RowFilter>,
    ) -> Result<Vec<WideRow>, BigtableError> {
        if row_keys.is_empty() {
            return Ok(Vec::new());
        }
        let repo = self.repository()?;
        let options =
            ReadRowsOptions::new(RowSelection::Keys(row_keys.to_vec())).with_filter(filter);

        Self::collect_rows(&repo, table, &options)
            .await
            .map_err(|source| BigtableError::ReadRowsByKeys { source })
    }

    pub async fn read_rows_by_key_prefix(
        &self,
        table: &str,
        prefix: &str,
        filter: Option<RowFilter>,
    ) -> Result<Vec<WideRow>, BigtableError> {
        let repo = self.repository()?;
        let options =
            ReadRowsOptions::new(RowSelection::Prefix(prefix.to_string())).with_filter(filter);

        Self::collect_rows(&repo, table, &options)
            .await
            .map_err(|source| BigtableError::ReadRowsByKeyPrefix { source })
    }

    /// `[start_key, end_key)` の行を読む
    pub async fn read_rows_by_key_range(
        &self,
        table: &str,
        start_key: &str,
        end_key: &str,
        filter: Option<RowFilter>,
    ) -> Result<Vec<WideRow>, BigtableError> {
        let repo = self.repository()?;
        let options = ReadRowsOptions::new(RowSelection::Range {
            start: start_key.to_string(),
            end: end_key.to_string(),
        })
        .with_filter(filter);

        Self::collect_rows(&repo, table, &options)
            .await
            .map_err(|source| BigtableError::ReadRowsByKeyRange { source })
    }

    /// 条件に一致する行を1行ずつ `f` に渡します。
    ///
    /// `options.limit` に達するか、`f` が `ControlFlow::Break` を返した時点で終了します。
    ///
    /// # Returns
    ///
    /// `f` に渡した行数
    pub async fn read_rows<F>(
        &self,
        table: &str,
        options: &ReadRowsOptions,
        mut f: F,
    ) -> Result<usize, BigtableError>
    where
        F: FnMut(WideRow) -> ControlFlow<()>,
    {
        if options.limit == Some(0) {
            return Ok(0);
        }
        let repo = self.repository()?;
        let mut rows = repo
            .stream_rows(table, options)
            .await
            .map_err(|source| BigtableError::ReadRows { source })?;

        let limit = options.limit.unwrap_or(usize::MAX);
        let mut delivered = 0;
        while delivered < limit {
            let Some(row) = rows.next().await else {
                break;
            };
            let row = row.map_err(|source| BigtableError::ReadRows { source })?;
            delivered += 1;
            if f(row).is_break() {
                break;
            }
        }

        Ok(delivered)
    }
}

impl<R: WideColumnRepository> Closeable for BigtableClient<R> {
    fn close(&self) {
        if self.handle.close() {
            info!("Closed Bigtable client for {}", self.key());
        }
    }
}
