//! # BigQuery Client
//!
//! BigQuery の操作を簡略化したラッパー

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::application::clients::handle::ClientHandle;
use crate::application::dto::client_options::{ClientOptions, QueryOptions};
use crate::application::dto::export_config::ExportConfig;
use crate::application::registry::Closeable;
use crate::domain::entities::column::{Columns, FieldSchema};
use crate::domain::entities::name_list::NameList;
use crate::domain::entities::table_ref::{
    ExtractFormat, ExtractRequest, QueryJob, QueryPage, QueryRow, TableRef,
};
use crate::domain::repositories::warehouse_repository::WarehouseRepository;
use crate::domain::services::deadline::{deadline_after, with_deadline, with_timeout};
use crate::domain::services::pagination::collect_pages;

/// BigQuery 操作のエラー
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BigQueryError {
    #[error("could not initialize BigQuery client")]
    Init {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get BigQuery project names")]
    ProjectNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get BigQuery dataset names")]
    DatasetNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get BigQuery table names")]
    TableNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not create BigQuery table")]
    CreateTable {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not delete BigQuery table")]
    DeleteTable {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get BigQuery table schema")]
    TableSchema {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not insert new row to BigQuery table")]
    InsertRows {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get BigQuery column metadata")]
    ColumnMetadata {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not dry run query")]
    DryRun {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not run query")]
    Query {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not export query result")]
    Export {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not found temporary table")]
    TemporaryTableNotFound,
    #[error("BigQuery client is closed")]
    Closed,
}

/// BigQuery クライアントラッパー
///
/// 1つのプロジェクトに紐づく。`R` は SDK 実装またはテスト用のモック。
pub struct BigQueryClient<R> {
    project_id: String,
    options: ClientOptions,
    handle: ClientHandle<R>,
}

impl<R: WarehouseRepository> BigQueryClient<R> {
    pub fn new(project_id: impl Into<String>, options: ClientOptions, repository: R) -> Self {
        Self {
            project_id: project_id.into(),
            options,
            handle: ClientHandle::open(repository),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn repository(&self) -> Result<Arc<R>, BigQueryError> {
        self.handle.acquire().ok_or(BigQueryError::Closed)
    }

    fn table(&self, dataset_id: &str, table_id: &str) -> TableRef {
        TableRef::new(&self.project_id, dataset_id, table_id)
    }

    fn query_job(&self, query: &str, options: &QueryOptions) -> QueryJob {
        QueryJob {
            use_query_cache: options.use_query_cache,
            ..QueryJob::new(&self.project_id, query).with_labels(options.labels.clone())
        }
    }

    /// アクセス可能な全プロジェクト ID
    pub async fn get_project_names(&self) -> Result<NameList, BigQueryError> {
        let repo = self.repository()?;
        let repo = repo.as_ref();

        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_projects_page(token)),
        )
        .await
        .map_err(|source| BigQueryError::ProjectNames { source })?;

        Ok(NameList::from(names))
    }

    /// このプロジェクトのデータセット ID
    pub async fn get_dataset_names(&self) -> Result<NameList, BigQueryError> {
        let repo = self.repository()?;
        let repo = repo.as_ref();
        let project_id = self.project_id.as_str();

        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_datasets_page(project_id, token)),
        )
        .await
        .map_err(|source| BigQueryError::DatasetNames { source })?;

        Ok(NameList::from(names))
    }

    /// データセット内のテーブル ID
    pub async fn get_table_names(&self, dataset_id: &str) -> Result<NameList, BigQueryError> {
        let repo = self.repository()?;
        let repo = repo.as_ref();
        let project_id = self.project_id.as_str();

        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_tables_page(project_id, dataset_id, token)),
        )
        .await
        .map_err(|source| BigQueryError::TableNames { source })?;

        Ok(NameList::from(names))
    }

    pub async fn create_table(
        &self,
        dataset_id: &str,
        table_id: &str,
        schema: &[FieldSchema],
    ) -> Result<(), BigQueryError> {
        let repo = self.repository()?;
        repo.create_table(&self.table(dataset_id, table_id), schema)
            .await
            .map_err(|source| BigQueryError::CreateTable { source })?;
        info!("Created table {}.{}", dataset_id, table_id);
        Ok(())
    }

    pub async fn delete_table(&self, dataset_id: &str, table_id: &str) -> Result<(), BigQueryError> {
        let repo = self.repository()?;
        repo.delete_table(&self.table(dataset_id, table_id))
            .await
            .map_err(|source| BigQueryError::DeleteTable { source })?;
        info!("Deleted table {}.{}", dataset_id, table_id);
        Ok(())
    }

    pub async fn get_table_schema(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<Vec<FieldSchema>, BigQueryError> {
        let repo = self.repository()?;
        repo.get_table_schema(&self.table(dataset_id, table_id))
            .await
            .map_err(|source| BigQueryError::TableSchema { source })
    }

    /// JSON オブジェクトの行をストリーミング挿入する
    pub async fn insert_rows(
        &self,
        dataset_id: &str,
        table_id: &str,
        rows: &[serde_json::Value],
    ) -> Result<(), BigQueryError> {
        if rows.is_empty() {
            return Ok(());
        }
        let repo = self.repository()?;
        repo.insert_rows(&self.table(dataset_id, table_id), rows)
            .await
            .map_err(|source| BigQueryError::InsertRows { source })
    }

    /// 列名と型の一覧（スキーマ順）
    pub async fn get_column_metadata(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<Columns, BigQueryError> {
        let repo = self.repository()?;
        let schema = repo
            .get_table_schema(&self.table(dataset_id, table_id))
            .await
            .map_err(|source| BigQueryError::ColumnMetadata { source })?;
        Ok(Columns::from(schema.as_slice()))
    }

    /// 処理予定のバイト数を返します。
    ///
    /// # Returns
    ///
    /// 空のクエリの場合は `None`（API を呼び出さない）
    pub async fn dry_run_query(
        &self,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<i64>, BigQueryError> {
        if query.is_empty() {
            return Ok(None);
        }
        let repo = self.repository()?;
        let job = QueryJob::new(&self.project_id, query);

        let bytes = with_timeout(timeout, repo.dry_run_query(&job))
            .await
            .map_err(|source| BigQueryError::DryRun { source })?;

        debug!("Dry run estimates {} bytes", bytes);
        Ok(Some(bytes))
    }

    /// クエリ結果を全件メモリに読み込む
    ///
    /// 空のクエリの場合は空の結果を返す
    pub async fn run_query(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<QueryRow>, BigQueryError> {
        let mut rows = Vec::new();
        self.run_query_with(query, options, |row| {
            rows.push(row);
            Ok(ControlFlow::Continue(()))
        })
        .await?;
        Ok(rows)
    }

    /// クエリ結果を1行ずつ `f` に渡します。
    ///
    /// `f` が `ControlFlow::Break` を返すと残りの行（と残りのページ）は読まずに終了します。
    /// `f` がエラーを返した場合はクエリのエラーとして扱います。
    pub async fn run_query_with<F>(
        &self,
        query: &str,
        options: &QueryOptions,
        mut f: F,
    ) -> Result<(), BigQueryError>
    where
        F: FnMut(QueryRow) -> anyhow::Result<ControlFlow<()>> + Send,
    {
        if query.is_empty() {
            return Ok(());
        }
        let repo = self.repository()?;
        let job = self.query_job(query, options);

        with_timeout(options.timeout, scan_query(repo.as_ref(), &job, &mut f))
            .await
            .map_err(|source| BigQueryError::Query { source })
    }

    /// クエリ結果を CSV として Cloud Storage に書き出します。
    ///
    /// 複数ファイルに分割する場合は `gs://bucket/sample-*.csv` のようにワイルドカードを使います。
    pub async fn run_query_to_csv(
        &self,
        query: &str,
        destination_uri: &str,
        config: &ExportConfig,
    ) -> Result<(), BigQueryError> {
        self.export(query, destination_uri, ExtractFormat::Csv, config)
            .await
    }

    /// クエリ結果を改行区切り JSON として Cloud Storage に書き出す
    pub async fn run_query_to_json(
        &self,
        query: &str,
        destination_uri: &str,
        config: &ExportConfig,
    ) -> Result<(), BigQueryError> {
        self.export(query, destination_uri, ExtractFormat::Json, config)
            .await
    }

    /// 再試行回数・待ち時間・タイムアウトを個別に渡す CSV エクスポート
    pub async fn export_to_csv(
        &self,
        query: &str,
        destination_uri: &str,
        retries: u32,
        delay: Duration,
        timeout: Option<Duration>,
    ) -> Result<(), BigQueryError> {
        let config = ExportConfig {
            retries,
            delay,
            timeout,
            ..Default::default()
        };
        self.run_query_to_csv(query, destination_uri, &config).await
    }

    /// クエリで一時テーブルを作り、抽出ジョブで書き出す
    ///
    /// 抽出ジョブのみ再試行する。制限時間はクエリと抽出で共有する。
    async fn export(
        &self,
        query: &str,
        destination_uri: &str,
        format: ExtractFormat,
        config: &ExportConfig,
    ) -> Result<(), BigQueryError> {
        if query.is_empty() || destination_uri.is_empty() {
            return Ok(());
        }

        let config = config.clone().normalized();
        let repo = self.repository()?;
        let deadline = deadline_after(config.timeout);

        let job = QueryJob::new(&self.project_id, query).with_labels(config.labels.clone());
        let temp_table = with_deadline(deadline, repo.run_query_to_temp_table(&job))
            .await
            .map_err(|source| BigQueryError::Export { source })?
            .ok_or(BigQueryError::TemporaryTableNotFound)?;

        let request = ExtractRequest {
            source: temp_table,
            destination_uri: destination_uri.to_string(),
            format,
            field_delimiter: config.delimiter.clone(),
            print_header: !config.disable_header,
            gzip: config.compressed,
            labels: config.labels.clone(),
        };
        info!(
            "Extracting {} to {} as {}",
            request.source,
            request.destination_uri,
            format.destination_format()
        );

        config
            .retry_policy()
            .run_until(deadline, |attempt| {
                debug!("Extract attempt {}", attempt);
                repo.extract_table(&request)
            })
            .await
            .map_err(|source| BigQueryError::Export { source })
    }
}

async fn scan_query<R, F>(repo: &R, job: &QueryJob, f: &mut F) -> anyhow::Result<()>
where
    R: WarehouseRepository + ?Sized,
    F: FnMut(QueryRow) -> anyhow::Result<ControlFlow<()>>,
{
    let mut page = repo.start_query(job).await?;

    loop {
        let QueryPage { rows, cursor } = page;
        for row in rows {
            if f(row)?.is_break() {
                return Ok(());
            }
        }

        let Some(cursor) = cursor else {
            return Ok(());
        };
        page = repo.next_query_page(&job.project_id, &cursor).await?;
    }
}

impl<R: WarehouseRepository> Closeable for BigQueryClient<R> {
    fn close(&self) {
        if self.handle.close() {
            info!("Closed BigQuery client for {}", self.project_id);
        }
    }
}
