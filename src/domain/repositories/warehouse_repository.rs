//! # Warehouse Repository Trait
//!
//! BigQuery へのアクセスを抽象化

use anyhow::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::column::FieldSchema;
use crate::domain::entities::table_ref::{ExtractRequest, QueryCursor, QueryJob, QueryPage, TableRef};
use crate::domain::services::pagination::Page;

/// BigQuery リポジトリ
///
/// 1回の呼び出しが1回の API 呼び出しに対応する。ページの読み切りや
/// リトライは呼び出し側（クライアントラッパー）が担当する。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    /// アクセス可能なプロジェクト ID の1ページ
    async fn list_projects_page(&self, page_token: Option<String>) -> Result<Page<String>>;

    /// データセット ID の1ページ
    async fn list_datasets_page(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>>;

    /// テーブル ID の1ページ
    async fn list_tables_page(
        &self,
        project_id: &str,
        dataset_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>>;

    async fn create_table(&self, table: &TableRef, schema: &[FieldSchema]) -> Result<()>;

    async fn delete_table(&self, table: &TableRef) -> Result<()>;

    async fn get_table_schema(&self, table: &TableRef) -> Result<Vec<FieldSchema>>;

    /// ストリーミング挿入
    ///
    /// # Errors
    ///
    /// いずれかの行が拒否された場合にエラーを返す
    async fn insert_rows(&self, table: &TableRef, rows: &[serde_json::Value]) -> Result<()>;

    /// ドライランで処理予定バイト数を取得
    async fn dry_run_query(&self, job: &QueryJob) -> Result<i64>;

    /// クエリを実行し、完了を待って最初のページを返す
    async fn start_query(&self, job: &QueryJob) -> Result<QueryPage>;

    /// 完了済みクエリの次のページ
    async fn next_query_page(&self, project_id: &str, cursor: &QueryCursor) -> Result<QueryPage>;

    /// クエリジョブを実行し、結果が書き込まれた一時テーブルを返す
    ///
    /// # Returns
    ///
    /// ジョブ設定に出力先テーブルが無い場合は `None`
    async fn run_query_to_temp_table(&self, job: &QueryJob) -> Result<Option<TableRef>>;

    /// 抽出ジョブを実行し、完了まで待つ
    async fn extract_table(&self, request: &ExtractRequest) -> Result<()>;
}
