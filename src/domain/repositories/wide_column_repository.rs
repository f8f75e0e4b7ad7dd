//! # Wide Column Repository Trait
//!
//! Bigtable（管理 API とデータ API）へのアクセスを抽象化

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::wide_row::{ColumnValues, ReadRowsOptions, WideRow};
use crate::domain::services::pagination::Page;

/// サーバーから届いた順に行を返すストリーム
///
/// ストリームを drop するとスキャンも止まる
pub type RowStream = BoxStream<'static, Result<WideRow>>;

/// Bigtable リポジトリ
///
/// テーブル名は短い名前（`projects/.../tables/` を含まない）で扱う
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WideColumnRepository: Send + Sync {
    /// テーブル名の1ページ
    async fn list_tables_page(&self, page_token: Option<String>) -> Result<Page<String>>;

    async fn create_table(&self, table: &str) -> Result<()>;

    async fn delete_table(&self, table: &str) -> Result<()>;

    /// カラムファミリー名の一覧
    async fn list_column_families(&self, table: &str) -> Result<Vec<String>>;

    async fn create_column_family(&self, table: &str, family: &str) -> Result<()>;

    /// 1行に対して複数列を一括で書き込む
    ///
    /// # Arguments
    ///
    /// * `table` - テーブル名
    /// * `row_key` - 行キー
    /// * `family` - カラムファミリー名
    /// * `columns` - 列修飾子と値
    /// * `timestamp_micros` - セルのタイムスタンプ（マイクロ秒）
    async fn mutate_row(
        &self,
        table: &str,
        row_key: &str,
        family: &str,
        columns: &ColumnValues,
        timestamp_micros: i64,
    ) -> Result<()>;

    /// 条件に一致する行のスキャンを開始する
    ///
    /// `options.limit` はサーバー側の行数上限として渡す
    async fn stream_rows(&self, table: &str, options: &ReadRowsOptions) -> Result<RowStream>;
}
