//! # Object Repository Trait
//!
//! Cloud Storage へのアクセスを抽象化

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

#[cfg(test)]
use mockall::automock;

use crate::domain::services::pagination::Page;

/// オブジェクトの内容を順に返すストリーム
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Cloud Storage リポジトリ
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// バケット名の1ページ
    async fn list_buckets_page(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>>;

    /// オブジェクト名の1ページ
    ///
    /// # Arguments
    ///
    /// * `bucket` - バケット名
    /// * `prefix` - 名前の前方一致条件（`None` なら全件）
    /// * `page_token` - 前ページのトークン
    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<String>,
        page_token: Option<String>,
    ) -> Result<Page<String>>;

    /// オブジェクトのメタデータを取得（存在確認）
    async fn get_object(&self, bucket: &str, name: &str) -> Result<()>;

    async fn open_stream(&self, bucket: &str, name: &str) -> Result<ByteStream>;

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>>;

    async fn upload(&self, bucket: &str, name: &str, content_type: &str, data: Vec<u8>)
        -> Result<()>;

    /// サーバー側でコピー
    async fn copy(
        &self,
        source_bucket: &str,
        source_name: &str,
        destination_bucket: &str,
        destination_name: &str,
    ) -> Result<()>;

    async fn delete(&self, bucket: &str, name: &str) -> Result<()>;
}
