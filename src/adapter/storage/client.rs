//! Cloud Storage Repository
//!
//! google-cloud-storage クライアントによる ObjectRepository の実装

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::buckets::list::ListBucketsRequest;
use google_cloud_storage::http::objects::copy::CopyObjectRequest;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::adapter::auth::gcp_auth::load_credentials;
use crate::domain::repositories::object_repository::{ByteStream, ObjectRepository};
use crate::domain::services::pagination::Page;

/// Cloud Storage repository backed by the SDK client
pub struct SdkObjectRepository {
    client: Client,
}

impl SdkObjectRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a client with a service account key or default credentials
    pub async fn connect(key_path: Option<&str>) -> Result<Self> {
        let config = match key_path {
            Some(path) => {
                let credentials = load_credentials(path).await?;
                ClientConfig::default()
                    .with_credentials(credentials)
                    .await
                    .context("Failed to authenticate with service account")?
            }
            None => ClientConfig::default()
                .with_auth()
                .await
                .context("Failed to authenticate with default credentials")?,
        };

        Ok(Self::new(Client::new(config)))
    }

    fn get_request(bucket: &str, name: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl ObjectRepository for SdkObjectRepository {
    async fn list_buckets_page(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>> {
        let response = self
            .client
            .list_buckets(&ListBucketsRequest {
                project: project_id.to_string(),
                page_token,
                ..Default::default()
            })
            .await
            .context("Failed to list buckets")?;

        Ok(Page::new(
            response.items.into_iter().map(|b| b.name).collect(),
            response.next_page_token,
        ))
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<String>,
        page_token: Option<String>,
    ) -> Result<Page<String>> {
        let response = self
            .client
            .list_objects(&ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix,
                page_token,
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to list objects in {}", bucket))?;

        Ok(Page::new(
            response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(|o| o.name)
                .collect(),
            response.next_page_token,
        ))
    }

    async fn get_object(&self, bucket: &str, name: &str) -> Result<()> {
        self.client
            .get_object(&Self::get_request(bucket, name))
            .await
            .with_context(|| format!("Failed to get gs://{}/{}", bucket, name))?;
        Ok(())
    }

    async fn open_stream(&self, bucket: &str, name: &str) -> Result<ByteStream> {
        let stream = self
            .client
            .download_streamed_object(&Self::get_request(bucket, name), &Range::default())
            .await
            .with_context(|| format!("Failed to open gs://{}/{}", bucket, name))?;

        Ok(stream.map_err(anyhow::Error::from).boxed())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        self.client
            .download_object(&Self::get_request(bucket, name), &Range::default())
            .await
            .with_context(|| format!("Failed to download gs://{}/{}", bucket, name))
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        let mut media = Media::new(name.to_string());
        media.content_type = content_type.to_string().into();
        media.content_length = Some(data.len() as u64);

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: bucket.to_string(),
                    ..Default::default()
                },
                data,
                &UploadType::Simple(media),
            )
            .await
            .with_context(|| format!("Failed to upload gs://{}/{}", bucket, name))?;
        Ok(())
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_name: &str,
        destination_bucket: &str,
        destination_name: &str,
    ) -> Result<()> {
        self.client
            .copy_object(&CopyObjectRequest {
                source_bucket: source_bucket.to_string(),
                source_object: source_name.to_string(),
                destination_bucket: destination_bucket.to_string(),
                destination_object: destination_name.to_string(),
                ..Default::default()
            })
            .await
            .with_context(|| {
                format!(
                    "Failed to copy gs://{}/{} to gs://{}/{}",
                    source_bucket, source_name, destination_bucket, destination_name
                )
            })?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: bucket.to_string(),
                object: name.to_string(),
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to delete gs://{}/{}", bucket, name))
    }
}
