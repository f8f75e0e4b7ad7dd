//! # Storage Client
//!
//! Cloud Storage の操作を簡略化したラッパー

use std::sync::Arc;

use futures::TryStreamExt;
use log::{debug, info};

use crate::application::clients::handle::ClientHandle;
use crate::application::dto::client_options::ClientOptions;
use crate::application::registry::Closeable;
use crate::domain::entities::name_list::NameList;
use crate::domain::repositories::object_repository::{ByteStream, ObjectRepository};
use crate::domain::services::deadline::with_timeout;
use crate::domain::services::pagination::collect_pages;

/// Cloud Storage 操作のエラー
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("could not initialize Storage client")]
    Init {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get Storage bucket names")]
    BucketNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not get Storage file names")]
    FileNames {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not stream from Storage service")]
    Stream {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not download from Storage service")]
    Download {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not upload to Storage service")]
    Upload {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not copy file")]
    Copy {
        #[source]
        source: anyhow::Error,
    },
    #[error("could not delete file")]
    Delete {
        #[source]
        source: anyhow::Error,
    },
    #[error("Storage client is closed")]
    Closed,
}

/// Cloud Storage クライアントラッパー
pub struct StorageClient<R> {
    options: ClientOptions,
    handle: ClientHandle<R>,
}

impl<R: ObjectRepository> StorageClient<R> {
    pub fn new(options: ClientOptions, repository: R) -> Self {
        Self {
            options,
            handle: ClientHandle::open(repository),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn repository(&self) -> Result<Arc<R>, StorageError> {
        self.handle.acquire().ok_or(StorageError::Closed)
    }

    /// プロジェクト内のバケット名
    pub async fn get_bucket_names(&self, project_id: &str) -> Result<NameList, StorageError> {
        let repo = self.repository()?;
        let repo = repo.as_ref();

        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_buckets_page(project_id, token)),
        )
        .await
        .map_err(|source| StorageError::BucketNames { source })?;

        Ok(NameList::from(names))
    }

    /// バケット内のファイル名（`prefix` で前方一致）
    pub async fn get_file_names(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<NameList, StorageError> {
        let repo = self.repository()?;
        let repo = repo.as_ref();
        let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);

        let names = with_timeout(
            Some(self.options.list_timeout),
            collect_pages(|token| repo.list_objects_page(bucket, prefix.clone(), token)),
        )
        .await
        .map_err(|source| StorageError::FileNames { source })?;

        Ok(NameList::from(names))
    }

    /// ファイルが存在するか（取得に失敗した場合は `false`）
    pub async fn is_file_exists(&self, bucket: &str, name: &str) -> bool {
        let Ok(repo) = self.repository() else {
            return false;
        };
        match repo.get_object(bucket, name).await {
            Ok(()) => true,
            Err(e) => {
                debug!("gs://{}/{} not available: {}", bucket, name, e);
                false
            }
        }
    }

    /// ファイルの内容をストリームで読む
    pub async fn stream_file(&self, bucket: &str, name: &str) -> Result<ByteStream, StorageError> {
        let repo = self.repository()?;
        repo.open_stream(bucket, name)
            .await
            .map_err(|source| StorageError::Stream { source })
    }

    /// ファイル全体をダウンロードする
    pub async fn download_file(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let repo = self.repository()?;
        let data = with_timeout(
            Some(self.options.download_timeout),
            repo.download(bucket, name),
        )
        .await
        .map_err(|source| StorageError::Download { source })?;

        debug!("Downloaded {} bytes from gs://{}/{}", data.len(), bucket, name);
        Ok(data)
    }

    /// ストリームを最後まで読んでメモリに集める
    pub async fn read_stream_to_end(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let stream = self.stream_file(bucket, name).await?;
        let chunks: Vec<bytes::Bytes> = stream
            .try_collect()
            .await
            .map_err(|source| StorageError::Stream { source })?;
        Ok(chunks.concat())
    }

    pub async fn upload_file(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        let repo = self.repository()?;
        let size = data.len();
        repo.upload(bucket, name, content_type, data)
            .await
            .map_err(|source| StorageError::Upload { source })?;
        info!("Uploaded {} bytes to gs://{}/{}", size, bucket, name);
        Ok(())
    }

    pub async fn copy_file(
        &self,
        source_bucket: &str,
        source_name: &str,
        destination_bucket: &str,
        destination_name: &str,
    ) -> Result<(), StorageError> {
        let repo = self.repository()?;
        repo.copy(source_bucket, source_name, destination_bucket, destination_name)
            .await
            .map_err(|source| StorageError::Copy { source })
    }

    pub async fn delete_file(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        let repo = self.repository()?;
        repo.delete(bucket, name)
            .await
            .map_err(|source| StorageError::Delete { source })
    }
}

impl<R: ObjectRepository> Closeable for StorageClient<R> {
    fn close(&self) {
        if self.handle.close() {
            info!("Closed Storage client");
        }
    }
}
