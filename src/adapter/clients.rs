//! Cloud Clients
//!
//! 3つのレジストリをまとめ、SDK 実装のクライアントを識別子ごとに生成する

use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::adapter::auth::gcp_auth::CLOUD_PLATFORM_SCOPES;
use crate::adapter::auth::{
    create_bigquery_client, create_bigtable_token_provider, create_token_source,
};
use crate::adapter::bigquery::SdkWarehouseRepository;
use crate::adapter::bigtable::BigtableRepository;
use crate::adapter::rest::{RestClient, BIGQUERY_API, BIGTABLE_ADMIN_API};
use crate::adapter::storage::SdkObjectRepository;
use crate::application::clients::bigtable::instance_key;
use crate::application::clients::{
    BigQueryClient, BigQueryError, BigtableClient, BigtableError, StorageClient, StorageError,
};
use crate::application::dto::client_options::ClientOptions;
use crate::application::registry::ClientRegistry;

pub type SdkBigQueryClient = BigQueryClient<SdkWarehouseRepository>;
pub type SdkBigtableClient = BigtableClient<BigtableRepository>;
pub type SdkStorageClient = StorageClient<SdkObjectRepository>;

/// Registry key used for Storage when no key file is configured
const DEFAULT_CREDENTIALS_KEY: &str = "default";

/// Per-identity client cache for BigQuery, Bigtable and Cloud Storage
///
/// Construct once and pass by reference.
pub struct CloudClients {
    options: ClientOptions,
    bigquery: ClientRegistry<String, SdkBigQueryClient>,
    bigtable: ClientRegistry<String, SdkBigtableClient>,
    storage: ClientRegistry<String, SdkStorageClient>,
}

impl CloudClients {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            bigquery: ClientRegistry::new(),
            bigtable: ClientRegistry::new(),
            storage: ClientRegistry::new(),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn key_path(&self) -> Option<&str> {
        self.options.credentials_path.as_deref()
    }

    /// BigQuery client for `project_id`
    pub async fn bigquery(&self, project_id: &str) -> Result<Arc<SdkBigQueryClient>, BigQueryError> {
        self.bigquery
            .get_or_try_init(project_id.to_string(), || async {
                self.build_bigquery(project_id)
                    .await
                    .map_err(|source| BigQueryError::Init { source })
            })
            .await
    }

    async fn build_bigquery(&self, project_id: &str) -> Result<SdkBigQueryClient> {
        let (client, credentials_project) = create_bigquery_client(self.key_path()).await?;
        debug!(
            "BigQuery credentials project: {:?}, requested: {}",
            credentials_project, project_id
        );

        let token_source = create_token_source(self.key_path(), CLOUD_PLATFORM_SCOPES).await?;
        let rest = RestClient::new(token_source, BIGQUERY_API);

        Ok(BigQueryClient::new(
            project_id,
            self.options.clone(),
            SdkWarehouseRepository::new(client, rest),
        ))
    }

    /// Bigtable client for `project_id` / `instance`
    pub async fn bigtable(
        &self,
        project_id: &str,
        instance: &str,
    ) -> Result<Arc<SdkBigtableClient>, BigtableError> {
        self.bigtable
            .get_or_try_init(instance_key(project_id, instance), || async {
                let token_source = create_token_source(self.key_path(), CLOUD_PLATFORM_SCOPES)
                    .await
                    .map_err(|source| BigtableError::AdminInit { source })?;
                let admin = RestClient::new(token_source, BIGTABLE_ADMIN_API);

                let repository = async {
                    let token_provider = create_bigtable_token_provider(self.key_path()).await?;
                    BigtableRepository::connect(project_id, instance, admin, token_provider, None)
                }
                .await
                .map_err(|source| BigtableError::Init { source })?;

                Ok(BigtableClient::new(
                    project_id,
                    instance,
                    self.options.clone(),
                    repository,
                ))
            })
            .await
    }

    /// Cloud Storage client for the configured credentials
    pub async fn storage(&self) -> Result<Arc<SdkStorageClient>, StorageError> {
        let key = self
            .key_path()
            .unwrap_or(DEFAULT_CREDENTIALS_KEY)
            .to_string();

        self.storage
            .get_or_try_init(key, || async {
                SdkObjectRepository::connect(self.key_path())
                    .await
                    .map(|repository| StorageClient::new(self.options.clone(), repository))
                    .map_err(|source| StorageError::Init { source })
            })
            .await
    }

    /// Closes every cached client; later lookups build fresh ones
    pub async fn close_all(&self) {
        self.bigquery.close_all().await;
        self.bigtable.close_all().await;
        self.storage.close_all().await;
    }
}
