//! GCP Authentication
//!
//! Google Cloud Platform認証機能

use std::sync::Arc;

use anyhow::{Context, Result};
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_auth::project::Config as AuthConfig;
use google_cloud_auth::token::DefaultTokenSourceProvider;
use google_cloud_bigquery::client::{Client, ClientConfig};
use google_cloud_token::{TokenSource, TokenSourceProvider};
use log::debug;

/// Scope used for REST calls not covered by the SDK crates
pub const CLOUD_PLATFORM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Expands tilde in path and returns the full path
pub fn expand_key_path(key_path: &str) -> String {
    shellexpand::tilde(key_path).to_string()
}

/// Loads a service account key file
pub async fn load_credentials(key_path: &str) -> Result<CredentialsFile> {
    let expanded_path = expand_key_path(key_path);
    CredentialsFile::new_from_file(expanded_path.clone())
        .await
        .with_context(|| format!("Failed to read credentials file {}", expanded_path))
}

/// Creates the token provider for Bigtable's gRPC connection
///
/// Without a key file, the provider comes from Application Default Credentials.
pub async fn create_bigtable_token_provider(
    key_path: Option<&str>,
) -> Result<Arc<dyn ::gcp_auth::TokenProvider>> {
    match key_path {
        Some(path) => {
            let expanded_path = expand_key_path(path);
            debug!("Using service account {} for Bigtable", expanded_path);
            let account = ::gcp_auth::CustomServiceAccount::from_file(&expanded_path)
                .with_context(|| format!("Failed to read credentials file {}", expanded_path))?;
            Ok(Arc::new(account))
        }
        None => ::gcp_auth::provider()
            .await
            .context("Failed to authenticate with default credentials"),
    }
}

/// Creates a BigQuery client, with service account key or default credentials
///
/// Returns the client and the project ID found in the credentials, if any.
pub async fn create_bigquery_client(key_path: Option<&str>) -> Result<(Client, Option<String>)> {
    let (config, project_id) = match key_path {
        Some(path) => {
            let credentials = load_credentials(path).await?;
            ClientConfig::new_with_credentials(credentials)
                .await
                .context("Failed to authenticate with service account")?
        }
        None => ClientConfig::new_with_auth()
            .await
            .context("Failed to authenticate with default credentials")?,
    };

    let client = Client::new(config)
        .await
        .context("Failed to create BigQuery client")?;

    Ok((client, project_id))
}

/// Creates an OAuth2 token source for REST calls
pub async fn create_token_source(
    key_path: Option<&str>,
    scopes: &'static [&'static str],
) -> Result<Arc<dyn TokenSource>> {
    let config = AuthConfig::default().with_scopes(scopes);
    let provider = match key_path {
        Some(path) => {
            let credentials = load_credentials(path).await?;
            DefaultTokenSourceProvider::new_with_credentials(config, Box::new(credentials))
                .await
                .context("Failed to authenticate with service account")?
        }
        None => DefaultTokenSourceProvider::new(config)
            .await
            .context("Failed to authenticate with default credentials")?,
    };

    Ok(provider.token_source())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_key_path_with_tilde() {
        // プラットフォーム別のホームディレクトリ環境変数取得
        #[cfg(unix)]
        let home = std::env::var("HOME")
            .expect("HOME environment variable should be set on Unix systems");

        #[cfg(windows)]
        let home = std::env::var("USERPROFILE")
            .expect("USERPROFILE environment variable should be set on Windows");

        let result = expand_key_path("~/.config/gcloud/key.json");

        let expected = format!("{}/.config/gcloud/key.json", home);

        #[cfg(unix)]
        assert_eq!(result, expected);

        #[cfg(windows)]
        {
            let normalized_result = result.replace('\\', "/");
            let normalized_expected = expected.replace('\\', "/");
            assert_eq!(normalized_result, normalized_expected);
        }
    }

    #[test]
    fn test_expand_key_path_absolute() {
        let result = expand_key_path("/absolute/path/key.json");
        assert_eq!(result, "/absolute/path/key.json");
    }

    #[test]
    fn test_expand_key_path_relative() {
        let result = expand_key_path("./relative/path/key.json");
        assert_eq!(result, "./relative/path/key.json");
    }

    #[tokio::test]
    async fn test_load_credentials_missing_file() {
        let err = load_credentials("/nonexistent/gcpkit/key.json")
            .await
            .err()
            .unwrap();
        assert!(err
            .to_string()
            .contains("Failed to read credentials file /nonexistent/gcpkit/key.json"));
    }

    #[tokio::test]
    async fn test_bigtable_token_provider_missing_file() {
        let err = create_bigtable_token_provider(Some("/nonexistent/gcpkit/key.json"))
            .await
            .err()
            .unwrap();
        assert!(err
            .to_string()
            .contains("Failed to read credentials file /nonexistent/gcpkit/key.json"));
    }

    #[tokio::test]
    async fn test_load_credentials_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(
            &path,
            r#"{"type": "service_account", "project_id": "test-project",
                "client_email": "svc@test-project.iam.gserviceaccount.com",
                "private_key_id": "abc", "private_key": "unused"}"#,
        )
        .unwrap();

        let credentials = load_credentials(path.to_str().unwrap()).await.unwrap();
        assert_eq!(credentials.tp, "service_account");
        assert_eq!(credentials.project_id.as_deref(), Some("test-project"));
    }
}
