//! REST Client
//!
//! SDK クレートが提供していない Google API を OAuth2 トークン付きで呼び出す

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use google_cloud_token::TokenSource;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const BIGTABLE_ADMIN_API: &str = "https://bigtableadmin.googleapis.com/v2";

/// Authorized JSON client for a single API root
pub struct RestClient {
    http: reqwest::Client,
    token_source: Arc<dyn TokenSource>,
    base_url: String,
}

impl RestClient {
    pub fn new(token_source: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_source,
            base_url: base_url.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(|e| anyhow!("Failed to get access token: {}", e))?;

        Ok(self
            .http
            .request(method, self.url(path))
            .header(AUTHORIZATION, token))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .request(Method::GET, path)
            .await?
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;

        decode(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .request(Method::POST, path)
            .await?
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;

        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, path)
            .await?
            .send()
            .await
            .with_context(|| format!("DELETE {} failed", path))?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("HTTP {}: {}", status, body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .context("Failed to decode response body")
}
