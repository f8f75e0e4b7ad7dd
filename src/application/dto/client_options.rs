//! # Client Options DTO
//!
//! クライアント生成時・クエリ実行時のオプション

use std::collections::BTreeMap;
use std::time::Duration;

/// 一覧取得・ダウンロードの既定タイムアウト（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// クライアント生成オプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// サービスアカウント鍵ファイルのパス（`None` ならデフォルト認証情報）
    pub credentials_path: Option<String>,
    /// 一覧取得のタイムアウト
    pub list_timeout: Duration,
    /// ファイルダウンロードのタイムアウト
    pub download_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            credentials_path: None,
            list_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientOptions {
    pub fn with_credentials(mut self, path: impl Into<String>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }
}

/// クエリ実行オプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// `None` なら無制限
    pub timeout: Option<Duration>,
    pub use_query_cache: Option<bool>,
    pub labels: BTreeMap<String, String>,
}

impl QueryOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_default() {
        let options = ClientOptions::default();
        assert_eq!(options.credentials_path, None);
        assert_eq!(options.list_timeout, Duration::from_secs(30));
        assert_eq!(options.download_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_options_builder() {
        let options = ClientOptions::default()
            .with_credentials("~/.config/gcloud/key.json")
            .with_list_timeout(Duration::from_secs(5));
        assert_eq!(
            options.credentials_path.as_deref(),
            Some("~/.config/gcloud/key.json")
        );
        assert_eq!(options.list_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_query_options_with_timeout() {
        let options = QueryOptions::with_timeout(Duration::from_secs(120));
        assert_eq!(options.timeout, Some(Duration::from_secs(120)));
        assert_eq!(options.use_query_cache, None);
    }
}
