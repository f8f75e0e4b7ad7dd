//! # Export Configuration DTO
//!
//! クエリ結果を Cloud Storage へエクスポートする際の設定

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::services::retry::{RetryPolicy, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS};

pub const DEFAULT_DELIMITER: &str = ",";

/// エクスポート設定
///
/// JSON では `delayMs` / `timeoutMs` をミリ秒で指定する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    /// 抽出ジョブの再試行回数（試行回数は `retries + 1`）
    pub retries: u32,
    /// 再試行までの待ち時間
    #[serde(rename = "delayMs", with = "millis")]
    pub delay: Duration,
    /// クエリと抽出をあわせた制限時間（`None` なら無制限）
    #[serde(rename = "timeoutMs", with = "optional_millis")]
    pub timeout: Option<Duration>,
    /// gzip 圧縮するかどうか
    pub compressed: bool,
    /// CSV の区切り文字
    pub delimiter: String,
    /// CSV のヘッダー行を出力しない
    pub disable_header: bool,
    /// クエリジョブと抽出ジョブに付与するラベル
    pub labels: BTreeMap<String, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: None,
            compressed: false,
            delimiter: DEFAULT_DELIMITER.to_string(),
            disable_header: false,
            labels: BTreeMap::new(),
        }
    }
}

impl ExportConfig {
    /// 未設定の値を既定値で補った設定を返します。
    ///
    /// # 例
    ///
    /// ```
    /// use std::time::Duration;
    /// use gcpkit::application::dto::export_config::ExportConfig;
    ///
    /// let config = ExportConfig {
    ///     delimiter: String::new(),
    ///     timeout: Some(Duration::ZERO),
    ///     ..Default::default()
    /// }
    /// .normalized();
    ///
    /// assert_eq!(config.delimiter, ",");
    /// assert_eq!(config.timeout, None);
    /// ```
    pub fn normalized(mut self) -> Self {
        if self.delimiter.is_empty() {
            self.delimiter = DEFAULT_DELIMITER.to_string();
        }
        self.timeout = self.timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.delay, self.timeout)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
