//! Configuration
//!
//! JSON 設定ファイルの読み込み

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapter::auth::expand_key_path;
use crate::application::dto::client_options::{ClientOptions, DEFAULT_TIMEOUT_SECS};
use crate::application::dto::export_config::ExportConfig;

fn default_list_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub project_id: String,

    /// Service account key; default credentials are used when absent
    #[serde(default)]
    pub credentials_path: Option<String>,

    #[serde(default)]
    pub bigtable_instance: Option<String>,

    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,

    #[serde(default)]
    pub export: Option<ExportConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            credentials_path: None,
            bigtable_instance: None,
            list_timeout_secs: DEFAULT_TIMEOUT_SECS,
            export: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let path = expand_key_path(path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise starts from defaults
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(&expand_key_path(path)).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies command-line overrides
    pub fn with_overrides(mut self, project_id: Option<String>, credentials: Option<String>) -> Self {
        if let Some(project_id) = project_id {
            self.project_id = project_id;
        }
        if credentials.is_some() {
            self.credentials_path = credentials;
        }
        self
    }

    pub fn client_options(&self) -> ClientOptions {
        let mut options =
            ClientOptions::default().with_list_timeout(Duration::from_secs(self.list_timeout_secs));
        if let Some(path) = &self.credentials_path {
            options = options.with_credentials(expand_key_path(path));
        }
        options
    }

    pub fn export_config(&self) -> ExportConfig {
        self.export.clone().unwrap_or_default().normalized()
    }
}
