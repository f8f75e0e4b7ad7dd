//! Workflow Orchestration
//!
//! サブコマンドごとのワークフロー

use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;

use crate::adapter::clients::CloudClients;
use crate::adapter::config::Config;
use crate::application::dto::client_options::QueryOptions;
use crate::application::dto::export_config::ExportConfig;
use crate::domain::entities::wide_row::{ReadRowsOptions, RowSelection, WideRow};

use super::cli::{Command, ExportFormat};

/// Applies CLI overrides to the configured export settings
pub fn export_settings(
    base: ExportConfig,
    retries: Option<u32>,
    timeout_secs: Option<u64>,
    gzip: bool,
) -> ExportConfig {
    let mut config = base;
    if let Some(retries) = retries {
        config.retries = retries;
    }
    if let Some(secs) = timeout_secs {
        config.timeout = Some(Duration::from_secs(secs));
    }
    config.compressed |= gzip;
    config.normalized()
}

/// One line per row: key, then `family:qualifier=value` for each cell
pub fn format_wide_row(row: &WideRow) -> String {
    let cells: Vec<String> = row
        .cells
        .iter()
        .map(|c| {
            format!(
                "{}:{}={}",
                c.family,
                c.qualifier,
                String::from_utf8_lossy(&c.value)
            )
        })
        .collect();

    if cells.is_empty() {
        row.key.clone()
    } else {
        format!("{}  {}", row.key, cells.join(" "))
    }
}

/// Command Workflow
pub struct CommandWorkflow {
    config: Config,
    clients: CloudClients,
}

impl CommandWorkflow {
    /// Create a new workflow with clients built from the configuration
    pub fn new(config: Config) -> Self {
        let clients = CloudClients::new(config.client_options());
        Self { config, clients }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn project_id(&self) -> Result<&str> {
        if self.config.project_id.is_empty() {
            bail!("project_id is not set (use --project or the config file)");
        }
        Ok(&self.config.project_id)
    }

    fn instance<'a>(&'a self, instance: &'a Option<String>) -> Result<&'a str> {
        instance
            .as_deref()
            .or(self.config.bigtable_instance.as_deref())
            .context("Bigtable instance is not set (use --instance or the config file)")
    }

    /// Execute one subcommand, then close every client
    pub async fn execute(&self, command: Command) -> Result<()> {
        info!("Running {:?}", command);
        let result = self.dispatch(command).await;
        self.clients.close_all().await;
        result
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Projects => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                for name in client.get_project_names().await?.sort() {
                    println!("{}", name);
                }
            }
            Command::Datasets => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                for name in client.get_dataset_names().await?.sort() {
                    println!("{}", name);
                }
            }
            Command::Tables { dataset } => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                for name in client.get_table_names(&dataset).await?.sort() {
                    println!("{}", name);
                }
            }
            Command::Columns { dataset, table } => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                let mut columns = client.get_column_metadata(&dataset, &table).await?;
                columns.sort();
                for column in columns.iter() {
                    println!("{}\t{}", column.column_name, column.data_type);
                }
            }
            Command::Query {
                query,
                limit,
                timeout,
            } => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                let options = QueryOptions {
                    timeout: timeout.map(Duration::from_secs),
                    ..Default::default()
                };
                let limit = limit.unwrap_or(usize::MAX);
                let mut printed = 0usize;
                client
                    .run_query_with(&query, &options, |row| {
                        if printed >= limit {
                            return Ok(ControlFlow::Break(()));
                        }
                        println!("{}", serde_json::to_string(&row)?);
                        printed += 1;
                        Ok(ControlFlow::Continue(()))
                    })
                    .await?;
                info!("Printed {} rows", printed);
            }
            Command::DryRun { query } => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                match client.dry_run_query(&query, None).await? {
                    Some(bytes) => println!("✓ Query will process {} bytes", bytes),
                    None => println!("⚠ Empty query, nothing to estimate"),
                }
            }
            Command::Export {
                query,
                destination,
                format,
                retries,
                timeout,
                gzip,
            } => {
                let client = self.clients.bigquery(self.project_id()?).await?;
                let settings = export_settings(self.config.export_config(), retries, timeout, gzip);
                match format {
                    ExportFormat::Csv => {
                        client
                            .run_query_to_csv(&query, &destination, &settings)
                            .await?
                    }
                    ExportFormat::Json => {
                        client
                            .run_query_to_json(&query, &destination, &settings)
                            .await?
                    }
                }
                println!("✓ Exported query result to {}", destination);
            }
            Command::Buckets => {
                let project_id = self.project_id()?;
                let client = self.clients.storage().await?;
                for name in client.get_bucket_names(project_id).await?.sort() {
                    println!("{}", name);
                }
            }
            Command::Files { bucket, prefix } => {
                let client = self.clients.storage().await?;
                for name in client.get_file_names(&bucket, prefix.as_deref()).await? {
                    println!("{}", name);
                }
            }
            Command::Download {
                bucket,
                name,
                output,
            } => {
                let client = self.clients.storage().await?;
                let data = client.download_file(&bucket, &name).await?;
                tokio::fs::write(&output, &data)
                    .await
                    .with_context(|| format!("Failed to write {}", output))?;
                println!("✓ Downloaded {} bytes to {}", data.len(), output);
            }
            Command::Upload {
                bucket,
                name,
                input,
                content_type,
            } => {
                let data = tokio::fs::read(&input)
                    .await
                    .with_context(|| format!("Failed to read {}", input))?;
                let size = data.len();
                let client = self.clients.storage().await?;
                client
                    .upload_file(&bucket, &name, &content_type, data)
                    .await?;
                println!("✓ Uploaded {} bytes to gs://{}/{}", size, bucket, name);
            }
            Command::BtTables { instance } => {
                let client = self
                    .clients
                    .bigtable(self.project_id()?, self.instance(&instance)?)
                    .await?;
                for name in client.get_table_names().await?.sort() {
                    println!("{}", name);
                }
            }
            Command::BtFamilies { table, instance } => {
                let client = self
                    .clients
                    .bigtable(self.project_id()?, self.instance(&instance)?)
                    .await?;
                for name in client.get_column_families(&table).await? {
                    println!("{}", name);
                }
            }
            Command::BtRead {
                table,
                prefix,
                limit,
                instance,
            } => {
                let client = self
                    .clients
                    .bigtable(self.project_id()?, self.instance(&instance)?)
                    .await?;
                let selection = match prefix {
                    Some(prefix) => RowSelection::Prefix(prefix),
                    None => RowSelection::All,
                };
                let options = ReadRowsOptions::new(selection).with_limit(limit);
                let count = client
                    .read_rows(&table, &options, |row| {
                        println!("{}", format_wide_row(&row));
                        ControlFlow::Continue(())
                    })
                    .await?;
                println!("✓ Read {} rows", count);
            }
        }

        Ok(())
    }
}
