//! BigQuery Repository
//!
//! google-cloud-bigquery クライアントによる WarehouseRepository の実装

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use google_cloud_bigquery::client::Client;
use google_cloud_bigquery::http::job::get::GetJobRequest;
use google_cloud_bigquery::http::job::get_query_results::GetQueryResultsRequest;
use google_cloud_bigquery::http::job::query::QueryRequest;
use google_cloud_bigquery::http::job::{
    Job, JobConfiguration, JobConfigurationQuery, JobReference, JobState, JobType,
};
use google_cloud_bigquery::http::table::{Table, TableReference, TableSchema};
use google_cloud_bigquery::http::tabledata::insert_all::{InsertAllRequest, Row};
use google_cloud_bigquery::http::tabledata::list::Tuple;
use log::debug;
use uuid::Uuid;

use super::models::{
    convert_rows, extract_configuration, from_table_field, to_table_field, DatasetList,
    ProjectList, TableList,
};
use crate::adapter::rest::RestClient;
use crate::domain::entities::column::FieldSchema;
use crate::domain::entities::table_ref::{
    ExtractRequest, QueryCursor, QueryJob, QueryPage, TableRef,
};
use crate::domain::repositories::warehouse_repository::WarehouseRepository;
use crate::domain::services::pagination::Page;

/// Interval between job status polls
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Server-side wait for each getQueryResults call
const QUERY_WAIT_MS: i64 = 10_000;

/// BigQuery repository backed by the SDK client and the REST listing API
pub struct SdkWarehouseRepository {
    client: Client,
    rest: RestClient,
}

impl SdkWarehouseRepository {
    pub fn new(client: Client, rest: RestClient) -> Self {
        Self { client, rest }
    }

    fn page_query(page_token: Option<String>) -> Vec<(&'static str, String)> {
        page_token
            .map(|token| vec![("pageToken", token)])
            .unwrap_or_default()
    }

    fn new_job_reference(project_id: &str) -> JobReference {
        JobReference {
            project_id: project_id.to_string(),
            job_id: format!("gcpkit_{}", Uuid::new_v4().simple()),
            location: None,
        }
    }

    fn labels(job: &QueryJob) -> Option<HashMap<String, String>> {
        if job.labels.is_empty() {
            None
        } else {
            Some(job.labels.clone().into_iter().collect())
        }
    }

    /// Polls a job until it reaches DONE, failing on a job error
    async fn wait_for_job(&self, reference: &JobReference) -> Result<Job> {
        let request = GetJobRequest {
            location: reference.location.clone(),
        };

        loop {
            let job = self
                .client
                .job()
                .get(&reference.project_id, &reference.job_id, &request)
                .await
                .with_context(|| format!("Failed to get job {}", reference.job_id))?;

            if matches!(job.status.state, JobState::Done) {
                if let Some(error) = job.status.error_result {
                    return Err(anyhow!("Job {} failed: {:?}", reference.job_id, error));
                }
                return Ok(job);
            }

            debug!("Job {} still running", reference.job_id);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn to_page(
        schema: Option<&TableSchema>,
        rows: &[Tuple],
        reference: &JobReference,
        page_token: Option<String>,
    ) -> QueryPage {
        let cursor = page_token
            .filter(|token| !token.is_empty())
            .map(|page_token| QueryCursor {
                job_id: reference.job_id.clone(),
                location: reference.location.clone(),
                page_token,
            });

        QueryPage {
            rows: convert_rows(schema, rows),
            cursor,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl WarehouseRepository for SdkWarehouseRepository {
    async fn list_projects_page(&self, page_token: Option<String>) -> Result<Page<String>> {
        let list: ProjectList = self
            .rest
            .get_json("projects", &Self::page_query(page_token))
            .await?;

        Ok(Page::new(
            list.projects.into_iter().map(|p| p.id).collect(),
            list.next_page_token,
        ))
    }

    async fn list_datasets_page(
        &self,
        project_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>> {
        let path = format!("projects/{}/datasets", project_id);
        let list: DatasetList = self
            .rest
            .get_json(&path, &Self::page_query(page_token))
            .await?;

        Ok(Page::new(
            list.datasets
                .into_iter()
                .map(|d| d.dataset_reference.dataset_id)
                .collect(),
            list.next_page_token,
        ))
    }

    async fn list_tables_page(
        &self,
        project_id: &str,
        dataset_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>> {
        let path = format!("projects/{}/datasets/{}/tables", project_id, dataset_id);
        let list: TableList = self
            .rest
            .get_json(&path, &Self::page_query(page_token))
            .await?;

        Ok(Page::new(
            list.tables
                .into_iter()
                .map(|t| t.table_reference.table_id)
                .collect(),
            list.next_page_token,
        ))
    }

    async fn create_table(&self, table: &TableRef, schema: &[FieldSchema]) -> Result<()> {
        let fields = schema
            .iter()
            .map(to_table_field)
            .collect::<Result<Vec<_>>>()?;

        let definition = Table {
            table_reference: TableReference {
                project_id: table.project_id.clone(),
                dataset_id: table.dataset_id.clone(),
                table_id: table.table_id.clone(),
            },
            schema: Some(TableSchema { fields }),
            ..Default::default()
        };

        self.client
            .table()
            .create(&definition)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<()> {
        self.client
            .table()
            .delete(&table.project_id, &table.dataset_id, &table.table_id)
            .await
            .with_context(|| format!("Failed to delete table {}", table))
    }

    async fn get_table_schema(&self, table: &TableRef) -> Result<Vec<FieldSchema>> {
        let metadata = self
            .client
            .table()
            .get(&table.project_id, &table.dataset_id, &table.table_id)
            .await
            .with_context(|| format!("Failed to get table {}", table))?;

        Ok(metadata
            .schema
            .map(|s| s.fields.iter().map(from_table_field).collect())
            .unwrap_or_default())
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[serde_json::Value]) -> Result<()> {
        let request = InsertAllRequest {
            rows: rows
                .iter()
                .map(|row| Row {
                    insert_id: None,
                    json: row.clone(),
                })
                .collect(),
            skip_invalid_rows: None,
            ignore_unknown_values: None,
            template_suffix: None,
            trace_id: None,
        };

        let response = self
            .client
            .tabledata()
            .insert(&table.project_id, &table.dataset_id, &table.table_id, &request)
            .await
            .context("BigQuery insert failed")?;

        if let Some(errors) = response.insert_errors {
            if !errors.is_empty() {
                let rows: Vec<String> = errors
                    .iter()
                    .map(|e| format!("row {}: {:?}", e.index, e.errors))
                    .collect();
                return Err(anyhow!("Insert rejected: {}", rows.join("; ")));
            }
        }
        Ok(())
    }

    async fn dry_run_query(&self, job: &QueryJob) -> Result<i64> {
        let request = QueryRequest {
            query: job.query.clone(),
            dry_run: Some(true),
            use_query_cache: job.use_query_cache,
            labels: Self::labels(job),
            ..Default::default()
        };

        let response = self
            .client
            .job()
            .query(&job.project_id, &request)
            .await
            .context("Dry run failed")?;

        Ok(response.total_bytes_processed.unwrap_or_default())
    }

    async fn start_query(&self, job: &QueryJob) -> Result<QueryPage> {
        let request = QueryRequest {
            query: job.query.clone(),
            use_query_cache: job.use_query_cache,
            labels: Self::labels(job),
            timeout_ms: Some(QUERY_WAIT_MS),
            ..Default::default()
        };

        let response = self
            .client
            .job()
            .query(&job.project_id, &request)
            .await
            .context("Query failed")?;

        if response.job_complete {
            return Ok(Self::to_page(
                response.schema.as_ref(),
                response.rows.as_deref().unwrap_or(&[]),
                &response.job_reference,
                response.page_token,
            ));
        }

        let reference = response.job_reference;
        let request = GetQueryResultsRequest {
            start_index: 0,
            page_token: None,
            max_results: None,
            timeout_ms: Some(QUERY_WAIT_MS),
            location: reference.location.clone(),
            format_options: None,
        };

        loop {
            let results = self
                .client
                .job()
                .get_query_results(&reference.project_id, &reference.job_id, &request)
                .await
                .context("Failed to get query results")?;

            if results.job_complete {
                return Ok(Self::to_page(
                    results.schema.as_ref(),
                    results.rows.as_deref().unwrap_or(&[]),
                    &reference,
                    results.page_token,
                ));
            }

            debug!("Query job {} still running", reference.job_id);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn next_query_page(&self, project_id: &str, cursor: &QueryCursor) -> Result<QueryPage> {
        let request = GetQueryResultsRequest {
            start_index: 0,
            page_token: Some(cursor.page_token.clone()),
            max_results: None,
            timeout_ms: None,
            location: cursor.location.clone(),
            format_options: None,
        };

        let results = self
            .client
            .job()
            .get_query_results(project_id, &cursor.job_id, &request)
            .await
            .context("Failed to get query results page")?;

        let reference = JobReference {
            project_id: project_id.to_string(),
            job_id: cursor.job_id.clone(),
            location: cursor.location.clone(),
        };

        Ok(Self::to_page(
            results.schema.as_ref(),
            results.rows.as_deref().unwrap_or(&[]),
            &reference,
            results.page_token,
        ))
    }

    async fn run_query_to_temp_table(&self, job: &QueryJob) -> Result<Option<TableRef>> {
        let request = Job {
            job_reference: Self::new_job_reference(&job.project_id),
            configuration: JobConfiguration {
                job: JobType::Query(JobConfigurationQuery {
                    query: job.query.clone(),
                    use_query_cache: job.use_query_cache,
                    ..Default::default()
                }),
                labels: Self::labels(job),
                ..Default::default()
            },
            ..Default::default()
        };

        let created = self
            .client
            .job()
            .create(&request)
            .await
            .context("Failed to create query job")?;

        let done = self.wait_for_job(&created.job_reference).await?;

        Ok(match done.configuration.job {
            JobType::Query(query) => query
                .destination_table
                .map(|t| TableRef::new(t.project_id, t.dataset_id, t.table_id)),
            _ => None,
        })
    }

    async fn extract_table(&self, request: &ExtractRequest) -> Result<()> {
        let labels = if request.labels.is_empty() {
            None
        } else {
            Some(request.labels.clone().into_iter().collect())
        };

        let job = Job {
            job_reference: Self::new_job_reference(&request.source.project_id),
            configuration: JobConfiguration {
                job: JobType::Extract(extract_configuration(request)),
                labels,
                ..Default::default()
            },
            ..Default::default()
        };

        let created = self
            .client
            .job()
            .create(&job)
            .await
            .context("Failed to create extract job")?;

        debug!(
            "Extracting {} to {} (job {})",
            request.source, request.destination_uri, created.job_reference.job_id
        );

        self.wait_for_job(&created.job_reference).await?;
        Ok(())
    }
}
