//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::{Parser, Subcommand, ValueEnum};

/// BigQuery / Bigtable / Cloud Storage を操作するCLI
#[derive(Parser, Debug, Clone)]
#[command(name = "gcpkit")]
#[command(about = "Work with BigQuery, Bigtable and Cloud Storage", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, global = true, default_value = "./gcpkit.json")]
    pub config: String,

    /// Project ID (overrides the config file)
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Service account key file (overrides the config file)
    #[arg(long, global = true)]
    pub credentials: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// エクスポート形式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List accessible BigQuery projects
    Projects,

    /// List datasets in the project
    Datasets,

    /// List tables in a dataset
    Tables { dataset: String },

    /// Show column names and types of a table, sorted by name
    Columns { dataset: String, table: String },

    /// Run a query and print each row as JSON
    Query {
        query: String,

        /// Stop after this many rows
        #[arg(long)]
        limit: Option<usize>,

        /// Query timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Estimate bytes processed by a query
    DryRun { query: String },

    /// Export query results to Cloud Storage
    Export {
        query: String,

        /// Destination URI, e.g. gs://bucket/out-*.csv
        destination: String,

        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Retries of the extract step (overrides the config file)
        #[arg(long)]
        retries: Option<u32>,

        /// Overall timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,

        /// Compress output with gzip
        #[arg(long)]
        gzip: bool,
    },

    /// List buckets in the project
    Buckets,

    /// List files in a bucket
    Files {
        bucket: String,

        #[arg(long)]
        prefix: Option<String>,
    },

    /// Download a file to a local path
    Download {
        bucket: String,
        name: String,
        output: String,
    },

    /// Upload a local file
    Upload {
        bucket: String,
        name: String,
        input: String,

        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// List Bigtable tables
    BtTables {
        /// Bigtable instance (overrides the config file)
        #[arg(long)]
        instance: Option<String>,
    },

    /// List column families of a Bigtable table
    BtFamilies {
        table: String,

        #[arg(long)]
        instance: Option<String>,
    },

    /// Read Bigtable rows by key prefix
    BtRead {
        table: String,

        /// Row key prefix; reads the whole table when omitted
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        instance: Option<String>,
    },
}
