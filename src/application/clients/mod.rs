//! # Client Wrappers
//!
//! サービスごとのクライアントラッパー

pub mod bigquery;
pub mod bigtable;
pub mod handle;
pub mod storage;

pub use bigquery::{BigQueryClient, BigQueryError};
pub use bigtable::{BigtableClient, BigtableError};
pub use storage::{StorageClient, StorageError};
