//! Adapter Layer
//!
//! 外部システム（BigQuery, Bigtable, Cloud Storage, 設定ファイル）との統合

pub mod auth;
pub mod bigquery;
pub mod bigtable;
pub mod clients;
pub mod config;
pub mod rest;
pub mod storage;
