//! # Data Transfer Objects
//!
//! クライアント・クエリ・エクスポートの設定

pub mod client_options;
pub mod export_config;
