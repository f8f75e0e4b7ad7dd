//! Bigtable Adapter Modules
//!
//! Bigtable統合のためのアダプターモジュール

pub mod client;
pub mod models;

pub use client::BigtableRepository;
