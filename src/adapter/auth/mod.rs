//! Authentication Module
//!
//! GCP認証関連の機能

pub mod gcp_auth;

pub use self::gcp_auth::{
    create_bigquery_client, create_bigtable_token_provider, create_token_source, expand_key_path,
};
