//! gcpkit - Google Cloud command-line helper
//!
//! BigQuery・Bigtable・Cloud Storage の操作をサブコマンドで実行

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use anyhow::Result;
use clap::Parser;

use gcpkit::adapter::config::Config;
use gcpkit::driver::{Args, CommandWorkflow};

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Load configuration; CLI flags take precedence
    let config = Config::load_or_default(&args.config)?
        .with_overrides(args.project.clone(), args.credentials.clone());

    // Create workflow with injected dependencies
    let workflow = CommandWorkflow::new(config);

    if let Err(e) = workflow.execute(args.command).await {
        println!("✗ {:#}", e);
        return Err(e);
    }
    Ok(())
}
